//! Hand range parsing.
//!
//! A range is a comma separated union of hand groups: `"AA"`, `"AKs"`,
//! `"QJo"`, `"22+"`, `"K4s+"`, exact combos like `"AhKd"`, or `"random"` for
//! all 1326 combinations. Parsing is case insensitive and ignores spaces.
//! The resulting combo list is deduplicated and each combo stores the higher
//! ranked card first.

use crate::constants::{CARD_COUNT, RANK_COUNT, SUIT_COUNT};

const SUIT_CHARS: [char; 4] = ['s', 'h', 'c', 'd'];
const RANK_CHARS: [char; 13] = [
    '2', '3', '4', '5', '6', '7', '8', '9', 't', 'j', 'q', 'k', 'a',
];

fn char_to_rank(c: char) -> Option<u8> {
    RANK_CHARS.iter().position(|&r| r == c).map(|i| i as u8)
}

fn char_to_suit(c: char) -> Option<u8> {
    SUIT_CHARS.iter().position(|&s| s == c).map(|i| i as u8)
}

/// A set of hole card combinations for one player.
///
/// Each combo is a pair of card indices (card = 4 * rank + suit) with the
/// higher ranked card first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandRange {
    pub hands: Vec<(u8, u8)>,
}

impl HandRange {
    /// Create a hand range for each string in the array.
    pub fn from_strings(arr: Vec<String>) -> Vec<HandRange> {
        arr.iter().map(|s| HandRange::from_string(s)).collect()
    }

    /// Parse a range from its text form, e.g. `"AK,22+,QhJh"`.
    pub fn from_string(text: &str) -> HandRange {
        let mut range = HandRange::default();
        let text: String = text.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
        for token in text.split(',') {
            range.parse_token(token);
        }
        range.normalize();
        range
    }

    fn parse_token(&mut self, token: &str) {
        let c: Vec<char> = token.chars().collect();
        if token == "random" {
            for c1 in 1..CARD_COUNT {
                for c2 in 0..c1 {
                    self.hands.push((c1, c2));
                }
            }
            return;
        }
        match c.len() {
            2 => {
                if let (Some(r1), Some(r2)) = (char_to_rank(c[0]), char_to_rank(c[1])) {
                    self.add_suited(r1, r2);
                    self.add_offsuit(r1, r2);
                }
            }
            3 => match (char_to_rank(c[0]), char_to_rank(c[1]), c[2]) {
                (Some(r1), Some(r2), '+') => self.add_plus(r1, r2, true, true),
                (Some(r1), Some(r2), 's') => self.add_suited(r1, r2),
                (Some(r1), Some(r2), 'o') => self.add_offsuit(r1, r2),
                _ => {}
            },
            4 => {
                if let (Some(r1), Some(s1), Some(r2), Some(s2)) = (
                    char_to_rank(c[0]),
                    char_to_suit(c[1]),
                    char_to_rank(c[2]),
                    char_to_suit(c[3]),
                ) {
                    // exact combo; the two cards must differ
                    let (card1, card2) = (4 * r1 + s1, 4 * r2 + s2);
                    if card1 != card2 {
                        self.hands.push((card1, card2));
                    }
                } else if let (Some(r1), Some(r2), filter, '+') =
                    (char_to_rank(c[0]), char_to_rank(c[1]), c[2], c[3])
                {
                    match filter {
                        's' => self.add_plus(r1, r2, true, false),
                        'o' => self.add_plus(r1, r2, false, true),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    /// `RR+` expands pairs upwards; `R1R2+` expands the kicker up to R1 - 1.
    fn add_plus(&mut self, r1: u8, r2: u8, suited: bool, offsuit: bool) {
        if r1 == r2 {
            for r in r1..RANK_COUNT {
                self.add_offsuit(r, r);
            }
            return;
        }
        let (hi, lo) = if r1 > r2 { (r1, r2) } else { (r2, r1) };
        for kicker in lo..hi {
            if suited {
                self.add_suited(hi, kicker);
            }
            if offsuit {
                self.add_offsuit(hi, kicker);
            }
        }
    }

    fn add_suited(&mut self, r1: u8, r2: u8) {
        if r1 == r2 {
            return;
        }
        let (hi, lo) = if r1 > r2 { (r1, r2) } else { (r2, r1) };
        for s in 0..SUIT_COUNT {
            self.hands.push((4 * hi + s, 4 * lo + s));
        }
    }

    fn add_offsuit(&mut self, r1: u8, r2: u8) {
        if r1 == r2 {
            // pocket pair: 6 combos
            for s1 in 0..SUIT_COUNT {
                for s2 in 0..s1 {
                    self.hands.push((4 * r1 + s1, 4 * r1 + s2));
                }
            }
            return;
        }
        let (hi, lo) = if r1 > r2 { (r1, r2) } else { (r2, r1) };
        for s1 in 0..SUIT_COUNT {
            for s2 in 0..SUIT_COUNT {
                if s1 != s2 {
                    self.hands.push((4 * hi + s1, 4 * lo + s2));
                }
            }
        }
    }

    // Higher ranked card first, then sort and deduplicate the union.
    fn normalize(&mut self) {
        for h in &mut self.hands {
            if (h.0 >> 2, h.0) < (h.1 >> 2, h.1) {
                *h = (h.1, h.0);
            }
        }
        self.hands.sort_unstable();
        self.hands.dedup();
    }

    /// Remove combos that conflict with board or dead cards.
    pub fn remove_conflicting_combos(&mut self, board_mask: u64, dead_mask: u64) {
        let reserved = board_mask | dead_mask;
        self.hands
            .retain(|h| (1u64 << h.0 | 1u64 << h.1) & reserved == 0);
    }
}

/// Translate a card string like `"AhTd9d"` into a 52-bit card mask.
pub fn get_card_mask(text: &str) -> u64 {
    let chars: Vec<char> = text.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
    let mut mask = 0u64;
    for pair in chars.chunks_exact(2) {
        if let (Some(rank), Some(suit)) = (char_to_rank(pair[0]), char_to_suit(pair[1])) {
            mask |= 1u64 << (4 * rank + suit);
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_sizes() {
        assert_eq!(HandRange::from_string("AK").hands.len(), 16);
        assert_eq!(HandRange::from_string("AKs").hands.len(), 4);
        assert_eq!(HandRange::from_string("AKo").hands.len(), 12);
        assert_eq!(HandRange::from_string("22").hands.len(), 6);
        assert_eq!(HandRange::from_string("random").hands.len(), 1326);
        assert_eq!(HandRange::from_string("AhKd").hands.len(), 1);
    }

    #[test]
    fn test_plus_expansion() {
        // all pocket pairs from 22 up
        assert_eq!(HandRange::from_string("22+").hands.len(), 13 * 6);
        // K4..KQ
        assert_eq!(HandRange::from_string("K4+").hands.len(), 9 * 16);
        assert_eq!(HandRange::from_string("KTs+").hands.len(), 3 * 4);
        assert_eq!(HandRange::from_string("KTo+").hands.len(), 3 * 12);
    }

    #[test]
    fn test_union_dedup() {
        // AKs is a subset of AK
        assert_eq!(HandRange::from_string("AK,AKs").hands.len(), 16);
        let r = HandRange::from_string("22,22");
        assert_eq!(r.hands.len(), 6);
    }

    #[test]
    fn test_higher_rank_first() {
        for range in [
            HandRange::from_string("random"),
            HandRange::from_string("K4+"),
            HandRange::from_string("2h3d"),
        ] {
            for &(c1, c2) in &range.hands {
                assert!(c1 >> 2 >= c2 >> 2);
                assert_ne!(c1, c2);
            }
        }
    }

    #[test]
    fn test_case_and_spaces() {
        assert_eq!(
            HandRange::from_string("aks, AKS").hands,
            HandRange::from_string("AKs").hands
        );
    }

    #[test]
    fn test_card_mask() {
        // 2c = rank 0 suit 2, 3c = rank 1 suit 2
        assert_eq!(get_card_mask("2c3c"), (1u64 << 2) | (1u64 << 6));
        assert_eq!(get_card_mask(""), 0);
        assert_eq!(get_card_mask("As").count_ones(), 1);
        assert_eq!(get_card_mask("AsKsQsJsTs").count_ones(), 5);
    }

    #[test]
    fn test_remove_conflicting_combos() {
        let mut range = HandRange::from_string("AA");
        // kill the ace of spades (rank 12, suit 0)
        range.remove_conflicting_combos(1u64 << 48, 0);
        assert_eq!(range.hands.len(), 3);
    }
}
