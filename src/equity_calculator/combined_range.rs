use rand::seq::SliceRandom;
use rand::Rng;

use crate::constants::MAX_PLAYERS;
use crate::hand_evaluator::Hand;
use crate::hand_range::HandRange;

/// Maximum size of a joined combo table.
pub const MAX_COMBINED_RANGE_SIZE: usize = 10_000;

/// One entry of a combined range: hole cards for every player covered by the
/// range, with the evaluator hands prebuilt.
#[derive(Debug, Clone, Copy)]
pub struct Combo {
    pub mask: u64,
    pub hole_cards: [(u8, u8); MAX_PLAYERS],
    pub hands: [Hand; MAX_PLAYERS],
}

/// Combines hole card ranges of multiple players into one joint table that
/// contains every valid combination from the original ranges. Card conflicts
/// between the joined players are filtered out up front, which keeps them out
/// of the simulation hot loop. This matters for highly overlapping ranges
/// like AK vs AK vs AK vs AK.
#[derive(Debug, Clone)]
pub struct CombinedRange {
    players: [usize; MAX_PLAYERS],
    player_count: usize,
    combos: Vec<Combo>,
}

impl CombinedRange {
    /// Create a combined range for a single player.
    pub fn from_player(player_idx: usize, range: &HandRange) -> CombinedRange {
        let mut players = [0; MAX_PLAYERS];
        players[0] = player_idx;
        let combos = range
            .hands
            .iter()
            .map(|&(c1, c2)| {
                let mut hole_cards = [(52u8, 52u8); MAX_PLAYERS];
                hole_cards[0] = (c1, c2);
                let mut hands = [Hand::default(); MAX_PLAYERS];
                hands[0] = Hand::from_hole_cards(c1, c2);
                Combo {
                    mask: (1u64 << c1) | (1u64 << c2),
                    hole_cards,
                    hands,
                }
            })
            .collect();
        CombinedRange {
            players,
            player_count: 1,
            combos,
        }
    }

    /// Merge per player ranges greedily, always joining the pair with the
    /// smallest joined size, until no join stays under the size cap.
    pub fn from_ranges(hand_ranges: &[HandRange]) -> Vec<CombinedRange> {
        CombinedRange::join_ranges(hand_ranges, MAX_COMBINED_RANGE_SIZE)
    }

    pub fn join_ranges(hand_ranges: &[HandRange], max_size: usize) -> Vec<CombinedRange> {
        let mut combined: Vec<CombinedRange> = hand_ranges
            .iter()
            .enumerate()
            .map(|(i, r)| CombinedRange::from_player(i, r))
            .collect();

        loop {
            let mut best_size = u64::MAX;
            let (mut best_i, mut best_j) = (0, 0);
            for i in 0..combined.len() {
                for j in 0..i {
                    let size = combined[i].estimate_join_size(&combined[j]);
                    if size < best_size {
                        best_i = i;
                        best_j = j;
                        best_size = size;
                    }
                }
            }
            if best_size <= max_size as u64 {
                let joined = combined[best_i].join(&combined[best_j]);
                combined[best_i] = joined;
                combined.remove(best_j);
            } else {
                break;
            }
        }

        combined
    }

    /// Combine with another range and return the result.
    pub fn join(&self, other: &CombinedRange) -> CombinedRange {
        debug_assert!(self.player_count + other.player_count <= MAX_PLAYERS);
        let player_count = self.player_count + other.player_count;
        let mut players = [0; MAX_PLAYERS];
        players[..self.player_count].copy_from_slice(&self.players[..self.player_count]);
        players[self.player_count..player_count].copy_from_slice(&other.players[..other.player_count]);

        let mut combos = Vec::new();
        for c1 in &self.combos {
            for c2 in &other.combos {
                if c1.mask & c2.mask != 0 {
                    continue;
                }
                let mut combo = Combo {
                    mask: c1.mask | c2.mask,
                    hole_cards: [(52u8, 52u8); MAX_PLAYERS],
                    hands: [Hand::default(); MAX_PLAYERS],
                };
                combo.hole_cards[..self.player_count]
                    .copy_from_slice(&c1.hole_cards[..self.player_count]);
                combo.hole_cards[self.player_count..player_count]
                    .copy_from_slice(&c2.hole_cards[..other.player_count]);
                for i in 0..player_count {
                    combo.hands[i] =
                        Hand::from_hole_cards(combo.hole_cards[i].0, combo.hole_cards[i].1);
                }
                combos.push(combo);
            }
        }

        CombinedRange {
            players,
            player_count,
            combos,
        }
    }

    /// Size of the joined range without building it.
    pub fn estimate_join_size(&self, other: &CombinedRange) -> u64 {
        let mut size = 0u64;
        for c1 in &self.combos {
            for c2 in &other.combos {
                if c1.mask & c2.mask == 0 {
                    size += 1;
                }
            }
        }
        size
    }

    /// Randomize combo order; good for the random walk simulation.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        self.combos.shuffle(rng);
    }

    #[inline(always)]
    pub fn players(&self) -> &[usize; MAX_PLAYERS] {
        &self.players
    }

    #[inline(always)]
    pub fn player_count(&self) -> usize {
        self.player_count
    }

    #[inline(always)]
    pub fn combos(&self) -> &[Combo] {
        &self.combos
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.combos.len()
    }
}
