//! Construction of the evaluator lookup tables.
//!
//! Built once per process on first use. Non-flush hands are ranked through a
//! perfect-hashed table keyed by the rank multiplier sum; flush hands go
//! through a small table addressed directly by the 13-bit card mask of the
//! flushing suit.

use once_cell::sync::Lazy;

use crate::constants::{
    FLUSH, FLUSH_LOOKUP_SIZE, FLUSH_RANKS, FOUR_OF_A_KIND, FULL_HOUSE, HIGH_CARD, MAX_KEY, PAIR,
    PERF_HASH_COLUMN_MASK, PERF_HASH_ROW_SHIFT, RANKS, RANK_COUNT, STRAIGHT, STRAIGHT_FLUSH,
    THREE_OF_A_KIND, TWO_PAIR,
};

pub(crate) struct LookupTables {
    pub lookup: Vec<u16>,
    pub flush_lookup: Vec<u16>,
    pub offsets: Vec<u32>,
}

pub(crate) static TABLES: Lazy<LookupTables> = Lazy::new(build_tables);

/// Rank counts for the wheel (A-2-3-4-5), one 4-bit counter per rank.
const WHEEL_RANKS: u64 = 0x1000000001111;

fn build_tables() -> LookupTables {
    let mut builder = TableBuilder {
        orig: vec![0u16; MAX_KEY as usize + 1],
        flush: vec![0u16; FLUSH_LOOKUP_SIZE],
    };
    const RC: u8 = RANK_COUNT;

    // Hand values are assigned in category order so that a stronger hand
    // always gets a bigger value. Within a category the recursion visits
    // kickers lowest first, which ranks hands with missing cards as the worst
    // kickers of their category (single K < KQJT8 < single A).

    // 1. High card
    builder.populate(0, 0, HIGH_CARD, RC, 0, 0, 0, false);

    // 2. Pair
    let mut value = PAIR;
    for r in 0..RC {
        value = builder.populate(2u64 << (4 * r), 2, value, RC, 0, 0, 0, false);
    }

    // 3. Two pairs
    value = TWO_PAIR;
    for r1 in 0..RC {
        for r2 in 0..r1 {
            value = builder.populate(
                (2u64 << (4 * r1)) + (2u64 << (4 * r2)),
                4,
                value,
                RC,
                r2,
                0,
                0,
                false,
            );
        }
    }

    // 4. Three of a kind
    value = THREE_OF_A_KIND;
    for r in 0..RC {
        value = builder.populate(3u64 << (4 * r), 3, value, RC, 0, r, 0, false);
    }

    // 5. Straight (the wheel ranks lowest)
    value = builder.populate(WHEEL_RANKS, 5, STRAIGHT, RC, RC, RC, 3, false);
    for r in 4..RC {
        value = builder.populate(0x11111u64 << (4 * (r - 4)), 5, value, RC, RC, RC, r, false);
    }

    // 6. Flush
    builder.populate(0, 0, FLUSH, RC, 0, 0, 0, true);

    // 7. Full house
    value = FULL_HOUSE;
    for r1 in 0..RC {
        for r2 in 0..RC {
            if r2 != r1 {
                value = builder.populate(
                    (3u64 << (4 * r1)) + (2u64 << (4 * r2)),
                    5,
                    value,
                    RC,
                    r2,
                    r1,
                    RC,
                    false,
                );
            }
        }
    }

    // 8. Quads
    value = FOUR_OF_A_KIND;
    for r in 0..RC {
        value = builder.populate(4u64 << (4 * r), 4, value, RC, RC, RC, RC, false);
    }

    // 9. Straight flush
    value = builder.populate(WHEEL_RANKS, 5, STRAIGHT_FLUSH, RC, 0, 0, 3, true);
    for r in 4..RC {
        value = builder.populate(0x11111u64 << (4 * (r - 4)), 5, value, RC, 0, 0, r, true);
    }

    let (lookup, offsets) = fit_perfect_hash(&builder.orig);
    LookupTables {
        lookup,
        flush_lookup: builder.flush,
        offsets,
    }
}

struct TableBuilder {
    orig: Vec<u16>,
    flush: Vec<u16>,
}

impl TableBuilder {
    /// Iterates recursively over the remaining card ranks of a hand and
    /// writes the value of every visited rank combination. `max_pair`,
    /// `max_trips` and `max_straight` bound which additions keep the hand in
    /// its category (kickers only, no improvement).
    #[allow(clippy::too_many_arguments)]
    fn populate(
        &mut self,
        ranks: u64,
        ncards: u32,
        mut hand_value: u16,
        end_rank: u8,
        max_pair: u8,
        max_trips: u8,
        max_straight: u8,
        flush: bool,
    ) -> u16 {
        // Bump the value counter for every new 5-card (or smaller) combination.
        if ncards <= 5 {
            hand_value += 1;
        }

        let key = get_key(ranks, flush);
        if flush {
            self.flush[key] = hand_value;
        } else {
            debug_assert!(self.orig[key] == 0 || self.orig[key] == hand_value);
            self.orig[key] = hand_value;
        }
        if ncards == 7 {
            return hand_value;
        }

        for r in 0..end_rank {
            let new_ranks = ranks + (1u64 << (4 * r));
            let rank_count = (new_ranks >> (4 * r)) & 0xf;
            if rank_count == 2 && r >= max_pair {
                continue;
            }
            if rank_count == 3 && r >= max_trips {
                continue;
            }
            if rank_count >= 4 {
                continue;
            }
            if biggest_straight(new_ranks) > max_straight {
                continue;
            }
            hand_value = self.populate(
                new_ranks,
                ncards + 1,
                hand_value,
                r + 1,
                max_pair,
                max_trips,
                max_straight,
                flush,
            );
        }

        hand_value
    }
}

/// Lookup key for a rank count array (4-bit counter per rank).
fn get_key(ranks: u64, flush: bool) -> usize {
    let mut key = 0u64;
    for r in 0..RANK_COUNT as usize {
        key += ((ranks >> (4 * r)) & 0xf) * if flush { FLUSH_RANKS[r] } else { RANKS[r] };
    }
    key as usize
}

/// Index of the highest straight card, or 0 when there is no straight.
fn biggest_straight(ranks: u64) -> u8 {
    let rank_mask = (0x1111111111111 & ranks)
        | ((0x2222222222222 & ranks) >> 1)
        | ((0x4444444444444 & ranks) >> 2);
    for i in (0..9).rev() {
        if (rank_mask >> (4 * i)) & 0x11111 == 0x11111 {
            return i + 4;
        }
    }
    if rank_mask & WHEEL_RANKS == WHEEL_RANKS {
        3
    } else {
        0
    }
}

/// Compacts the sparse key space into a dense table.
///
/// Nonzero keys are grouped into rows of 2^PERF_HASH_ROW_SHIFT columns.
/// Rows are placed densest first; for each row we search the smallest offset
/// where none of its columns conflicts with already placed entries (slots
/// holding the same value may be shared). Offsets are stored relative to the
/// row start so the query side can add them to the full key.
fn fit_perfect_hash(orig: &[u16]) -> (Vec<u16>, Vec<u32>) {
    let row_count = (orig.len() >> PERF_HASH_ROW_SHIFT) + 1;
    let mut rows: Vec<(usize, Vec<u32>)> = (0..row_count).map(|i| (i, Vec::new())).collect();
    for (key, &value) in orig.iter().enumerate() {
        if value != 0 {
            rows[key >> PERF_HASH_ROW_SHIFT].1.push(key as u32);
        }
    }
    rows.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    let mut lookup: Vec<u16> = Vec::new();
    let mut offsets = vec![0u32; row_count];
    // lowest free slot; starting the search there skips offsets that are
    // already known to collide on the first column
    let mut first_free = 0usize;
    for (row_idx, keys) in &rows {
        if keys.is_empty() {
            continue;
        }
        let columns: Vec<usize> = keys
            .iter()
            .map(|&k| (k & PERF_HASH_COLUMN_MASK) as usize)
            .collect();
        let mut offset = first_free.saturating_sub(columns[0]);
        'search: loop {
            let end = columns.last().unwrap() + offset + 1;
            if end > lookup.len() {
                lookup.resize(end, 0);
            }
            for (i, &col) in columns.iter().enumerate() {
                let slot = lookup[col + offset];
                if slot != 0 && slot != orig[keys[i] as usize] {
                    offset += 1;
                    continue 'search;
                }
            }
            break;
        }
        for (i, &col) in columns.iter().enumerate() {
            lookup[col + offset] = orig[keys[i] as usize];
        }
        offsets[*row_idx] = (offset as u32).wrapping_sub((*row_idx as u32) << PERF_HASH_ROW_SHIFT);
        while first_free < lookup.len() && lookup[first_free] != 0 {
            first_free += 1;
        }
    }

    (lookup, offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CARD_COUNT, HAND_CATEGORY_SHIFT, HIGH_CARD};
    use crate::hand_evaluator::{Hand, CARDS};
    use crate::hand_range::get_card_mask;

    fn eval(cards: &str) -> u16 {
        Hand::from_bit_mask(get_card_mask(cards)).evaluate()
    }

    #[test]
    fn test_empty_hand_value() {
        assert_eq!(Hand::default().evaluate(), HIGH_CARD + 1);
    }

    fn count_categories(cards_left: usize, start: u8, hand: Hand, counts: &mut [u64; 10]) {
        if cards_left == 0 {
            counts[usize::from(hand.evaluate() >> HAND_CATEGORY_SHIFT)] += 1;
            return;
        }
        for c in start..=(CARD_COUNT - cards_left as u8) {
            count_categories(cards_left - 1, c + 1, hand + CARDS[usize::from(c)], counts);
        }
    }

    fn categories_for(ncards: usize) -> [u64; 10] {
        let mut counts = [0u64; 10];
        count_categories(ncards, 0, Hand::default(), &mut counts);
        counts
    }

    #[test]
    fn test_category_counts_1_card() {
        assert_eq!(categories_for(1), [0, 52, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_category_counts_2_cards() {
        assert_eq!(categories_for(2), [0, 1248, 78, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_category_counts_5_cards() {
        assert_eq!(
            categories_for(5),
            [0, 1302540, 1098240, 123552, 54912, 10200, 5108, 3744, 624, 40]
        );
    }

    #[test]
    fn test_category_counts_7_cards() {
        assert_eq!(
            categories_for(7),
            [
                0, 23294460, 58627800, 31433400, 6461620, 6180020, 4047644, 3473184, 224848,
                41584
            ]
        );
    }

    #[test]
    fn test_missing_cards_rank_as_worst_kickers() {
        // K < KQJT8 < A < AK < KKAQJ < AA < AA2 < AA432
        let chain = [
            eval("Ks"),
            eval("KsQdJhTc8s"),
            eval("As"),
            eval("AsKh"),
            eval("KsKhAdQsJh"),
            eval("AsAh"),
            eval("AsAh2d"),
            eval("AsAh4d3c2h"),
        ];
        for pair in chain.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_category_ordering() {
        // best no-straight high card < worst pair
        assert!(eval("AsKdQhJc9s") < eval("2s2h3d4c6h"));
        // best two pair < worst trips
        assert!(eval("AsAhKsKhQd") < eval("2s2h2d3c4d"));
        // wheel is the lowest straight
        assert!(eval("As2d3h4c5s") >> 12 == 5);
        assert!(eval("As2d3h4c5s") < eval("2d3h4c5s6h"));
        // wheel straight flush is the lowest straight flush
        assert!(eval("As2s3s4s5s") >> 12 == 9);
        assert!(eval("As2s3s4s5s") < eval("2s3s4s5s6s"));
        // royal flush beats the king high straight flush
        assert!(eval("AsKsQsJsTs") > eval("KsQsJsTs9s"));
    }

    #[test]
    fn test_equal_hands_equal_values() {
        assert_eq!(eval("AsKd"), eval("AhKc"));
        assert_eq!(eval("2s3h4d5c7s"), eval("2h3d4c5s7h"));
        // same ranks, different flush suit
        assert_eq!(eval("As9s7s4s2s"), eval("Ad9d7d4d2d"));
    }

    #[test]
    fn test_flush_vs_pair() {
        assert!(eval("As9s7s4s2s") > eval("AsAh9d7c4s"));
        assert!(eval("As9s7s4s2s") >> 12 == 6);
    }
}
