/// Number of cards in a standard deck
pub const CARD_COUNT: u8 = 52;

/// Number of ranks in a standard deck (2 -> A)
pub const RANK_COUNT: u8 = 13;

/// Number of suits (s, h, c, d)
pub const SUIT_COUNT: u8 = 4;

/// Card index layout: card = 4 * rank + suit
pub const SUIT_MASK: u8 = 0x3;
pub const RANK_MASK: u8 = 0x3c;
pub const RANK_SHIFT: u8 = 2;

/// Maximum number of players in a simulation
pub const MAX_PLAYERS: usize = 6;

/// Number of board cards dealt by the river
pub const BOARD_CARDS: u32 = 5;

/// Number of distinct two card combinations
pub const COMBO_COUNT: u16 = 1326;

/// Bit offsets inside the key half of a Hand:
/// bits 0-31 rank multiplier sum, bits 32-35 card count, bits 48-63 suit counters
pub const CARD_COUNT_SHIFT: u32 = 32;
pub const SUITS_SHIFT: u32 = 48;

/// High bit of every 4-bit suit counter. Counters start at 3 so the bit flips
/// exactly when the 5th card of a suit arrives.
pub const FLUSH_CHECK_MASK64: u64 = 0x8888u64 << SUITS_SHIFT;
pub const FLUSH_CHECK_MASK32: u32 = (FLUSH_CHECK_MASK64 >> 32) as u32;

/// Hand categories occupy the high 4 bits of an evaluated rank.
pub const HAND_CATEGORY_OFFSET: u16 = 0x1000;
pub const HAND_CATEGORY_SHIFT: u16 = 12;

pub const HIGH_CARD: u16 = HAND_CATEGORY_OFFSET;
pub const PAIR: u16 = 2 * HAND_CATEGORY_OFFSET;
pub const TWO_PAIR: u16 = 3 * HAND_CATEGORY_OFFSET;
pub const THREE_OF_A_KIND: u16 = 4 * HAND_CATEGORY_OFFSET;
pub const STRAIGHT: u16 = 5 * HAND_CATEGORY_OFFSET;
pub const FLUSH: u16 = 6 * HAND_CATEGORY_OFFSET;
pub const FULL_HOUSE: u16 = 7 * HAND_CATEGORY_OFFSET;
pub const FOUR_OF_A_KIND: u16 = 8 * HAND_CATEGORY_OFFSET;
pub const STRAIGHT_FLUSH: u16 = 9 * HAND_CATEGORY_OFFSET;

/// Rank multipliers that guarantee a collision free key for any rank multiset
/// of at most 7 cards with at most 4 cards of one rank.
pub const RANKS: [u64; 13] = [
    0x2000, 0x8001, 0x11000, 0x3a000, 0x91000, 0x176005, 0x366000, 0x41a013, 0x47802e, 0x479068,
    0x48c0e4, 0x48f211, 0x494493,
];

/// Rank multipliers for flush hands where each rank appears at most once.
/// Powers of two so the key can be read straight off the card mask.
pub const FLUSH_RANKS: [u64; 13] = [
    1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024, 2048, 4096,
];

/// Largest possible non-flush rank key (4 aces + 3 kings).
pub const MAX_KEY: u32 = (4 * RANKS[12] + 3 * RANKS[11]) as u32;

/// Row width of the perfect hash over the non-flush lookup table.
pub const PERF_HASH_ROW_SHIFT: u32 = 11;
pub const PERF_HASH_COLUMN_MASK: u32 = (1 << PERF_HASH_ROW_SHIFT) - 1;

/// Flush table is addressed directly by a 13-bit card mask.
pub const FLUSH_LOOKUP_SIZE: usize = 8192;
