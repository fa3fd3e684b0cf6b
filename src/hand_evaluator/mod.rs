//! Fast 7-card hand evaluation.
//!
//! Cards are indexed 0..52 with card = 4 * rank + suit. A [`Hand`] aggregates
//! up to 7 cards into a 128-bit value from which [`Hand::evaluate`] computes a
//! 16-bit strength via two lookup tables built on first use.

mod hand;
mod tables;

pub use hand::Hand;

use once_cell::sync::Lazy;

use crate::constants::{CARD_COUNT, CARD_COUNT_SHIFT, RANKS, SUITS_SHIFT};

/// One Hand constant per card. A complete hand is the sum of its cards plus
/// one `Hand::empty()`.
pub static CARDS: Lazy<[Hand; CARD_COUNT as usize]> = Lazy::new(|| {
    let mut cards = [Hand { key: 0, mask: 0 }; CARD_COUNT as usize];
    for (c, card) in cards.iter_mut().enumerate() {
        let rank = c as u32 / 4;
        let suit = c as u32 % 4;
        *card = Hand {
            key: (1u64 << (4 * suit + SUITS_SHIFT))
                + (1u64 << CARD_COUNT_SHIFT)
                + RANKS[rank as usize],
            mask: 1u64 << ((3 - suit) * 16 + rank),
        };
    }
    cards
});
