//! # Showdown
//! A Texas Hold'em all-in equity calculator
//!
//! Computes, for every player, the probability of winning outright and of
//! tying, given per player hole card ranges, board cards and dead cards.
//! Supports
//!  - exact equities by full enumeration over all valid deals
//!  - monte carlo estimation with a standard deviation stopping rule
//!  - fast branchless 7-card hand evaluation
//!
//! ## Equity Calculator
//!
//! ```no_run
//! use std::sync::{atomic::AtomicBool, Arc};
//! use showdown::{approx_equity, get_card_mask, HandRange, SimulationOptions, SimulationResults};
//!
//! let ranges = HandRange::from_strings(vec!["AK,22+".to_string(), "random".to_string()]);
//! let board_mask = get_card_mask("2h3d4c");
//! let dead_mask = get_card_mask("");
//! let cancel_token = Arc::new(AtomicBool::new(false));
//! let results = approx_equity(
//!     &ranges,
//!     board_mask,
//!     dead_mask,
//!     SimulationOptions::default(),
//!     cancel_token,
//!     |update: &SimulationResults| eprintln!("progress: {:.0}%", 100.0 * update.progress),
//! )
//! .unwrap();
//! println!("{:?}", results.equities);
//! ```
//!
//! ## Hand Evaluator
//!
//! ```no_run
//! use showdown::{get_card_mask, Hand};
//! // cards are indexed 0..52 where index is 4 * rank + suit
//! let board = Hand::from_bit_mask(get_card_mask("AhTd9d"));
//! let hand = board + Hand::from_hole_cards(44, 45);
//! let score = hand.evaluate();
//! let category = score >> 12; // 1 = high card .. 9 = straight flush
//! ```

pub mod constants;
pub mod equity_calculator;
pub mod fastdivide;
pub mod hand_evaluator;
pub mod hand_range;
pub mod rng;

pub use equity_calculator::{
    approx_equity, exact_equity, SimulationOptions, SimulationResults, SimulatorError,
};
pub use hand_evaluator::*;
pub use hand_range::{get_card_mask, HandRange};
