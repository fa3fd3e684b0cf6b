//! Range vs range equity calculation.

mod combined_range;
mod simulator;

pub use combined_range::{Combo, CombinedRange, MAX_COMBINED_RANGE_SIZE};
pub use simulator::{
    approx_equity, exact_equity, SimulationOptions, SimulationResults, SimulatorError,
};
