//! Command implementations.

pub mod funding;
pub mod reallocate;
pub mod simulate;

pub use funding::run_funding;
pub use reallocate::run_reallocate;
pub use simulate::run_simulate;
