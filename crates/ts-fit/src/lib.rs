//! # ts-fit
//!
//! Binned template-fraction fitting for tstat.
//!
//! Stands in for ROOT's `TFractionFitter`: an explicit binned Poisson
//! likelihood over component fractions, minimized with a bounded L-BFGS.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fraction;
pub mod optimizer;

pub use fraction::{apply_fractions, mc_weights, FractionFitter};
pub use optimizer::{LbfgsOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};
