//! Shared fixtures for unit tests.
//!
//! - [`TestGraph`] - A plain edge-list graph for exercising the generic algorithms
//! - [`Fixture`] and the `build_*` functions - Small IR modules with known shapes

mod graph;

pub use factories::*;
pub use graph::TestGraph;
