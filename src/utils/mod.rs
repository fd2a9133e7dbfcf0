//! Generic utilities shared by the analyses.
//!
//! - [`graph`] - Node identifiers, graph traits and graph algorithms

pub mod graph;
