//! Built-in passes.
//!
//! | Pass | Name | Changes the module |
//! |------|------|--------------------|
//! | [`DominatorsPass`] | `dominators` | no |
//! | [`LoopDetectionPass`] | `loops` | no |
//! | [`Mem2RegPass`] | `mem2reg` | promotes stack slots, inserts phis |
//! | [`DeadCodePass`] | `dce` | removes blocks, instructions, functions, globals |
//! | [`LicmPass`] | `licm` | creates preheaders, moves instructions |

mod analysis;
mod deadcode;
mod licm;
mod mem2reg;

pub use analysis::{DominatorsPass, LoopDetectionPass};
pub use deadcode::DeadCodePass;
pub use licm::LicmPass;
pub use mem2reg::Mem2RegPass;
