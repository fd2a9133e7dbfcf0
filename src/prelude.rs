//! # midend Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the midend library. Import this module to get quick access to everything needed
//! to build a module and run the pass pipeline over it.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all midend operations
pub use crate::Error;

/// The result type used throughout midend
pub use crate::Result;

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Module, construction and values
pub use crate::ir::{Builder, InsertPosition, Module, Use, User, Value};

/// Handles to IR entities
pub use crate::ir::{ArgId, BlockId, ConstId, FuncId, GlobalId, InstId, TypeId};

/// Instruction families and types
pub use crate::ir::{CmpPredicate, InstKind, Opcode, Type};

/// Structural validation
pub use crate::ir::{verify_function, verify_module, verify_uses};

// ================================================================================================
// Analyses
// ================================================================================================

/// Dominators, loops and function effects
pub use crate::analysis::{Dominators, FuncInfo, Loop, LoopForest, LoopId};

// ================================================================================================
// Passes and Pipeline
// ================================================================================================

/// Pipeline infrastructure
pub use crate::compiler::{EventKind, EventLog, Pass, PassManager, PipelineConfig};

/// Built-in passes
pub use crate::compiler::{DeadCodePass, LicmPass, Mem2RegPass};
