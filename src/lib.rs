// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # midend
//!
//! The middle end of a small procedural-language compiler: a static single
//! assignment (SSA) oriented intermediate representation together with the
//! analyses and transformations that turn naive, memory-based IR produced by a
//! front-end into register-promoted, optimized IR ready for instruction
//! selection.
//!
//! ## Features
//!
//! - **Arena-based IR** - Modules own functions, globals, blocks and instructions by
//!   stable handles, with bidirectional def-use chains and CFG edges kept in sync
//! - **Interned types and constants** - Structurally equal types and constants share one handle
//! - **Dominator analysis** - Iterative dominator tree, dominance frontiers and O(1)
//!   dominance queries
//! - **Natural loop detection** - Loop forest with headers, latches and nesting
//! - **SSA construction** - Promotion of scalar stack slots with phi placement and renaming
//! - **Interprocedural effects** - Per-function load/store sets and purity
//! - **Optimizations** - Mark-sweep dead code elimination and loop-invariant code motion
//!
//! ## Quick Start
//!
//! ```rust
//! use midend::prelude::*;
//!
//! let mut module = Module::new();
//! let i32_ty = module.int32_type();
//! let fn_ty = module.function_type(i32_ty, vec![]);
//! let main = module.add_function("main", fn_ty)?;
//! let entry = module.add_block(main, "entry");
//!
//! let mut builder = Builder::at_end(&mut module, entry);
//! let slot = builder.alloca(i32_ty)?;
//! let one = builder.module().const_int(1);
//! builder.store(one, slot)?;
//! let value = builder.load(slot)?;
//! builder.ret(Some(value.into()))?;
//!
//! let mut manager = PassManager::standard(&PipelineConfig::default());
//! manager.run(&mut module)?;
//!
//! verify_module(&module)?;
//! # Ok::<(), midend::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - The program graph: types, constants, values, instructions, blocks,
//!   functions and modules, plus the construction [`ir::Builder`] and the structural verifier
//! - [`analysis`] - Read-only analyses: dominators, natural loops and function effects
//! - [`compiler`] - Passes, the pass manager, pipeline configuration and the change event log
//! - [`utils`] - Generic graph traits and algorithms the analyses are built on
//!
//! Analyses are snapshots. Any mutation of the IR invalidates them and every
//! consuming pass recomputes what it needs.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use midend::prelude::*;
///
/// let mut module = Module::new();
/// let void = module.void_type();
/// let fn_ty = module.function_type(void, vec![]);
/// let func = module.add_function("f", fn_ty)?;
/// assert!(module.function(func).is_declaration());
/// # Ok::<(), midend::Error>(())
/// ```
pub mod prelude;

/// The intermediate representation.
///
/// This module holds the program graph and everything needed to build and
/// mutate it:
///
/// - [`ir::Module`] - Owner of all IR entities and of the interning tables
/// - [`ir::Builder`] - Type-checked instruction construction
/// - [`ir::Value`] - Handle naming anything that can appear as an operand
/// - [`ir::verify_function`] / [`ir::verify_module`] - Structural validation
pub mod ir;

/// Read-only analyses over the IR.
///
/// - [`analysis::Dominators`] - Dominator tree, frontiers and interval numbering
/// - [`analysis::LoopForest`] - Natural loops and their nesting
/// - [`analysis::FuncInfo`] - Interprocedural load/store sets and purity
pub mod analysis;

/// Transformation passes and the infrastructure that runs them.
///
/// - [`compiler::Pass`] - Interface implemented by every pass
/// - [`compiler::PassManager`] - Sequential pass pipeline
/// - [`compiler::EventLog`] - Record of every change a pass made
pub mod compiler;

/// Generic utilities, currently the graph abstractions used by the analyses.
pub mod utils;

/// `midend` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `midend` Error type
///
/// The main error type for all operations in this crate. Construction errors
/// (mismatched operand types, appending past a terminator), pass preconditions
/// and verification failures are all reported through it.
///
/// # Examples
///
/// ```rust
/// use midend::{Error, ir::Module};
///
/// let mut module = Module::new();
/// let i32_ty = module.int32_type();
/// let not_a_function = module.add_function("f", i32_ty);
/// match not_a_function {
///     Err(Error::TypeMismatch { message, .. }) => println!("rejected: {}", message),
///     Err(e) => println!("Error: {}", e),
///     Ok(_) => unreachable!(),
/// }
/// ```
pub use error::Error;
