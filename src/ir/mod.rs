//! Arena-based SSA intermediate representation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────── Module ────────────────────────────────┐
//! │  TypeTable (interned)      constants (interned)      globals           │
//! │                                                                        │
//! │  functions ──► blocks ──► instructions        arguments                │
//! │                  │  ▲           │                                      │
//! │        preds/succs  └─ parent ──┘   operands ──► Value ──► uses: [Use] │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All entities live in arenas owned by the [`Module`] and are addressed by
//! copyable handles ([`InstId`], [`BlockId`], ...). Operands are [`Value`]s;
//! every value keeps a list of [`Use`] records naming the operand slots that
//! refer to it. The module's editing methods are the only way to change
//! operands, and they update both directions in one step.
//!
//! # Key Components
//!
//! - [`Module`] - Arenas, factories and graph editing
//! - [`Builder`] - Type-checked instruction construction
//! - [`Type`] / [`TypeTable`] - Interned structural types
//! - [`Constant`] - Interned constants
//! - [`InstKind`] / [`Opcode`] - Instruction families and flat opcodes
//! - [`verify_function`] / [`verify_module`] / [`verify_uses`] - Structural validation

mod block;
mod builder;
mod constant;
mod edit;
mod function;
mod global;
mod ids;
mod instruction;
mod module;
mod names;
pub(crate) mod types;
mod value;
mod verify;

pub use block::BasicBlock;
pub use builder::Builder;
pub use constant::{Constant, ConstantData};
pub use edit::InsertPosition;
pub use function::{Argument, Function};
pub use global::GlobalVariable;
pub use ids::{ArgId, BlockId, ConstId, FuncId, GlobalId, InstId, TypeId};
pub use instruction::{
    CastOp, CmpPredicate, FloatBinaryOp, InstKind, Instruction, IntBinaryOp, Opcode, OpcodeFlags,
};
pub use module::Module;
pub use names::NameTable;
pub use types::{Type, TypeTable};
pub use value::{Use, User, Value};
pub use verify::{verify_function, verify_module, verify_uses};
