//! Bytecode representation and the execution engine.
//!
//! # Module Structure
//!
//! - `op` - the closed opcode set and tagged instructions
//! - `code` - immutable, sliceable instruction sequences
//! - `builder` - `CodeBuilder` for front ends emitting bytecode
//! - `vm` - the frame engine executing code against scopes and the object runtime

pub use builder::CodeBuilder;
pub use code::Code;
pub use op::{Instruction, Opcode, ParamSpec};

mod builder;
mod code;
mod op;
pub(crate) mod vm;
