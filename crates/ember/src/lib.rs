#![doc = include_str!("../README.md")]

mod heap;

mod builtins;
mod bytecode;
mod exception_private;
mod exception_public;
mod function;
mod io;
mod object;
mod resource;
mod run;
mod scope;
mod signature;
mod special;
pub mod tracer;
mod types;
mod value;

pub use crate::{
    bytecode::{Code, CodeBuilder, Instruction, Opcode, ParamSpec},
    exception_private::ExcType,
    exception_public::{Exception, RegistrationError, StackFrame},
    heap::HeapStats,
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    object::{ConversionError, InvalidInputError, Object},
    resource::{
        DEFAULT_GC_INTERVAL, DEFAULT_MAX_RECURSION_DEPTH, LimitedTracker, MAX_DATA_RECURSION_DEPTH, NoLimitTracker, ResourceError,
        ResourceLimits, ResourceTracker,
    },
    run::Runtime,
    value::Value,
};
