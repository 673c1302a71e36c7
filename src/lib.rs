//! Brainfuck assembly language compiler in Rust
//!
//! Compiles a small register-oriented assembly language (registers,
//! arithmetic, comparisons, a stack, control flow, text printing) down to
//! Brainfuck. The generated programs run on any conforming interpreter; a
//! reference interpreter ships in [`interp`] for testing and `bfalc --run`.
//!
//! ```
//! use bfal::Compiler;
//!
//! let bf = Compiler::new().compile("SET R0 5\nINC R0 3\nOUT R0").unwrap();
//! assert!(bf.chars().all(|c| "><+-.,[]\n".contains(c)));
//! ```

/// Instruction dispatch and the compiler front door
pub mod compile;
/// The emitter facade: head tracking, scratch locks and all emissions
pub mod emit;
/// User and internal error taxonomies
pub mod error;
/// Reference interpreter for the target tape language
pub mod interp;
/// Memory layout: cell slots, roles and constants
pub mod layout;
/// The opcode catalogue
pub mod opcodes;
/// Lexical splitting and argument classification
pub mod parse;
/// Post-pass collapsing redundant motion and clear sequences
pub mod peephole;

pub use self::compile::Compiler;
pub use self::error::CompileError;
pub use self::interp::Interpreter;
pub use self::layout::{Cell, Layout, LayoutFeatures};
