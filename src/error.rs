use thiserror::Error;

use crate::layout::Cell;
use crate::opcodes::{Opcode, OpcodeClass};

/// Errors caused by the assembly source. Reported with the offending line
/// and a non-zero exit status; they never indicate a compiler defect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Assembly {
    #[error("unknown opcode {0}")]
    UnknownOpcode(String),
    #[error("quotation marks must be of even number")]
    UnmatchedQuote,
    #[error("wrong number of arguments: {found}, must be in {allowed:?}")]
    WrongArity { found: usize, allowed: Vec<usize> },
    #[error("invalid argument {pos}: '{arg}': not a register")]
    NotARegister { pos: usize, arg: String },
    #[error("invalid argument {pos}: '{arg}': not a recognised value")]
    NotAValue { pos: usize, arg: String },
    #[error("invalid argument {pos}: '{arg}'")]
    WrongArgKind { pos: usize, arg: String },
    #[error("unexpected control flow block end")]
    UnexpectedBlockEnd,
    #[error("control flow block left open at end of input")]
    UnclosedBlock,
    #[error("text is not representable in Latin-1: {0:?}")]
    NotLatin1(char),
}

/// Invariant violations inside the code generator. Reaching any of these
/// means the generator is buggy, never the user program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Internal {
    #[error("opcode {0:?} reached the dispatcher unhandled")]
    UnhandledOpcode(Opcode),
    #[error("command class {0:?} reached the dispatcher unhandled")]
    UnhandledClass(OpcodeClass),
    #[error("type tag {tag:?} for {opcode:?} reached the dispatcher unhandled")]
    UnhandledType { opcode: Opcode, tag: String },
    #[error("argument {pos} has an unexpected kind")]
    BadArgument { pos: usize },
    #[error("cell {0} is not part of the active layout")]
    UnknownCell(Cell),
    #[error("no unlocked scratch cell available")]
    NoScratch,
    #[error("unable to pinpoint the error in the arguments")]
    ErrorDetection,
}

/// Either taxonomy, for paths that can surface both.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error(transparent)]
    Assembly(#[from] Assembly),
    #[error(transparent)]
    Internal(#[from] Internal),
}

/// A fault tied to the command it occurred on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("error in command {line:?} (line {line_no}): {source}")]
    Assembly {
        line: String,
        line_no: usize,
        source: Assembly,
    },
    #[error("internal error while compiling {line:?} (line {line_no}): {source}")]
    Internal {
        line: String,
        line_no: usize,
        source: Internal,
    },
}

impl CompileError {
    /// Attach line context to a fault.
    #[must_use]
    pub fn at(line_no: usize, line: &str, fault: Fault) -> Self {
        let line = line.trim().to_string();
        match fault {
            Fault::Assembly(source) => Self::Assembly {
                line,
                line_no,
                source,
            },
            Fault::Internal(source) => Self::Internal {
                line,
                line_no,
                source,
            },
        }
    }

    /// Whether this error blames the user program (as opposed to a
    /// generator bug).
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Assembly { .. })
    }
}
