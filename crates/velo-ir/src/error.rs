//! Error taxonomy of the IR crate.
//!
//! Every construction or mutation failure is a variant of [`IrError`].
//! Failures are synchronous and leave the function unchanged; there is no
//! recovery layer.

use thiserror::Error;

use crate::id::{BlockId, InstRef};
use crate::ops::Opcode;
use crate::types::Type;

/// Errors produced by IR construction, mutation and printing.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IrError {
    /// Opcode handed to a binary-operator builder is outside the Binary range.
    #[error("opcode '{opcode}' is not a binary operator")]
    InvalidBinaryOperatorOpcode { opcode: Opcode },

    /// Binary or comparison operands do not share one integer type.
    #[error("operand types {lhs} and {rhs} do not form a valid operand pair")]
    OperandsTypeMismatch { lhs: Type, rhs: Type },

    /// Branch condition is not `i1`.
    #[error("branch condition has type {found}, expected i1")]
    InvalidConditionType { found: Type },

    /// Constant created with a non-value type.
    #[error("{ty} constant shall not be created")]
    InvalidConstantType { ty: Type },

    /// Constant magnitude does not fit the declared integer width.
    #[error("value {value} is out of range for {ty}")]
    ConstantOutOfRange { ty: Type, value: u64 },

    /// Argument position past the end of the parameter list.
    #[error("argument position {index} is out of range ({count} parameters)")]
    ArgOutOfRange { index: usize, count: usize },

    /// Value added to a phi differs from the phi's declared type.
    #[error("phi of type {expected} cannot take a value of type {found}")]
    PhiTypeMismatch { expected: Type, found: Type },

    /// Return operand (or its absence) does not match the function return type.
    #[error("returning {found} from a function that returns {expected}")]
    InvalidReturnType { expected: Type, found: Type },

    /// Printing a phi with fewer than two incoming records.
    #[error("phi instruction {inst} has fewer than two incoming records")]
    InsufficientPhiRecords { inst: InstRef },

    /// Stale or foreign block handle.
    #[error("block %bb{id} is not part of the function")]
    BlockNotFound { id: BlockId },

    /// Stale or foreign instruction handle.
    #[error("instruction {inst} is not part of the function")]
    InstructionNotFound { inst: InstRef },

    /// Operation applied to an instruction of the wrong opcode (e.g. a phi
    /// record operation on a non-phi).
    #[error("operation not supported for '{found}' instruction {inst}")]
    UnexpectedOpcode { inst: InstRef, found: Opcode },
}
