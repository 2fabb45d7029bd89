//! Error kinds (§7): accumulated `SmgError`s ride along inside a `State`;
//! `SmgFatal` is reserved for the three programmer-bug conditions §7 calls
//! out as conditions the implementation must raise rather than recover
//! from.

use crate::entity::{ObjectId, ValueId};

/// Sub-reasons an `invalid-free` can carry (§7).
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidFreeReason {
    #[error("double free")]
    DoubleFree,
    #[error("free of a non-heap object")]
    NonHeap,
    #[error("free at a non-zero offset into the object")]
    NonZeroOffset,
}

/// One of the eight error kinds named by §7, each carrying the offending
/// object/value and a human message for the witness/diagnostic path.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SmgError {
    #[error("invalid read of {object}: {message}")]
    InvalidRead { object: ObjectId, message: String },

    #[error("invalid write to {object}: {message}")]
    InvalidWrite { object: ObjectId, message: String },

    #[error("invalid free of {object}: {reason}")]
    InvalidFree {
        object: ObjectId,
        reason: InvalidFreeReason,
    },

    #[error("memory leak: {} object(s) became unreachable", objects.len())]
    MemoryLeak { objects: Vec<ObjectId> },

    #[error("null dereference via {value}")]
    NullDereference { value: ValueId },

    #[error("use of uninitialized value at {object}")]
    UseOfUninitialized { object: ObjectId },

    #[error("undefined behavior: {detail}")]
    UndefinedBehavior { detail: String },

    #[error("unknown-offset access on {object}")]
    UnknownOffsetAccess { object: ObjectId },
}

/// A condition severe enough that continuing to analyze this path is
/// unsound rather than merely imprecise (§7 "Fatal"). Hosts are expected to
/// treat this the way an assertion failure is treated: abort the run, not
/// widen the state and continue.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SmgFatal {
    #[error("write with symbolic size while overapproximation is disabled")]
    SymbolicSizeWriteNotOverapproximated,
    #[error("materialization invoked on an invalid or zero-sized target {object}")]
    MaterializeInvalidTarget { object: ObjectId },
    #[error("abstraction attempted over objects {a} and {b} with symbolic, non-comparable sizes")]
    AbstractionIncomparableSizes { a: ObjectId, b: ObjectId },
}
