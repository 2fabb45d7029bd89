//! Symbolic memory graph (SMG) heap-shape analysis.
//!
//! This crate is the core of a path-sensitive heap-shape analysis for C
//! programs that manipulate dynamically allocated linked data structures. It
//! is embedded by a transfer-relation/CPA host the way `cranelift-codegen` is
//! embedded by `wasmtime`: it exposes no `main`, only a library surface.
//!
//! The moving parts, leaf-first:
//!
//! - [`entity`] / [`object`] / [`value`] / [`edges`]: the graph primitives —
//!   arena-indexed objects and values, has-value and points-to edges.
//! - [`smg`]: the graph itself (edge sets, validity, pointer index,
//!   reachability).
//! - [`value_map`] / [`stack_frame`]: the value bijection and per-function
//!   local scopes that [`spc`] composes together.
//! - [`spc`]: the immutable symbolic program configuration — heap, stack,
//!   globals in one snapshot.
//! - [`rw`]: the endian-aware partial-read and union-reinterpretation
//!   arithmetic used by [`state`]'s read/write algebra.
//! - [`abstraction`] / [`materializer`]: folding concrete chains into list
//!   segments, and splitting them back apart on demand.
//! - [`pruning`]: reachability-from-roots and leak attribution.
//! - [`state`]: wraps an [`spc::Spc`] with accumulated errors, constraints,
//!   options and statistics, and implements subsumption (`≤`).
//! - [`errors`] / [`options`] / [`machine`] / [`stats`]: the ambient
//!   infrastructure (§6/§7 of the design) shared by every operation above.
//! - [`external`]: the minimal trait boundary to the collaborators this
//!   crate does not implement (type/size oracle, expression evaluator,
//!   solver, witness export).

pub mod abstraction;
pub mod edges;
pub mod entity;
pub mod errors;
pub mod external;
mod fx;
pub mod machine;
pub mod materializer;
pub mod object;
pub mod options;
pub mod pruning;
pub mod rw;
pub mod smg;
pub mod spc;
pub mod stack_frame;
pub mod state;
pub mod stats;
pub mod value;
pub mod value_map;

pub use crate::edges::{HasValueEdge, PointsToEdge, TargetSpecifier};
pub use crate::entity::{EntityRef, ObjectId, PrimaryMap, ValueId};
pub use crate::errors::{InvalidFreeReason, SmgError, SmgFatal};
pub use crate::external::{
    BaseType, ExpressionEvaluator, NullSolver, Solver, SolverAnswer, TypeSizeOracle,
    WitnessAssignment,
};
pub use crate::machine::{Endianness, MachineModel};
pub use crate::object::{BitNum, Object, SegmentInfo, SegmentKind, SymbolicTermId};
pub use crate::options::{MemoryErrorTarget, Options};
pub use crate::pruning::{LeakReport, ObjectKind};
pub use crate::spc::Spc;
pub use crate::state::State;
pub use crate::stats::Stats;
pub use crate::value::{NumericValue, Value};

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
