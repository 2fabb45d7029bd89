//! Collaborator interfaces (§6): the type/size oracle, the expression
//! evaluator, the solver, and the witness-assignment shape the core hands
//! back to an external witness writer. All are object-safe so a host can
//! box a single trait object per collaborator.

use crate::entity::{ObjectId, ValueId};
use crate::object::BitNum;
use crate::value::Value;

/// Base type classification the type/size oracle reports for a type
/// token, used by the read/write algebra to decide whether a union
/// reinterpretation applies (§4.F).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BaseType {
    Integer,
    Float,
    Pointer,
}

/// Collaborator: type & size oracle (§6). Maps an opaque type token (the
/// host's own type representation; the core never inspects it) to a size
/// and a base classification.
pub trait TypeSizeOracle<Ty> {
    fn size_bits(&self, ty: &Ty) -> BitNum;
    fn base_type(&self, ty: &Ty) -> BaseType;
}

/// Collaborator: expression evaluator (§6). Evaluating an expression
/// against a `State` may branch into several successor states, each
/// carrying the `Value` the expression took on along that branch.
pub trait ExpressionEvaluator<Expr, S> {
    fn evaluate(&self, expr: &Expr, state: &S) -> Vec<(Value, S)>;
}

/// An external solver's answer to a boundary check (§6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SolverAnswer {
    Unsat,
    Sat,
    Unknown,
}

/// Collaborator: solver (§6). `check_memory_access_is_in_bounds` asks
/// whether the *negation* of "access is in bounds" is unsatisfiable given
/// the accumulated constraint list; `Unknown` covers both a genuine
/// solver timeout and the case where solver tracking is switched off.
pub trait Solver<Constraint> {
    fn check_memory_access_is_in_bounds(
        &self,
        offset: &BitNum,
        size: &BitNum,
        object_size: &BitNum,
        constraints: &[Constraint],
    ) -> SolverAnswer;
}

/// A convenience `Solver` that never actually solves anything — every
/// query answers `Unknown`, driving the "unknown-offset" degraded path
/// described in §4.F/§7. Useful for hosts/tests that have not wired a
/// real SMT backend; not a claim that `smg-core` bundles a solver.
pub struct NullSolver;

impl<Constraint> Solver<Constraint> for NullSolver {
    fn check_memory_access_is_in_bounds(
        &self,
        _offset: &BitNum,
        _size: &BitNum,
        _object_size: &BitNum,
        _constraints: &[Constraint],
    ) -> SolverAnswer {
        SolverAnswer::Unknown
    }
}

/// One `(memoryLocation, value, sizeBits)` triple of a concrete path
/// assignment (§6). The witness writer (out of scope) renders a list of
/// these to the external counterexample format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WitnessAssignment {
    pub object: ObjectId,
    pub offset_bits: u64,
    pub value: ValueId,
    pub size_bits: u64,
}
