//! `State`: the unit a transfer step operates on — an `Spc` snapshot plus
//! accumulated errors, path constraints, the active `Options`, and the
//! machine model (§3 "State — (SPC, errors: list, constraints, options,
//! materializer, machineModel)"). Also home to the read/write/alloc/free
//! entry points that drive `rw`'s bit arithmetic and the materializer when
//! a read exposes an abstract pointer (§4.E/§4.F).

use crate::abstraction::LinkLayout;
use crate::entity::{ObjectId, ValueId};
use crate::errors::{InvalidFreeReason, SmgError, SmgFatal};
use crate::external::{BaseType, Solver, SolverAnswer, TypeSizeOracle};
use crate::fx::FxHashSet;
use crate::machine::MachineModel;
use crate::materializer;
use crate::object::BitNum;
use crate::options::Options;
use crate::pruning;
use crate::rw;
use crate::spc::Spc;
use crate::stats::Stats;
use crate::value::{NumericValue, Value};

/// One path's worth of analysis state. `C` is the host's own constraint
/// representation — opaque to the core beyond `Clone`/`PartialEq`, exactly
/// like the type token passed to `TypeSizeOracle` (§6).
#[derive(Clone, Debug)]
pub struct State<C: Clone + PartialEq> {
    spc: Spc,
    errors: Vec<SmgError>,
    constraints: Vec<C>,
    options: Options,
    machine: MachineModel,
}

impl<C: Clone + PartialEq> State<C> {
    pub fn new(options: Options, machine: MachineModel) -> Self {
        State {
            spc: Spc::new(machine.pointer_width_bits),
            errors: Vec::new(),
            constraints: Vec::new(),
            options,
            machine,
        }
    }

    pub fn spc(&self) -> &Spc {
        &self.spc
    }

    pub fn errors(&self) -> &[SmgError] {
        &self.errors
    }

    pub fn constraints(&self) -> &[C] {
        &self.constraints
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn machine(&self) -> &MachineModel {
        &self.machine
    }

    fn with_spc(&self, spc: Spc) -> Self {
        State { spc, ..self.clone() }
    }

    fn record(&self, error: SmgError) -> Self {
        let mut next = self.clone();
        next.errors.push(error);
        next
    }

    pub fn push_constraint(&self, c: C) -> Self {
        let mut next = self.clone();
        next.constraints.push(c);
        next
    }

    /// `State::alloc(sizeBits) -> (Value pointer, State)` (§4.E): a fresh
    /// heap object, always valid, content uninitialized, plus the `REGION`
    /// address of its byte 0 minted via `searchOrCreateAddress` so the
    /// caller has a `Value` ready to store into the destination variable,
    /// the way `malloc`'s return value is used. The `ObjectId` rides along
    /// too for callers (our own `realloc`, tests) that manage the object
    /// directly rather than only holding its address.
    pub fn alloc(&self, size: BitNum, _stats: &mut Stats) -> (Self, Value, ObjectId) {
        let (spc, id) = self.spc.add_heap_object(size);
        let (spc, ptr) = spc.search_or_create_address(id, 0, 0, crate::edges::TargetSpecifier::Region);
        (self.with_spc(spc), ptr, id)
    }

    /// `State::calloc(count, elemSizeBits)` — `alloc` of `count * elemSizeBits`
    /// with every byte pre-zeroed.
    pub fn calloc(&self, count: u64, elem_size_bits: u64, stats: &mut Stats) -> (Self, Value, ObjectId) {
        let total = BitNum::Concrete(count * elem_size_bits);
        let (spc, id) = self.spc.add_heap_object(total);
        let (spc, ptr) = spc.search_or_create_address(id, 0, 0, crate::edges::TargetSpecifier::Region);
        let size_bits = count * elem_size_bits;
        let spc = spc.write_hve_raw(id, 0, size_bits, ValueId::ZERO);
        stats.writes += 1;
        (self.with_spc(spc), ptr, id)
    }

    /// `State::free(pointerValue)` (§4.E, §7 invalid-free reasons).
    pub fn free(&self, pointer: &Value) -> Self {
        if pointer.is_zero() {
            return if self.options.free_null_is_noop {
                self.clone()
            } else {
                self.record(SmgError::InvalidFree {
                    object: ObjectId::NULL,
                    reason: InvalidFreeReason::NonZeroOffset,
                })
            };
        }
        let Some((target, offset)) = self.spc.dereference_pointer(pointer) else {
            return self.record(SmgError::InvalidFree {
                object: ObjectId::NULL,
                reason: InvalidFreeReason::NonHeap,
            });
        };
        if offset != 0 {
            return self.record(SmgError::InvalidFree {
                object: target,
                reason: InvalidFreeReason::NonZeroOffset,
            });
        }
        if !self.spc.heap_objects().any(|o| o == target) {
            return self.record(SmgError::InvalidFree {
                object: target,
                reason: InvalidFreeReason::NonHeap,
            });
        }
        if !self.spc.is_valid(target) {
            return self.record(SmgError::InvalidFree {
                object: target,
                reason: InvalidFreeReason::DoubleFree,
            });
        }
        let spc = self.spc.invalidate(target).remove_from_heap(target);
        self.with_spc(spc)
    }

    /// `State::realloc(pointerValue, newSizeBits)` (§4.E): `alloc` the new
    /// size, bounded-copy `min(old, new)` bits, then `free` the old object.
    /// If the old pointer doesn't resolve this is an invalid-free, not an
    /// invalid-read, matching `free`'s own error taxonomy.
    pub fn realloc(&self, pointer: &Value, new_size_bits: u64, stats: &mut Stats) -> (Self, Option<Value>) {
        let Some((old_obj, _offset)) = self.spc.dereference_pointer(pointer) else {
            let failed = self.record(SmgError::InvalidFree {
                object: ObjectId::NULL,
                reason: InvalidFreeReason::NonHeap,
            });
            return (failed, None);
        };
        let old_size = self.spc.object(old_obj).size.concrete().unwrap_or(0);
        let (next, new_ptr, new_obj) = self.alloc(BitNum::Concrete(new_size_bits), stats);
        let copy_bits = old_size.min(new_size_bits);
        let spc = next.spc.clone();
        let spc = copy_range(&spc, old_obj, 0, new_obj, 0, copy_bits);
        let next = next.with_spc(spc);
        let next = next.free(pointer);
        (next, Some(new_ptr))
    }

    /// `copyRange` entry point (§4.F `[ADD]`), exposed directly for
    /// `memcpy`/`memmove`/struct-assignment callers that are not going
    /// through `realloc`.
    pub fn copy_range(&self, src: ObjectId, src_off: u64, dst: ObjectId, dst_off: u64, size_bits: u64) -> Self {
        self.with_spc(copy_range(&self.spc, src, src_off, dst, dst_off, size_bits))
    }

    /// Prune unreachable memory from `globals ∪ ⋃ stack variables` (§4.J),
    /// recording a `MemoryLeak` error for any valid heap object that was
    /// dropped. The root set is `self.spc`'s own, never supplied by the
    /// caller — see `Spc::roots`.
    pub fn prune_unreachable(&self, stats: &mut Stats) -> Self {
        let (spc, report) = pruning::prune_unreachable(&self.spc);
        let mut next = self.with_spc(spc);
        if !report.is_empty() {
            stats.prunes += 1;
            stats.objects_leaked += report.objects.len() as u64;
            next = next.record(SmgError::MemoryLeak { objects: report.object_ids() });
        }
        next
    }

    /// Dereference `pointer` and, if its target is an abstract segment,
    /// materialize one element, returning every successor (one, or two
    /// for a 0+ segment). Returns `Err` only for the fatal conditions
    /// `materializer::materialize` itself raises.
    pub fn materialize_if_abstract(&self, pointer: &Value, layout: LinkLayout, stats: &mut Stats) -> Result<Vec<Self>, SmgFatal> {
        let Some(val) = self.spc.values().get_smg_value(pointer) else {
            return Ok(vec![self.clone()]);
        };
        let Some(edge) = self.spc.points_to_raw(val) else {
            return Ok(vec![self.clone()]);
        };
        if !self.spc.object(edge.target).is_segment() {
            return Ok(vec![self.clone()]);
        }
        let results = materializer::materialize(&self.spc, edge.target, val, layout)?;
        stats.materializations += 1;
        if results.len() == 2 {
            stats.zero_plus_splits += 1;
        }
        Ok(results.into_iter().map(|spc| self.with_spc(spc)).collect())
    }

    /// `read(obj, off, ty)` (§4.F): validates the target, forwards to
    /// `SMG::readValue`, and transparently drives the materializer when the
    /// value found is a pointer into an SLL/DLL segment — one `(value,
    /// successor state)` pair comes back per materializer branch (two only
    /// when a 0+ segment had to split). A `None` value means the read
    /// degraded to "unknown" (logged, not fatal); the accompanying error,
    /// if any, is already recorded on that branch's state.
    pub fn read<Ty>(
        &self,
        obj: ObjectId,
        off: u64,
        ty: &Ty,
        oracle: &dyn TypeSizeOracle<Ty>,
        layout: LinkLayout,
        stats: &mut Stats,
    ) -> Result<Vec<(Option<Value>, Self)>, SmgFatal> {
        if !self.spc.is_valid(obj) && !self.spc.is_external(obj) {
            let failed = self.record(SmgError::InvalidRead {
                object: obj,
                message: "read of an invalid or unmapped object".into(),
            });
            return Ok(vec![(None, failed)]);
        }

        let size = match oracle.size_bits(ty).concrete() {
            Some(s) => s,
            None => {
                return if self.options.overapproximate_values_for_symbolic_size {
                    Ok(vec![(None, self.clone())])
                } else {
                    Ok(vec![(
                        None,
                        self.record(SmgError::UnknownOffsetAccess { object: obj }),
                    )])
                };
            }
        };

        stats.reads += 1;
        let edges = self
            .spc
            .read_hve_raw(obj, off, size, self.options.precise_smg_read);

        if edges.len() > 1 {
            // §4.F `symbolic_read_fallback`: several edges overlap the
            // requested range without one fully covering it.
            stats.partial_reads += 1;
            let (spc, value) = self.spc.fresh_symbolic_value();
            return Ok(vec![(Some(value), self.with_spc(spc))]);
        }

        let Some(edge) = edges.first() else {
            return if self.options.assign_symbolic_values {
                let (spc, value) = self.spc.fresh_symbolic_value();
                Ok(vec![(Some(value), self.with_spc(spc))])
            } else {
                Ok(vec![(
                    None,
                    self.record(SmgError::UseOfUninitialized { object: obj }),
                )])
            };
        };

        if edge.exactly_covers(off, size) {
            if self.spc.is_pointer(edge.value) {
                let target_edge = self
                    .spc
                    .points_to_raw(edge.value)
                    .expect("is_pointer implies a recorded PTE");
                if self.spc.object(target_edge.target).is_segment() {
                    let successors =
                        materializer::materialize(&self.spc, target_edge.target, edge.value, layout)?;
                    stats.materializations += 1;
                    if successors.len() == 2 {
                        stats.zero_plus_splits += 1;
                    }
                    let mut out = Vec::with_capacity(successors.len());
                    for spc in successors {
                        out.extend(self.with_spc(spc).read(obj, off, ty, oracle, layout, stats)?);
                    }
                    return Ok(out);
                }
            }
            let value = self.spc.value_of(edge.value).cloned();
            return Ok(vec![(translate(value, oracle.base_type(ty)), self.clone())]);
        }

        // Partial read: the covering edge is wider than what was asked for.
        let stored = self.spc.value_of(edge.value).cloned().and_then(|v| v.as_numeric());
        let extracted = stored.and_then(|numeric| {
            rw::bit_extract(
                numeric,
                edge.offset_bits,
                edge.size_bits,
                off,
                size,
                self.machine.endianness,
            )
        });
        match extracted {
            Some(n) => Ok(vec![(
                Some(Value::Numeric(maybe_reinterpret(n, oracle.base_type(ty)))),
                self.clone(),
            )]),
            None => Ok(vec![(None, self.clone())]),
        }
    }

    /// `write(obj, off, ty, value)` (§4.F): checked — validates the target
    /// is non-null and valid and the range falls inside
    /// `[obj.offset, obj.offset + obj.size)`, consulting the solver
    /// collaborator for a symbolic object size. A symbolic *write size*
    /// with overapproximation disabled is the one `write`-side condition
    /// §7 calls fatal rather than recoverable.
    pub fn write<Ty>(
        &self,
        obj: ObjectId,
        off: u64,
        ty: &Ty,
        value: Value,
        oracle: &dyn TypeSizeOracle<Ty>,
        solver: &dyn Solver<C>,
        stats: &mut Stats,
    ) -> Result<Self, SmgFatal> {
        if obj == ObjectId::NULL || !self.spc.is_valid(obj) {
            return Ok(self.record(SmgError::InvalidWrite {
                object: obj,
                message: "write to a null or invalid object".into(),
            }));
        }

        let size = match oracle.size_bits(ty).concrete() {
            Some(s) => s,
            None => {
                if !self.options.overapproximate_for_symbolic_write {
                    return Err(SmgFatal::SymbolicSizeWriteNotOverapproximated);
                }
                return Ok(self.clone());
            }
        };

        let object_size = self.spc.object(obj).size.clone();
        let in_bounds = match object_size.concrete() {
            Some(total) => off + size <= total,
            None => match solver.check_memory_access_is_in_bounds(
                &BitNum::Concrete(off),
                &BitNum::Concrete(size),
                &object_size,
                &self.constraints,
            ) {
                SolverAnswer::Unsat => true,
                SolverAnswer::Sat => false,
                SolverAnswer::Unknown => {
                    return Ok(self.record(SmgError::UnknownOffsetAccess { object: obj }));
                }
            },
        };
        if !in_bounds {
            return Ok(self.record(SmgError::InvalidWrite {
                object: obj,
                message: format!("write [{off}, {off}+{size}) falls outside the object"),
            }));
        }

        stats.writes += 1;
        let (spc, smg_value) = self.spc.value_id_for(&value);
        let spc = spc.write_hve_raw(obj, off, size, smg_value);
        Ok(self.with_spc(spc))
    }

    /// `this ≤ other` (§4.I): equal tracked-variable count, `other`'s
    /// constraints superset `this`'s, every one of `this`'s errors present
    /// in `other`, stack frames agreeing on function/return shape, and
    /// every `(object, offset, value)` `other` carries has an equivalent
    /// counterpart in `this`.
    pub fn subsumes(&self, other: &State<C>, stats: &mut Stats) -> bool {
        stats.subsumption_checks += 1;
        if self.spc.tracked_variable_count() != other.spc.tracked_variable_count() {
            return false;
        }
        if !self.constraints.iter().all(|c| other.constraints.contains(c)) {
            return false;
        }
        if !self.errors.iter().all(|e| other.errors.contains(e)) {
            return false;
        }
        if self.spc.stacks().len() != other.spc.stacks().len() {
            return false;
        }
        for (a, b) in self.spc.stacks().iter().zip(other.spc.stacks().iter()) {
            if a.function() != b.function() || a.return_object() != b.return_object() {
                return false;
            }
        }
        let mut cache: FxHashSet<(ValueId, ValueId)> = FxHashSet::default();
        for edge in other.spc.all_edges() {
            let this_edges = self.spc.read_hve_raw(edge.object, edge.offset_bits, edge.size_bits, true);
            let found = this_edges.iter().any(|e| {
                e.offset_bits == edge.offset_bits
                    && e.size_bits == edge.size_bits
                    && values_equivalent(&self.spc, e.value, &other.spc, edge.value, &self.options, &mut cache)
            });
            if !found {
                return false;
            }
        }
        true
    }
}

/// `copyRange(srcObj, srcOff, dstObj, dstOff, sizeBits)` (§4.F `[ADD]`):
/// reads every HVE in the source range and rewrites it at the
/// corresponding destination offset, preserving pointer edges. Same-object
/// overlap with `dstOff > srcOff` is copied high-to-low (`memmove`
/// semantics); every other case, including `memcpy`-style UB overlap, is
/// copied low-to-high, which is conservative rather than a second code
/// path for "undefined".
fn copy_range(spc: &Spc, src: ObjectId, src_off: u64, dst: ObjectId, dst_off: u64, size_bits: u64) -> Spc {
    let edges = spc.read_hve_raw(src, src_off, size_bits, false);
    let mut ordered = edges;
    if src == dst && dst_off > src_off {
        ordered.sort_by(|a, b| b.offset_bits.cmp(&a.offset_bits));
    } else {
        ordered.sort_by(|a, b| a.offset_bits.cmp(&b.offset_bits));
    }
    let mut next = spc.clone();
    for edge in ordered {
        let rel = edge.offset_bits.saturating_sub(src_off);
        let dest_off = dst_off + rel;
        next = next.write_hve_raw(dst, dest_off, edge.size_bits, edge.value);
    }
    next
}

/// Apply a union float/integer reinterpretation to a freshly read `Value`
/// when the requested type disagrees with the stored numeric shape (§4.F
/// "Union float/integer conversion"). Pointers and symbolics pass through
/// unchanged; a reinterpretation outside the widths `rw` models degrades to
/// the value as stored rather than losing it outright.
fn translate(value: Option<Value>, want: BaseType) -> Option<Value> {
    let v = value?;
    match &v {
        Value::Numeric(n) => Some(Value::Numeric(maybe_reinterpret(*n, want))),
        _ => Some(v),
    }
}

/// Same reinterpretation, already unwrapped to a `NumericValue` — used by
/// the partial-read path, which extracts a `NumericValue` directly rather
/// than going through a full `Value`.
fn maybe_reinterpret(n: NumericValue, want: BaseType) -> NumericValue {
    let is_float = matches!(n, NumericValue::Float { .. });
    let mismatched = match want {
        BaseType::Float => !is_float,
        BaseType::Integer => is_float,
        BaseType::Pointer => false,
    };
    if !mismatched {
        return n;
    }
    rw::reinterpret_union(n, want == BaseType::Float).unwrap_or(n)
}

/// Recursive, cycle-breaking pointer-shape equivalence for subsumption
/// (§4.I). `val_a` is looked up in `spc_a`, `val_b` in `spc_b` — the two
/// states being compared need not be the same `Spc`.
fn values_equivalent(
    spc_a: &Spc,
    val_a: ValueId,
    spc_b: &Spc,
    val_b: ValueId,
    options: &Options,
    cache: &mut FxHashSet<(ValueId, ValueId)>,
) -> bool {
    if val_a == val_b {
        return true;
    }
    let a = spc_a.value_of(val_a);
    let b = spc_b.value_of(val_b);
    match (a, b) {
        (Some(Value::Numeric(na)), Some(Value::Numeric(nb))) => {
            if is_nan(*na) || is_nan(*nb) {
                return false;
            }
            na == nb
        }
        (Some(Value::Symbolic(sa)), Some(Value::Symbolic(sb))) => {
            if options.treat_symbolic_values_as_unknown {
                true
            } else {
                sa == sb
            }
        }
        _ => {
            let pa = spc_a.points_to_raw(val_a);
            let pb = spc_b.points_to_raw(val_b);
            match (pa, pb) {
                (Some(edge_a), Some(edge_b)) => {
                    if !cache.insert((val_a, val_b)) {
                        // Already assumed equal while descending — breaks
                        // the cycle co-inductively.
                        return true;
                    }
                    pointer_targets_equivalent(spc_a, &edge_a, spc_b, &edge_b, options, cache)
                }
                _ => false,
            }
        }
    }
}

fn is_nan(n: crate::value::NumericValue) -> bool {
    match n {
        crate::value::NumericValue::Float { bits, width_bits: 32 } => {
            let b = bits as u32;
            let exp = (b >> 23) & 0xFF;
            let mantissa = b & 0x7FFFFF;
            exp == 0xFF && mantissa != 0
        }
        crate::value::NumericValue::Float { bits, width_bits: 64 } => {
            let exp = (bits >> 52) & 0x7FF;
            let mantissa = bits & 0xF_FFFF_FFFF_FFFF;
            exp == 0x7FF && mantissa != 0
        }
        _ => false,
    }
}

fn pointer_targets_equivalent(
    spc_a: &Spc,
    edge_a: &crate::edges::PointsToEdge,
    spc_b: &Spc,
    edge_b: &crate::edges::PointsToEdge,
    options: &Options,
    cache: &mut FxHashSet<(ValueId, ValueId)>,
) -> bool {
    if edge_a.specifier != edge_b.specifier || edge_a.nesting_level != edge_b.nesting_level {
        return false;
    }
    let oa = spc_a.object(edge_a.target);
    let ob = spc_b.object(edge_b.target);
    if oa.base_offset != ob.base_offset {
        return false;
    }
    if spc_a.is_valid(edge_a.target) != spc_b.is_valid(edge_b.target) {
        return false;
    }
    match (oa.size.concrete(), ob.size.concrete()) {
        (Some(sa), Some(sb)) if sa != sb => return false,
        (None, _) | (_, None) if oa.size != ob.size => return false,
        _ => {}
    }
    let (link_offsets_a, link_offsets_b) = match (&oa.segment, &ob.segment) {
        (Some(sa), Some(sb)) => {
            if sa.kind != sb.kind {
                return false;
            }
            if sa.min_length < sb.min_length {
                return false;
            }
            (
                vec![sa.nfo].into_iter().chain(sa.pfo).collect::<Vec<_>>(),
                vec![sb.nfo].into_iter().chain(sb.pfo).collect::<Vec<_>>(),
            )
        }
        (None, None) => (Vec::new(), Vec::new()),
        _ => return false,
    };

    let edges_a: Vec<_> = spc_a
        .read_hve_raw(edge_a.target, 0, oa.size.concrete().unwrap_or(0), false)
        .into_iter()
        .filter(|e| !link_offsets_a.contains(&e.offset_bits))
        .collect();
    let edges_b: Vec<_> = spc_b
        .read_hve_raw(edge_b.target, 0, ob.size.concrete().unwrap_or(0), false)
        .into_iter()
        .filter(|e| !link_offsets_b.contains(&e.offset_bits))
        .collect();
    if edges_a.len() != edges_b.len() {
        return false;
    }
    for ea in &edges_a {
        let counterpart = edges_b
            .iter()
            .find(|eb| eb.offset_bits == ea.offset_bits && eb.size_bits == ea.size_bits);
        match counterpart {
            Some(eb) => {
                if !values_equivalent(spc_a, ea.value, spc_b, eb.value, options, cache) {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestState = State<u32>;

    #[test]
    fn alloc_then_free_roundtrips() {
        let mut stats = Stats::new();
        let state = TestState::new(Options::default(), MachineModel::linux64());
        let (state, ptr, obj) = state.alloc(BitNum::Concrete(64), &mut stats);
        assert!(state.spc().is_valid(obj));
        let state = state.free(&ptr);
        assert!(!state.spc().is_valid(obj));
        assert!(state.errors().is_empty());
    }

    #[test]
    fn calloc_zero_fills_and_mints_an_address() {
        let mut stats = Stats::new();
        let state = TestState::new(Options::default(), MachineModel::linux64());
        let (state, ptr, obj) = state.calloc(4, 32, &mut stats);
        assert_eq!(
            state.spc().dereference_pointer(&ptr),
            Some((obj, 0)),
            "calloc's returned pointer must dereference to byte 0 of the new object"
        );
        let edges = state.spc().read_hve_raw(obj, 0, 128, true);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].value, ValueId::ZERO);
    }

    #[test]
    fn realloc_copies_bounded_prefix_and_frees_the_old_object() {
        let mut stats = Stats::new();
        let state = TestState::new(Options::default(), MachineModel::linux64());
        let (state, old_ptr, old_obj) = state.alloc(BitNum::Concrete(64), &mut stats);
        let old_id = state.spc().values().get_smg_value(&old_ptr).unwrap();
        let spc = state.spc().clone().write_hve_raw(old_obj, 0, 64, old_id);
        let state = state.with_spc(spc);
        let (state, new_ptr) = state.realloc(&old_ptr, 128, &mut stats);
        let new_ptr = new_ptr.expect("realloc of a valid heap pointer always yields a new object");
        let (new_obj, offset) = state.spc().dereference_pointer(&new_ptr).unwrap();
        assert_eq!(offset, 0);
        assert!(!state.spc().is_valid(old_obj), "the old object must be freed");
        let copied = state.spc().read_hve_raw(new_obj, 0, 64, true);
        assert_eq!(copied[0].value, old_id);
    }

    #[test]
    fn double_free_is_recorded() {
        let mut stats = Stats::new();
        let state = TestState::new(Options::default(), MachineModel::linux64());
        let (state, ptr, _obj) = state.alloc(BitNum::Concrete(64), &mut stats);
        let state = state.free(&ptr);
        let state = state.free(&ptr);
        assert_eq!(state.errors().len(), 1);
        assert!(matches!(
            state.errors()[0],
            SmgError::InvalidFree { reason: InvalidFreeReason::DoubleFree, .. }
        ));
    }

    #[test]
    fn free_of_null_is_noop_by_default() {
        let state = TestState::new(Options::default(), MachineModel::linux64());
        let state = state.free(&Value::zero(64));
        assert!(state.errors().is_empty());
    }

    #[test]
    fn leaked_heap_object_is_reported() {
        let mut stats = Stats::new();
        let state = TestState::new(Options::default(), MachineModel::linux64());
        let (state, _ptr, _obj) = state.alloc(BitNum::Concrete(64), &mut stats);
        let state = state.prune_unreachable(&mut stats);
        assert_eq!(state.errors().len(), 1);
        assert_eq!(stats.objects_leaked, 1);
    }

    #[test]
    fn a_state_subsumes_itself() {
        let mut stats = Stats::new();
        let state = TestState::new(Options::default(), MachineModel::linux64());
        let (state, _ptr, _obj) = state.alloc(BitNum::Concrete(64), &mut stats);
        assert!(state.subsumes(&state, &mut stats));
        assert_eq!(stats.subsumption_checks, 1);
    }

    #[test]
    fn copy_range_preserves_pointer_edges() {
        let state = TestState::new(Options::default(), MachineModel::linux64());
        let mut stats = Stats::new();
        let (state, _a_ptr, a) = state.alloc(BitNum::Concrete(64), &mut stats);
        let (state, b_ptr, b) = state.alloc(BitNum::Concrete(64), &mut stats);
        let spc = state.spc().clone();
        let ptr_id = spc.values().get_smg_value(&b_ptr).unwrap();
        let spc = spc.write_hve_raw(a, 0, 64, ptr_id);
        let state = state.with_spc(spc);
        let state = state.copy_range(a, 0, b, 0, 64);
        let copied = state.spc().read_hve_raw(b, 0, 64, true);
        assert_eq!(copied[0].value, ptr_id);
    }
}
