//! The symbolic program configuration (§3, §4.E): a functional façade over
//! the SMG, the object arena, globals, the stack of frames, the heap set,
//! externally-allocated objects and the value map.

use im::{HashMap as PHashMap, OrdSet as POrdSet, Vector as PVector};

use crate::edges::{HasValueEdge, PointsToEdge, TargetSpecifier};
use crate::entity::{EntityRef, ObjectId, PrimaryMap, ValueId};
use crate::object::{BitNum, Object};
use crate::smg::Smg;
use crate::stack_frame::StackFrame;
use crate::value::Value;
use crate::value_map::ValueMap;

/// An immutable snapshot of the whole heap + stack + globals (§3).
#[derive(Clone, Debug)]
pub struct Spc {
    arena: PrimaryMap<ObjectId, Object>,
    smg: Smg,
    globals: PHashMap<String, ObjectId>,
    stacks: PVector<StackFrame>,
    heap: POrdSet<ObjectId>,
    /// Objects the host declared externally allocated (§6, §4.F `read`'s
    /// `externallyAllocated` check) together with their assumed validity.
    external: PHashMap<ObjectId, bool>,
    values: ValueMap,
}

/// What kind of declaration `addGlobal`/`addStackObject` is creating —
/// plumbed through only for debug/DOT-dump labeling, never inspected by
/// the core's own logic.
#[derive(Clone, Debug)]
pub struct TypeTag(pub String);

impl Spc {
    /// A fresh configuration: just the null object, no globals, no frames.
    pub fn new(pointer_width_bits: u32) -> Self {
        let mut arena = PrimaryMap::new();
        let null_id = arena.push(Object::null(ObjectId::NULL));
        debug_assert_eq!(null_id, ObjectId::NULL);
        Spc {
            arena,
            smg: Smg::new(),
            globals: PHashMap::new(),
            stacks: PVector::new(),
            heap: POrdSet::new(),
            external: PHashMap::new(),
            values: ValueMap::new(pointer_width_bits),
        }
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        &self.arena[id]
    }

    pub fn smg(&self) -> &Smg {
        &self.smg
    }

    pub fn values(&self) -> &ValueMap {
        &self.values
    }

    pub fn is_valid(&self, id: ObjectId) -> bool {
        self.smg.is_valid(id)
    }

    pub fn is_external(&self, id: ObjectId) -> bool {
        self.external.contains_key(&id)
    }

    pub fn heap_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.heap.iter().copied()
    }

    pub fn global(&self, name: &str) -> Option<ObjectId> {
        self.globals.get(name).copied()
    }

    pub fn stacks(&self) -> &PVector<StackFrame> {
        &self.stacks
    }

    pub fn top_frame(&self) -> Option<&StackFrame> {
        self.stacks.back()
    }

    fn alloc_object(&self, size: BitNum, base_offset: u64) -> (Spc, ObjectId) {
        let mut next = self.clone();
        let id = next.arena.next_key();
        next.arena.push(Object::region(id, size, base_offset));
        next.smg = next.smg.add_object(id, true);
        (next, id)
    }

    /// `addGlobal(size, name, type)` (§4.E).
    pub fn add_global(&self, size: BitNum, name: impl Into<String>, _type_tag: TypeTag) -> (Spc, ObjectId) {
        let name = name.into();
        let (mut next, id) = self.alloc_object(size, 0);
        next.globals.insert(name, id);
        (next, id)
    }

    /// `addStackObject(size, name, type)` (§4.E): placed in the topmost
    /// frame. Panics if there is no active frame — callers must push one
    /// first (a programmer-bug condition, not a State error).
    pub fn add_stack_object(&self, size: BitNum, name: impl Into<String>, _type_tag: TypeTag) -> (Spc, ObjectId) {
        let (mut next, id) = self.alloc_object(size, 0);
        let top = next.stacks.back().cloned().expect("addStackObject with no active frame");
        let updated = top.declare_local(name, id);
        let last = next.stacks.len() - 1;
        next.stacks.set(last, updated);
        (next, id)
    }

    /// `addHeapObject(size)` (§4.E).
    pub fn add_heap_object(&self, size: BitNum) -> (Spc, ObjectId) {
        let (mut next, id) = self.alloc_object(size, 0);
        next.heap.insert(id);
        (next, id)
    }

    pub fn push_frame(&self, frame: StackFrame) -> Spc {
        let mut next = self.clone();
        next.stacks.push_back(frame);
        next
    }

    /// `dropTopFrame`: invalidate every object of the topmost frame, then
    /// pop it (§3 lifecycles, §4.E).
    pub fn drop_top_frame(&self) -> Spc {
        let mut next = self.clone();
        if let Some(top) = next.stacks.pop_back() {
            for obj in top.owned_objects() {
                next.smg = next.smg.set_valid(obj, false);
            }
        }
        next
    }

    /// `removeGlobal(name)` — invalidate the object, keep it as a
    /// tombstone so later reads are flagged (§4.E).
    pub fn remove_global(&self, name: &str) -> Spc {
        let mut next = self.clone();
        if let Some(id) = next.globals.get(name).copied() {
            next.smg = next.smg.set_valid(id, false);
            next.globals.remove(name);
        }
        next
    }

    /// `removeStackVariable(name)` — same tombstoning for the topmost
    /// frame's locals (§4.E).
    pub fn remove_stack_variable(&self, name: &str) -> Spc {
        let mut next = self.clone();
        if let Some(top) = next.stacks.back().cloned() {
            if let Some(id) = top.lookup_local(name) {
                next.smg = next.smg.set_valid(id, false);
                let last = next.stacks.len() - 1;
                next.stacks.set(last, top.remove_local(name));
            }
        }
        next
    }

    pub fn invalidate(&self, obj: ObjectId) -> Spc {
        let mut next = self.clone();
        next.smg = next.smg.set_valid(obj, false);
        next
    }

    pub fn mark_external(&self, obj: ObjectId, valid: bool) -> Spc {
        let mut next = self.clone();
        next.external.insert(obj, valid);
        next.smg = next.smg.add_object(obj, valid);
        next
    }

    /// `dereferencePointer(value)` — `(obj, offset)` for the PTE of
    /// `valueMap(value)`, or `None` (§4.E).
    pub fn dereference_pointer(&self, value: &Value) -> Option<(ObjectId, u64)> {
        let smg_value = self.values.get_smg_value(value)?;
        let pte = self.smg.points_to(smg_value)?;
        Some((pte.target, pte.offset_bits))
    }

    /// `searchOrCreateAddress(obj, offset, nestingLevel, specifier)`
    /// (§4.E): deduplicates against an existing compatible pointer,
    /// otherwise mints a fresh `ValueId` + PTE. "Compatible" means same
    /// target, offset and nesting level, and a specifier that is either
    /// identical or `ALL` (which subsumes FIRST/LAST/REGION, §3 invariant
    /// 5 — ALL may attach to either kind, so it is the least specific and
    /// therefore the one a search should be happy to reuse for any
    /// requested specifier on the same slot).
    pub fn search_or_create_address(
        &self,
        target: ObjectId,
        offset_bits: u64,
        nesting_level: u32,
        specifier: TargetSpecifier,
    ) -> (Spc, Value) {
        for (val_id, edge) in self.smg.pointers_towards(target) {
            if edge.offset_bits == offset_bits
                && edge.nesting_level == nesting_level
                && (edge.specifier == specifier || edge.specifier == TargetSpecifier::All)
            {
                if let Some(v) = self.values.get_value(val_id) {
                    return (self.clone(), v.clone());
                }
            }
        }

        let mut next = self.clone();
        // `ValueId::ZERO` is always pre-seeded (§4.C), so the value map's
        // length already accounts for it; using it directly as the next
        // fresh id keeps ids dense without ever colliding with zero.
        let fresh_id: ValueId = EntityRef::new(self.values.len());
        // Each address is modeled as a distinct symbolic token keyed by
        // its own fresh id, so the value map's numeric-content-collapsing
        // rule (`crate::value_map`) never merges two distinct addresses.
        let fresh_value = Value::Symbolic(crate::object::SymbolicTermId(fresh_id.index() as u32));
        next.values = next.values.insert(fresh_value.clone(), fresh_id);
        next.smg = next
            .smg
            .add_value(fresh_id)
            .write_pte(
                fresh_id,
                PointsToEdge {
                    target,
                    offset_bits,
                    specifier,
                    nesting_level,
                },
            );
        (next, fresh_value)
    }

    // --- Lower-level graph access for `abstraction`, `materializer` and
    // `pruning`, which reason directly in terms of objects and SMGValues
    // rather than high-level `Value`s (§4.G/§4.H/§4.J work at this level
    // in the spec's own pseudocode). ---

    /// The id the next `push_object_with` call will assign.
    pub fn next_object_id(&self) -> ObjectId {
        self.arena.next_key()
    }

    /// Insert a new object built from its own (not-yet-assigned) id —
    /// `build` is handed `next_object_id()` so the constructed `Object`
    /// can carry its own id as cranelift's entity records do.
    pub fn push_object_with(&self, valid: bool, build: impl FnOnce(ObjectId) -> Object) -> (Spc, ObjectId) {
        let mut next = self.clone();
        let id = next.arena.next_key();
        next.arena.push(build(id));
        next.smg = next.smg.add_object(id, valid);
        (next, id)
    }

    pub fn read_hve_raw(&self, obj: ObjectId, off: u64, size: u64, precise: bool) -> Vec<HasValueEdge> {
        self.smg.read_value(obj, off, size, precise)
    }

    pub fn write_hve_raw(&self, obj: ObjectId, off: u64, size: u64, value: ValueId) -> Spc {
        let mut next = self.clone();
        let is_zero = next
            .values
            .get_value(value)
            .map(|v| v.is_zero())
            .unwrap_or(false);
        next.smg = next
            .smg
            .write_value(obj, off, size, value, is_zero, ValueId::ZERO);
        next
    }

    pub fn clear_edges(&self, obj: ObjectId) -> Spc {
        let mut next = self.clone();
        next.smg = next.smg.clear_edges(obj);
        next
    }

    pub fn clear_pte(&self, val: ValueId) -> Spc {
        let mut next = self.clone();
        next.smg = next.smg.clear_pte(val);
        next
    }

    pub fn is_pointer(&self, val: ValueId) -> bool {
        self.smg.is_pointer(val)
    }

    pub fn points_to_raw(&self, val: ValueId) -> Option<PointsToEdge> {
        self.smg.points_to(val).cloned()
    }

    pub fn write_pte_raw(&self, val: ValueId, edge: PointsToEdge) -> Spc {
        let mut next = self.clone();
        next.smg = next.smg.write_pte(val, edge);
        next
    }

    pub fn pointers_towards(&self, obj: ObjectId) -> Vec<(ValueId, PointsToEdge)> {
        self.smg.pointers_towards(obj)
    }

    pub fn replace_specific_pointers_towards(
        &self,
        old: ObjectId,
        new: ObjectId,
        nesting_level: u32,
        specifiers: &[TargetSpecifier],
    ) -> Spc {
        let mut next = self.clone();
        next.smg = next
            .smg
            .replace_specific_pointers_towards(old, new, nesting_level, specifiers);
        next
    }

    pub fn replace_all_pointers_towards_and_increment(
        &self,
        old: ObjectId,
        new: ObjectId,
        delta: u32,
    ) -> Spc {
        let mut next = self.clone();
        next.smg = next
            .smg
            .replace_all_pointers_towards_and_increment(old, new, delta);
        next
    }

    /// Resolve a raw `ValueId` back to the `Value` the host originally
    /// supplied, when one was ever recorded (fresh pointer values minted
    /// purely inside abstraction/materialization may have none).
    pub fn value_of(&self, id: ValueId) -> Option<&Value> {
        self.values.get_value(id)
    }

    pub fn collect_reachable(&self, roots: &[ObjectId]) -> (crate::fx::FxHashSet<ObjectId>, crate::fx::FxHashSet<ValueId>) {
        self.smg.collect_reachable(roots)
    }

    pub fn remove_from_heap(&self, obj: ObjectId) -> Spc {
        let mut next = self.clone();
        next.heap.remove(&obj);
        next
    }

    pub fn add_to_heap(&self, obj: ObjectId) -> Spc {
        let mut next = self.clone();
        next.heap.insert(obj);
        next
    }

    pub fn all_edges(&self) -> Vec<HasValueEdge> {
        self.smg.all_edges()
    }

    /// Mint a fresh, unconstrained symbolic `Value` with no PTE — used by
    /// `State::read` for an uninitialized read or an imprecise overlap
    /// result (§4.F `assignSymbolicValues`, "symbolic read fallback").
    pub fn fresh_symbolic_value(&self) -> (Spc, Value) {
        let mut next = self.clone();
        let fresh_id: ValueId = EntityRef::new(self.values.len());
        let fresh_value = Value::Symbolic(crate::object::SymbolicTermId(fresh_id.index() as u32));
        next.values = next.values.insert(fresh_value.clone(), fresh_id);
        next.smg = next.smg.add_value(fresh_id);
        (next, fresh_value)
    }

    /// The `ValueId` for `value`, minting one if this is its first
    /// appearance (§4.C "value created lazily on first appearance").
    pub fn value_id_for(&self, value: &Value) -> (Spc, ValueId) {
        if let Some(id) = self.values.get_smg_value(value) {
            return (self.clone(), id);
        }
        let mut next = self.clone();
        let fresh_id: ValueId = EntityRef::new(self.values.len());
        next.values = next.values.insert(value.clone(), fresh_id);
        next.smg = next.smg.add_value(fresh_id);
        (next, fresh_id)
    }

    /// Number of distinct named variables currently in scope: every global
    /// plus every local of every active frame (§4.I subsumption's "same
    /// number of tracked variables").
    pub fn tracked_variable_count(&self) -> usize {
        self.globals.len() + self.stacks.iter().map(|f| f.owned_objects().len()).sum::<usize>()
    }

    /// `roots = globals ∪ ⋃ stack variables` (§4.J): every global and every
    /// object owned by an active stack frame, the exact set `pruneUnreachable`
    /// computes for itself rather than taking from the caller.
    pub fn roots(&self) -> Vec<ObjectId> {
        let mut roots: Vec<ObjectId> = self.globals.values().copied().collect();
        for frame in self.stacks.iter() {
            roots.extend(frame.owned_objects());
        }
        roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_heap_object_is_valid_and_in_heap() {
        let spc = Spc::new(64);
        let (spc, id) = spc.add_heap_object(BitNum::Concrete(64));
        assert!(spc.is_valid(id));
        assert!(spc.heap_objects().any(|o| o == id));
    }

    #[test]
    fn search_or_create_address_dedups() {
        let spc = Spc::new(64);
        let (spc, id) = spc.add_heap_object(BitNum::Concrete(64));
        let (spc, v1) = spc.search_or_create_address(id, 0, 0, TargetSpecifier::Region);
        let (spc2, v2) = spc.search_or_create_address(id, 0, 0, TargetSpecifier::Region);
        assert_eq!(v1, v2);
        assert_eq!(spc.values().len(), spc2.values().len());
    }

    #[test]
    fn drop_top_frame_invalidates_locals() {
        let spc = Spc::new(64);
        let spc = spc.push_frame(StackFrame::new("f", None));
        let (spc, id) = spc.add_stack_object(BitNum::Concrete(32), "x", TypeTag("int".into()));
        assert!(spc.is_valid(id));
        let spc = spc.drop_top_frame();
        assert!(!spc.is_valid(id));
        assert!(spc.top_frame().is_none());
    }

    #[test]
    fn remove_global_tombstones() {
        let spc = Spc::new(64);
        let (spc, id) = spc.add_global(BitNum::Concrete(32), "g", TypeTag("int".into()));
        let spc = spc.remove_global("g");
        assert!(spc.global("g").is_none());
        assert!(!spc.is_valid(id));
    }

    #[test]
    fn dereference_pointer_roundtrip() {
        let spc = Spc::new(64);
        let (spc, id) = spc.add_heap_object(BitNum::Concrete(64));
        let (spc, ptr) = spc.search_or_create_address(id, 0, 0, TargetSpecifier::Region);
        let (target, off) = spc.dereference_pointer(&ptr).unwrap();
        assert_eq!(target, id);
        assert_eq!(off, 0);
    }

    proptest::proptest! {
        /// §8 invariant 2 (pointer round-trip): a second identical
        /// `search_or_create_address` call returns the same address `Value`
        /// and mints no new one (the value map's size is unchanged).
        #[test]
        fn search_or_create_address_is_idempotent(off in 0u64..4096, nesting in 0u32..8) {
            let spc = Spc::new(64);
            let (spc, id) = spc.add_heap_object(BitNum::Concrete(8192));
            let (spc, v1) = spc.search_or_create_address(id, off, nesting, TargetSpecifier::Region);
            let before = spc.values().len();
            let (spc2, v2) = spc.search_or_create_address(id, off, nesting, TargetSpecifier::Region);
            proptest::prop_assert_eq!(v1, v2);
            proptest::prop_assert_eq!(spc2.values().len(), before);
        }
    }
}
