//! The symbolic memory graph proper (§4.B): objects, values, has-value
//! edges, points-to edges, validity and a pointer index — all persistent,
//! all operations functional.

use im::{HashMap as PHashMap, OrdSet as POrdSet, Vector as PVector};
use rustc_hash::FxHashSet;

use crate::edges::{HasValueEdge, PointsToEdge, TargetSpecifier};
use crate::entity::{ObjectId, ValueId};

/// The graph itself. Every mutator takes `&self` and returns a new `Smg`;
/// the old one remains valid (and, since the backing containers are
/// persistent, cheap to keep around).
#[derive(Clone, Debug)]
pub struct Smg {
    objects: POrdSet<ObjectId>,
    values: POrdSet<ValueId>,
    /// Per-object edges, kept sorted by offset for deterministic overlap
    /// scans; object fan-out is small so a `Vector` beats a tree here.
    hve: PHashMap<ObjectId, PVector<HasValueEdge>>,
    pte: PHashMap<ValueId, PointsToEdge>,
    valid: PHashMap<ObjectId, bool>,
}

impl Default for Smg {
    fn default() -> Self {
        let mut smg = Smg {
            objects: POrdSet::new(),
            values: POrdSet::new(),
            hve: PHashMap::new(),
            pte: PHashMap::new(),
            valid: PHashMap::new(),
        };
        smg.objects.insert(ObjectId::NULL);
        smg.values.insert(ValueId::ZERO);
        smg.valid.insert(ObjectId::NULL, false);
        smg
    }
}

impl Smg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_object(&self, obj: ObjectId) -> bool {
        self.objects.contains(&obj)
    }

    pub fn contains_value(&self, val: ValueId) -> bool {
        self.values.contains(&val)
    }

    pub fn is_valid(&self, obj: ObjectId) -> bool {
        self.valid.get(&obj).copied().unwrap_or(false)
    }

    pub fn objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.iter().copied()
    }

    pub fn add_object(&self, obj: ObjectId, valid: bool) -> Smg {
        let mut next = self.clone();
        next.objects.insert(obj);
        next.valid.insert(obj, valid);
        next
    }

    pub fn add_value(&self, val: ValueId) -> Smg {
        let mut next = self.clone();
        next.values.insert(val);
        next
    }

    pub fn set_valid(&self, obj: ObjectId, valid: bool) -> Smg {
        let mut next = self.clone();
        next.valid.insert(obj, valid);
        next
    }

    /// `isPointer` — membership in `pte` (§4.B).
    pub fn is_pointer(&self, val: ValueId) -> bool {
        self.pte.contains_key(&val)
    }

    pub fn points_to(&self, val: ValueId) -> Option<&PointsToEdge> {
        self.pte.get(&val)
    }

    /// Record a points-to edge. The specifier/target-kind compatibility
    /// check of §3 invariant 5 is enforced by `Spc`, which is the layer
    /// that actually knows whether `edge.target` is a region or a segment
    /// — the SMG itself only stores edges, not object kinds.
    pub fn write_pte(&self, val: ValueId, edge: PointsToEdge) -> Smg {
        let mut next = self.clone();
        next.pte.insert(val, edge);
        next
    }

    fn edges_of(&self, obj: ObjectId) -> PVector<HasValueEdge> {
        self.hve.get(&obj).cloned().unwrap_or_default()
    }

    /// `readValue(obj, off, size, precise)` (§4.B, §4.F).
    ///
    /// Returns every HVE overlapping `[off, off+size)`. When `precise` is
    /// set and exactly one edge fully contains the requested range, that
    /// single edge is returned (the caller may still need to extract a
    /// sub-range from it via `bit_extract`); otherwise every overlapping
    /// edge is returned and the caller decides how to proceed.
    pub fn read_value(&self, obj: ObjectId, off: u64, size: u64, precise: bool) -> Vec<HasValueEdge> {
        let edges = self.edges_of(obj);
        let overlapping: Vec<HasValueEdge> = edges
            .iter()
            .filter(|e| e.overlaps(off, size))
            .cloned()
            .collect();
        if precise && overlapping.len() == 1 && overlapping[0].contains(off, size) {
            overlapping
        } else {
            overlapping
        }
    }

    /// `writeValue(obj, off, size, v)` (§4.B). Removes every HVE of `obj`
    /// intersecting `[off, off+size)` and inserts the new edge. Writing a
    /// numeric zero into a range that already reads as all-zero of the
    /// same size is a no-op (§4.B, generalized per SPEC_FULL §4.F).
    pub fn write_value(
        &self,
        obj: ObjectId,
        off: u64,
        size: u64,
        value: ValueId,
        is_zero_write: bool,
        zero_value: ValueId,
    ) -> Smg {
        let existing = self.edges_of(obj);
        if is_zero_write
            && existing.iter().any(|e| {
                e.exactly_covers(off, size) && e.value == zero_value
            })
        {
            return self.clone();
        }

        let mut kept: PVector<HasValueEdge> = existing
            .into_iter()
            .filter(|e| !e.overlaps(off, size))
            .collect();
        kept.push_back(HasValueEdge {
            object: obj,
            offset_bits: off,
            size_bits: size,
            value,
        });
        // Keep edges sorted by offset for deterministic iteration/printing.
        let mut sorted: Vec<HasValueEdge> = kept.into_iter().collect();
        sorted.sort_by_key(|e| e.offset_bits);

        let mut next = self.clone();
        next.hve.insert(obj, sorted.into_iter().collect());
        next.values.insert(value);
        next
    }

    /// Remove every HVE of `obj` (used when zeroing nfo/pfo during
    /// abstraction, §4.G step 5, and when invalidating an object).
    pub fn clear_edges(&self, obj: ObjectId) -> Smg {
        let mut next = self.clone();
        next.hve.remove(&obj);
        next
    }

    /// Remove the PTE for `val`, if any.
    pub fn clear_pte(&self, val: ValueId) -> Smg {
        let mut next = self.clone();
        next.pte.remove(&val);
        next
    }

    /// Replace every PTE currently pointing at `old` whose specifier is in
    /// `specifiers` and whose nesting level equals `nesting_level` with one
    /// pointing at `new` (§4.B `replaceSpecificPointersTowards`).
    pub fn replace_specific_pointers_towards(
        &self,
        old: ObjectId,
        new: ObjectId,
        nesting_level: u32,
        specifiers: &[TargetSpecifier],
    ) -> Smg {
        let mut next = self.clone();
        let matches: Vec<ValueId> = next
            .pte
            .iter()
            .filter(|(_, e)| {
                e.target == old && e.nesting_level == nesting_level && specifiers.contains(&e.specifier)
            })
            .map(|(v, _)| *v)
            .collect();
        for v in matches {
            let mut e = next.pte.get(&v).cloned().unwrap();
            e.target = new;
            next.pte.insert(v, e);
        }
        next
    }

    /// Replace *every* PTE pointing at `old` with one pointing at `new`,
    /// incrementing the nesting level by `delta` (§4.B
    /// `replaceAllPointersTowardsWithAndIncrementNestingLevel`).
    pub fn replace_all_pointers_towards_and_increment(
        &self,
        old: ObjectId,
        new: ObjectId,
        delta: u32,
    ) -> Smg {
        let mut next = self.clone();
        let matches: Vec<ValueId> = next
            .pte
            .iter()
            .filter(|(_, e)| e.target == old)
            .map(|(v, _)| *v)
            .collect();
        for v in matches {
            let mut e = next.pte.get(&v).cloned().unwrap();
            e.target = new;
            e.nesting_level += delta;
            next.pte.insert(v, e);
        }
        next
    }

    /// Every has-value edge in the graph, across all objects — used by
    /// subsumption (§4.I), which must compare `other`'s whole memory
    /// content against `this`.
    pub fn all_edges(&self) -> Vec<HasValueEdge> {
        self.hve.values().flat_map(|v| v.iter().cloned()).collect()
    }

    /// All PTEs currently targeting `obj`.
    pub fn pointers_towards(&self, obj: ObjectId) -> Vec<(ValueId, PointsToEdge)> {
        self.pte
            .iter()
            .filter(|(_, e)| e.target == obj)
            .map(|(v, e)| (*v, e.clone()))
            .collect()
    }

    /// `collectReachable(roots)` (§4.B): DFS over objects reachable through
    /// PTEs originating from HVEs in the root set. Returns the reachable
    /// object and value ids. The null object is always implicitly
    /// reachable (§3 invariant 3) and is included unconditionally.
    pub fn collect_reachable(&self, roots: &[ObjectId]) -> (FxHashSet<ObjectId>, FxHashSet<ValueId>) {
        let mut reach_obj: FxHashSet<ObjectId> = FxHashSet::default();
        let mut reach_val: FxHashSet<ValueId> = FxHashSet::default();
        reach_obj.insert(ObjectId::NULL);
        reach_val.insert(ValueId::ZERO);

        let mut worklist: Vec<ObjectId> = roots.to_vec();
        while let Some(obj) = worklist.pop() {
            if !reach_obj.insert(obj) {
                continue;
            }
            for edge in self.edges_of(obj).iter() {
                reach_val.insert(edge.value);
                if let Some(pte) = self.pte.get(&edge.value) {
                    if !reach_obj.contains(&pte.target) {
                        worklist.push(pte.target);
                    }
                }
            }
        }
        (reach_obj, reach_val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;

    fn oid(n: u32) -> ObjectId {
        EntityRef::new(n as usize)
    }
    fn vid(n: u32) -> ValueId {
        EntityRef::new(n as usize)
    }

    #[test]
    fn read_after_write() {
        let smg = Smg::new().add_object(oid(1), true).add_value(vid(5));
        let smg = smg.write_value(oid(1), 0, 32, vid(5), false, ValueId::ZERO);
        let edges = smg.read_value(oid(1), 0, 32, true);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].value, vid(5));
    }

    #[test]
    fn write_zero_over_zero_is_noop() {
        let smg = Smg::new().add_object(oid(1), true);
        let smg = smg.write_value(oid(1), 0, 32, ValueId::ZERO, true, ValueId::ZERO);
        let before = smg.read_value(oid(1), 0, 32, true);
        let smg2 = smg.write_value(oid(1), 0, 32, ValueId::ZERO, true, ValueId::ZERO);
        let after = smg2.read_value(oid(1), 0, 32, true);
        assert_eq!(before, after);
    }

    #[test]
    fn overlapping_write_removes_old_edges() {
        let smg = Smg::new().add_object(oid(1), true);
        let smg = smg.write_value(oid(1), 0, 8, vid(1), false, ValueId::ZERO);
        let smg = smg.write_value(oid(1), 8, 8, vid(2), false, ValueId::ZERO);
        let smg = smg.write_value(oid(1), 4, 8, vid(3), false, ValueId::ZERO);
        let edges = smg.read_value(oid(1), 0, 16, false);
        // The [4,12) write should have evicted both the [0,8) and [8,16) edges.
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].value, vid(3));
    }

    #[test]
    fn collect_reachable_follows_pointers() {
        let smg = Smg::new()
            .add_object(oid(1), true)
            .add_object(oid(2), true)
            .add_value(vid(1));
        let smg = smg.write_pte(
            vid(1),
            PointsToEdge {
                target: oid(2),
                offset_bits: 0,
                specifier: TargetSpecifier::Region,
                nesting_level: 0,
            },
        );
        let smg = smg.write_value(oid(1), 0, 64, vid(1), false, ValueId::ZERO);
        let (reach, _) = smg.collect_reachable(&[oid(1)]);
        assert!(reach.contains(&oid(1)));
        assert!(reach.contains(&oid(2)));
    }

    proptest::proptest! {
        /// §8 invariant 1 (read-after-write), restricted to non-overlapping
        /// single writes: writing `v` at `[off, off+size)` and immediately
        /// reading that exact range back always yields `v`.
        #[test]
        fn read_after_write_roundtrips(off in 0u64..4096, size in 1u64..64, raw in 0u32..u32::MAX) {
            let smg = Smg::new().add_object(oid(1), true).add_value(vid(raw + 1));
            let smg = smg.write_value(oid(1), off, size, vid(raw + 1), false, ValueId::ZERO);
            let edges = smg.read_value(oid(1), off, size, true);
            proptest::prop_assert_eq!(edges.len(), 1);
            proptest::prop_assert_eq!(edges[0].value, vid(raw + 1));
            proptest::prop_assert!(edges[0].exactly_covers(off, size));
        }
    }
}
