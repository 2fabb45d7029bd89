//! Folding chains of equal concrete objects into SLL/DLL summary segments
//! (§4.G).
//!
//! The chain-walk and field-equality check below compare values by
//! `ValueId` identity rather than the full recursive pointer-shape
//! comparison `state::equivalent` performs for subsumption (§4.I) — this is
//! a conservative simplification (fewer chains fold than the spec's ideal
//! algorithm would find) rather than an unsound one: folding strictly
//! fewer candidates can never merge objects that should have stayed
//! distinct. See DESIGN.md.

use crate::edges::TargetSpecifier;
use crate::entity::ObjectId;
use crate::errors::SmgFatal;
use crate::object::{Object, SegmentInfo, SegmentKind};
use crate::spc::Spc;
use crate::stats::Stats;

/// Parameters describing where the link fields live, supplied by the host
/// (the core has no type information of its own, §1).
#[derive(Copy, Clone, Debug)]
pub struct LinkLayout {
    pub kind: SegmentKind,
    pub nfo: u64,
    pub pfo: Option<u64>,
    pub pointer_width_bits: u64,
    /// Mirrors `Options::abstract_allow_head_offset_mismatch` (§9 Open
    /// Question 2): when `false`, `candidate_next` requires `root` and
    /// `next` to share a `base_offset`; when `true`, only the non-link
    /// fields need to compare equal and the folded segment keeps the
    /// root's head offset regardless.
    pub allow_head_offset_mismatch: bool,
}

fn object_len(obj: &Object) -> u64 {
    obj.abstract_len()
}

/// Precondition check for `(root, next)` (§4.G): `next` must be the PTE
/// target of `root`'s nfo edge, distinct from `root`, both valid, same
/// concrete size and base offset, and every non-link field must compare
/// equal by value identity.
///
/// `Ok(None)` means "no candidate here, move on" — the ordinary case for a
/// root with no outgoing link, a dangling/self link, or fields that genuinely
/// differ. Once an actual `(root, next)` pair has been identified, though,
/// their sizes must be comparable to fold at all; finding a symbolic size at
/// that point is §4.K's "abstraction over objects with symbolic,
/// non-comparable sizes" programmer-bug condition, not silently "nothing to
/// fold", so it is raised as `Err` instead of flattened into `Ok(None)`.
fn candidate_next(spc: &Spc, root: ObjectId, layout: LinkLayout) -> Result<Option<ObjectId>, SmgFatal> {
    let root_obj = spc.object(root);
    if !spc.is_valid(root) {
        return Ok(None);
    }
    let link_edges = spc.read_hve_raw(root, layout.nfo, layout.pointer_width_bits, true);
    let Some(next_val) = link_edges.first().map(|e| e.value) else {
        return Ok(None);
    };
    let Some(pte) = spc.points_to_raw(next_val) else {
        return Ok(None);
    };
    let next = pte.target;
    if next == root || next == ObjectId::NULL {
        return Ok(None);
    }
    if !spc.is_valid(next) {
        return Ok(None);
    }
    let next_obj = spc.object(next);
    let (root_size, next_size) = match (root_obj.size.concrete(), next_obj.size.concrete()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(SmgFatal::AbstractionIncomparableSizes { a: root, b: next }),
    };
    if next_size != root_size {
        return Ok(None);
    }
    let size = root_size;
    if !layout.allow_head_offset_mismatch && root_obj.base_offset != next_obj.base_offset {
        return Ok(None);
    }

    // Every offset other than nfo/pfo must compare equal.
    let root_edges = spc.read_hve_raw(root, 0, size, false);
    let next_edges = spc.read_hve_raw(next, 0, size, false);
    for edge in &root_edges {
        if edge.offset_bits == layout.nfo || Some(edge.offset_bits) == layout.pfo {
            continue;
        }
        let counterpart = next_edges
            .iter()
            .find(|e| e.offset_bits == edge.offset_bits && e.size_bits == edge.size_bits);
        match counterpart {
            Some(e) if e.value == edge.value => continue,
            _ => return Ok(None),
        }
    }
    Ok(Some(next))
}

/// Fold exactly the pair `(root, next)` returned by `candidate_next` into a
/// single summary segment, following §4.G's numbered steps. Returns the
/// new segment's id alongside the updated `Spc`.
fn fold_pair(spc: &Spc, root: ObjectId, next: ObjectId, layout: LinkLayout) -> (Spc, ObjectId) {
    let root_obj = spc.object(root).clone();
    let next_obj = spc.object(next).clone();
    let next_len = object_len(&next_obj);
    let root_len = object_len(&root_obj);
    // `next`'s own nfo/pfo edges describe where the chain continues past
    // the element being absorbed; the new segment inherits them verbatim
    // so a later fold can keep walking forward from it.
    let next_nfo = spc
        .read_hve_raw(next, layout.nfo, layout.pointer_width_bits, true)
        .first()
        .map(|e| e.value);
    let root_pfo = layout.pfo.and_then(|pfo| {
        spc.read_hve_raw(root, pfo, layout.pointer_width_bits, true)
            .first()
            .map(|e| e.value)
    });

    // Step 1: allocate the new segment.
    let (mut spc, seg) = spc.push_object_with(true, |id| Object {
        id,
        size: root_obj.size.clone(),
        base_offset: root_obj.base_offset,
        nesting_level: 0,
        is_const_string: false,
        segment: Some(SegmentInfo {
            kind: layout.kind,
            head_offset: root_obj
                .segment
                .as_ref()
                .map(|s| s.head_offset)
                .unwrap_or(root_obj.base_offset),
            nfo: layout.nfo,
            pfo: layout.pfo,
            min_length: root_len + next_len,
        }),
    });

    // Step 2: copy next's HVEs into the new segment, then restore the
    // forwarding link fields captured above (§4.G step 2).
    let size = next_obj.size.concrete().unwrap_or(0);
    for edge in spc.read_hve_raw(next, 0, size, false) {
        if edge.offset_bits == layout.nfo || Some(edge.offset_bits) == layout.pfo {
            continue;
        }
        spc = spc.write_hve_raw(seg, edge.offset_bits, edge.size_bits, edge.value);
    }
    if let Some(nfo_val) = next_nfo {
        spc = spc.write_hve_raw(seg, layout.nfo, layout.pointer_width_bits, nfo_val);
    }
    if let (Some(pfo), Some(pfo_val)) = (layout.pfo, root_pfo) {
        spc = spc.write_hve_raw(seg, pfo, layout.pointer_width_bits, pfo_val);
    }

    // Step 3: every PTE that pointed to `next` now points to `seg`,
    // specifier unchanged.
    for (val, mut edge) in spc.pointers_towards(next) {
        edge.target = seg;
        spc = spc.write_pte_raw(val, edge);
    }

    // Step 4: every PTE that pointed to `root` now points to `seg` with
    // nesting level incremented by `next`'s length; an originally-concrete
    // root gets a FIRST pointer recorded (segment heads are always
    // reachable via FIRST), an already-abstract root keeps ALL.
    let increment = next_len as u32;
    spc = spc.replace_all_pointers_towards_and_increment(root, seg, increment);
    let was_segment = root_obj.is_segment();
    for (val, edge) in spc.pointers_towards(seg) {
        if edge.target == seg && edge.specifier == TargetSpecifier::Region {
            let fixed = crate::edges::PointsToEdge {
                specifier: if was_segment {
                    TargetSpecifier::All
                } else {
                    TargetSpecifier::First
                },
                ..edge
            };
            spc = spc.write_pte_raw(val, fixed);
        }
    }

    // Step 5: zero out root/next's link edges and drop both objects (their
    // content already lives in `seg`; zeroing first prevents a stale nfo
    // edge from making the old, now-invalid objects look reachable).
    spc = spc.clear_edges(root).clear_edges(next);
    spc = spc.invalidate(root).invalidate(next);
    spc = spc.remove_from_heap(root).remove_from_heap(next);
    spc = spc.add_to_heap(seg);

    log::trace!(
        "folded objects {root} and {next} into segment {seg} (min_length {})",
        root_len + next_len
    );
    (spc, seg)
}

/// Try to fold exactly one chain link anywhere among `spc`'s heap objects.
/// Returns `Ok(None)` if no pair currently satisfies §4.G's preconditions,
/// `Err` if a candidate pair's sizes turned out to be symbolically
/// incomparable (§4.K). Restarts the search "at the first inequality" per
/// §4.G by simply moving on to the next candidate root when a pair fails to
/// qualify, rather than tracking a visited set across the whole call (each
/// successful fold mutates the graph, so a later call naturally sees the
/// updated shape).
pub fn abstract_once(spc: &Spc, layout: LinkLayout, stats: &mut Stats) -> Result<Option<Spc>, SmgFatal> {
    let candidates: Vec<ObjectId> = spc.heap_objects().filter(|&o| spc.is_valid(o)).collect();
    for root in candidates {
        if let Some(next) = candidate_next(spc, root, layout)? {
            let (next_spc, _seg) = fold_pair(spc, root, next, layout);
            stats.abstractions_folded += 1;
            return Ok(Some(next_spc));
        }
    }
    Ok(None)
}

/// Repeatedly fold until no more chains qualify (§2: "the transfer relation
/// may invoke Abstraction to re-fold lists").
pub fn abstract_to_fixpoint(spc: &Spc, layout: LinkLayout, stats: &mut Stats) -> Result<Spc, SmgFatal> {
    let mut current = spc.clone();
    let mut folds = 0u32;
    while let Some(next) = abstract_once(&current, layout, stats)? {
        current = next;
        folds += 1;
    }
    log::debug!("abstract_to_fixpoint: {folds} fold(s) to reach fixpoint");
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::BitNum as BN;
    use crate::spc::Spc as SpcT;

    fn build_chain(len: usize) -> (SpcT, Vec<ObjectId>, LinkLayout) {
        let mut spc = SpcT::new(64);
        let mut ids = Vec::new();
        // Build `len` 128-bit regions: [0,64) payload = 7, [64,128) = next ptr.
        for _ in 0..len {
            let (s, id) = spc.add_heap_object(BN::Concrete(128));
            spc = s;
            ids.push(id);
        }
        // payload field value, shared by every node so abstraction sees
        // "equal non-link fields".
        let (mut spc2, payload_val) = spc.search_or_create_address(ids[0], 0, 0, TargetSpecifier::Region);
        // We actually want a *non-pointer* payload; reuse a plain write by
        // minting one fresh value id via search_or_create_address against a
        // dummy target is overkill, so instead just write the same literal
        // value id across all nodes directly via a helper local value.
        let payload = crate::entity::ValueId::ZERO; // zero is fine as "equal content"
        let _ = payload_val;
        for &id in &ids {
            spc2 = spc2.write_hve_raw(id, 0, 64, payload);
        }
        for i in 0..len {
            let next_val = if i + 1 < len {
                let (s, v) = spc2.search_or_create_address(ids[i + 1], 0, 0, TargetSpecifier::Region);
                spc2 = s;
                v
            } else {
                crate::entity::ValueId::ZERO
            };
            spc2 = spc2.write_hve_raw(ids[i], 64, 64, next_val);
        }
        let layout = LinkLayout {
            kind: SegmentKind::Sll,
            nfo: 64,
            pfo: None,
            pointer_width_bits: 64,
            allow_head_offset_mismatch: false,
        };
        (spc2, ids, layout)
    }

    #[test]
    fn folds_chain_into_single_segment() {
        let (spc, ids, layout) = build_chain(5);
        let mut stats = Stats::new();
        let folded = abstract_to_fixpoint(&spc, layout, &mut stats).unwrap();
        for id in &ids[..4] {
            // All but possibly the last node (whose successor is the nil
            // sentinel and thus never becomes a `root`) should have been
            // subsumed into the segment and invalidated.
            assert!(!folded.is_valid(*id), "node {id} should have been folded away");
        }
        assert_eq!(stats.abstractions_folded, 4);
    }

    #[test]
    fn no_fold_when_fields_differ() {
        let mut spc = SpcT::new(64);
        let (s, a) = spc.add_heap_object(BN::Concrete(128));
        spc = s;
        let (s, b) = spc.add_heap_object(BN::Concrete(128));
        spc = s;
        let one = crate::entity::ValueId::ZERO;
        spc = spc.write_hve_raw(a, 0, 64, one);
        let (s, ptr) = spc.search_or_create_address(b, 0, 0, TargetSpecifier::Region);
        spc = s;
        let ptr_id = spc.values().get_smg_value(&ptr).unwrap();
        spc = spc.write_hve_raw(a, 64, 64, ptr_id);
        // `b`'s payload differs in content from `a`'s (a pointer vs. zero),
        // so the chain must not fold.
        let layout = LinkLayout {
            kind: SegmentKind::Sll,
            nfo: 64,
            pfo: None,
            pointer_width_bits: 64,
            allow_head_offset_mismatch: false,
        };
        let mut stats = Stats::new();
        assert!(abstract_once(&spc, layout, &mut stats).unwrap().is_none());
    }

    #[test]
    fn symbolic_sized_candidate_is_fatal_not_a_silent_skip() {
        use crate::object::SymbolicTermId;
        let mut spc = SpcT::new(64);
        let (s, a) = spc.add_heap_object(BN::Concrete(128));
        spc = s;
        let (s, b) = spc.add_heap_object(BN::Symbolic(SymbolicTermId(1)));
        spc = s;
        let (s, ptr) = spc.search_or_create_address(b, 0, 0, TargetSpecifier::Region);
        spc = s;
        let ptr_id = spc.values().get_smg_value(&ptr).unwrap();
        spc = spc.write_hve_raw(a, 64, 64, ptr_id);
        let layout = LinkLayout {
            kind: SegmentKind::Sll,
            nfo: 64,
            pfo: None,
            pointer_width_bits: 64,
            allow_head_offset_mismatch: false,
        };
        let mut stats = Stats::new();
        let err = abstract_once(&spc, layout, &mut stats).unwrap_err();
        assert_eq!(err, SmgFatal::AbstractionIncomparableSizes { a, b });
    }
}
