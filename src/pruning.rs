//! Reachability pruning and leak detection (§4.J).
//!
//! `prune_unreachable` computes `roots = globals ∪ ⋃ stack variables` itself
//! and drops every heap object not reachable from that set, reporting what
//! it dropped. Unlike §4.J's bare object-id list, `LeakReport` also carries
//! each dropped object's `ObjectKind` so a host can render "leaked 24-bit
//! heap region" vs. "leaked 5+ SLL segment" without a second lookup into the
//! now-pruned graph.

use crate::entity::ObjectId;
use crate::object::{BitNum, SegmentKind};
use crate::spc::Spc;

/// What kind of object a leak report entry names, independent of the
/// (already-invalidated) object's live fields.
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectKind {
    Region { size_bits: Option<u64> },
    Segment { kind: SegmentKind, min_length: u64 },
}

#[derive(Clone, Debug, Default)]
pub struct LeakReport {
    pub objects: Vec<(ObjectId, ObjectKind)>,
}

impl LeakReport {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.iter().map(|(id, _)| *id).collect()
    }
}

fn classify(spc: &Spc, obj: ObjectId) -> ObjectKind {
    let object = spc.object(obj);
    match &object.segment {
        Some(seg) => ObjectKind::Segment {
            kind: seg.kind,
            min_length: seg.min_length,
        },
        None => ObjectKind::Region {
            size_bits: match &object.size {
                BitNum::Concrete(n) => Some(*n),
                BitNum::Symbolic(_) => None,
            },
        },
    }
}

/// `pruneUnreachable()` (§4.J): invalidate and drop from the heap set every
/// valid heap object `collectReachable` does not reach from
/// `roots = globals ∪ ⋃ stack variables` (computed here, per the spec's own
/// contract — the caller never supplies its own root set). The null object
/// is always implicitly reachable and never reported.
pub fn prune_unreachable(spc: &Spc) -> (Spc, LeakReport) {
    let roots = spc.roots();
    let (reachable, _) = spc.collect_reachable(&roots);
    let leaked: Vec<ObjectId> = spc
        .heap_objects()
        .filter(|o| spc.is_valid(*o) && !reachable.contains(o))
        .collect();

    let mut next = spc.clone();
    let mut report = LeakReport::default();
    for obj in leaked {
        let kind = classify(&next, obj);
        log::debug!("pruning unreachable heap object {obj} ({kind:?})");
        next = next.invalidate(obj).remove_from_heap(obj);
        report.objects.push((obj, kind));
    }
    if !report.is_empty() {
        log::info!("prune_unreachable dropped {} object(s)", report.objects.len());
    }
    (next, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edges::TargetSpecifier;
    use crate::spc::Spc as SpcT;

    #[test]
    fn unreachable_heap_object_is_pruned_and_reported() {
        let spc = SpcT::new(64);
        let (spc, obj) = spc.add_heap_object(BitNum::Concrete(64));
        let (spc, report) = prune_unreachable(&spc);
        assert!(!spc.is_valid(obj));
        assert_eq!(report.object_ids(), vec![obj]);
        assert!(matches!(report.objects[0].1, ObjectKind::Region { size_bits: Some(64) }));
    }

    #[test]
    fn reachable_heap_object_survives() {
        use crate::spc::TypeTag;
        let spc = SpcT::new(64);
        let (spc, root) = spc.add_global(BitNum::Concrete(64), "g", TypeTag("int*".into()));
        let (spc, target) = spc.add_heap_object(BitNum::Concrete(64));
        let (spc, ptr) = spc.search_or_create_address(target, 0, 0, TargetSpecifier::Region);
        let ptr_id = spc.values().get_smg_value(&ptr).unwrap();
        let spc = spc.write_hve_raw(root, 0, 64, ptr_id);
        let (spc, report) = prune_unreachable(&spc);
        assert!(spc.is_valid(root));
        assert!(spc.is_valid(target));
        assert!(report.is_empty());
    }
}
