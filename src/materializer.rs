//! Expanding an abstract SLL/DLL segment back into a concrete element plus
//! a smaller summary when a pointer into it is dereferenced, including the
//! 0+ two-successor split (§4.H).
//!
//! Only one element is ever peeled per call. If the dereferenced pointer's
//! nesting level still does not resolve to the freshly materialized
//! concrete region (it addressed deeper into the segment), the caller
//! (the not-yet-built `State::read` retry loop, §4.E's pseudocode) is
//! expected to invoke `materialize` again on the resulting smaller
//! segment — this module does not loop internally.

use smallvec::SmallVec;

use crate::abstraction::LinkLayout;
use crate::edges::{PointsToEdge, TargetSpecifier};
use crate::entity::{ObjectId, ValueId};
use crate::errors::SmgFatal;
use crate::object::{BitNum, Object, SegmentInfo};
use crate::spc::Spc;

/// Which end of the segment the dereferencing pointer addresses.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// §4.H: FIRST (or an interior ALL closer to the head) drives left
/// materialization, LAST drives the mirrored right materialization. An
/// ALL pointer on a DLL additionally compares both ends' remaining
/// nesting and peels from whichever is smaller — ties favor the left,
/// matching the abstraction side's own head-first bias.
fn choose_side(specifier: TargetSpecifier, nesting_level: u32, seg: &SegmentInfo) -> Side {
    match specifier {
        TargetSpecifier::First => Side::Left,
        TargetSpecifier::Last => Side::Right,
        TargetSpecifier::Region => Side::Left,
        TargetSpecifier::All => {
            if seg.pfo.is_some() {
                let remaining_from_right = nesting_level as u64;
                let remaining_from_left = seg.min_length.saturating_sub(1).saturating_sub(nesting_level as u64);
                if remaining_from_right < remaining_from_left {
                    Side::Right
                } else {
                    Side::Left
                }
            } else {
                Side::Left
            }
        }
    }
}

/// Offsets used to peel from `side`: `(near, far)` where `near` is the
/// link field rewritten on the freshly materialized concrete element and
/// `far` is the one left pointing deeper into the remaining segment.
fn near_far_offsets(side: Side, info: &SegmentInfo) -> (u64, Option<u64>) {
    match side {
        Side::Left => (info.nfo, info.pfo),
        Side::Right => (info.pfo.unwrap_or(info.nfo), Some(info.nfo)),
    }
}

fn near_far_specifiers(side: Side) -> (TargetSpecifier, TargetSpecifier) {
    match side {
        Side::Left => (TargetSpecifier::First, TargetSpecifier::Last),
        Side::Right => (TargetSpecifier::Last, TargetSpecifier::First),
    }
}

/// §4.H steps 1-6, general peeling algorithm: split off one concrete
/// element from `side`, leaving a segment one element smaller. `info` is
/// passed separately from the live object's own segment fields so the 0+
/// extended branch can supply a synthetic `min_length: 1` without having
/// actually stored that length on `seg`.
fn peel_one(spc: &Spc, seg: ObjectId, info: &SegmentInfo, side: Side, layout: LinkLayout) -> (Spc, ObjectId, ObjectId) {
    let seg_obj = spc.object(seg).clone();
    let size = seg_obj.size.concrete().unwrap_or(0);
    let (near_off, far_off) = near_far_offsets(side, info);
    let (near_spec, _far_spec) = near_far_specifiers(side);

    let seg_edges = spc.read_hve_raw(seg, 0, size, false);

    // Step 1: a new concrete region, copying the segment's own HVEs.
    let (mut spc, concrete) = spc.push_object_with(true, |id| Object {
        id,
        size: seg_obj.size.clone(),
        base_offset: seg_obj.base_offset,
        nesting_level: 0,
        is_const_string: false,
        segment: None,
    });
    for edge in &seg_edges {
        spc = spc.write_hve_raw(concrete, edge.offset_bits, edge.size_bits, edge.value);
    }

    // Step 2: redirect NEAR/ALL pointers at nesting == minLength-1 (the
    // element closest to `side`, per the nesting convention established by
    // `abstraction::fold_pair`) to the new region, nesting reset to 0.
    let peel_nesting = info.min_length.saturating_sub(1) as u32;
    spc = spc.replace_specific_pointers_towards(seg, concrete, peel_nesting, &[near_spec, TargetSpecifier::All]);
    for (val, mut edge) in spc.pointers_towards(concrete) {
        edge.nesting_level = 0;
        spc = spc.write_pte_raw(val, edge);
    }

    // Step 3: a smaller segment, minLength - 1. Every PTE still targeting
    // the old segment (the FAR-specifier ones, and any NEAR/ALL one whose
    // nesting was below the peel threshold) now targets it, at unchanged
    // nesting level — removing the highest-numbered element doesn't
    // renumber the ones below it.
    let new_min = info.min_length.saturating_sub(1);
    let (mut spc, smaller) = spc.push_object_with(true, |id| Object {
        id,
        size: seg_obj.size.clone(),
        base_offset: seg_obj.base_offset,
        nesting_level: 0,
        is_const_string: false,
        segment: Some(SegmentInfo {
            min_length: new_min,
            ..info.clone()
        }),
    });
    // The remaining elements' shared non-link content still lives on
    // `seg`'s old HVEs (mirrors `abstraction::fold_pair`'s step-2 copy into
    // the folded segment) — steps 4-5 below overwrite near_off/far_off
    // with the fresh forwarding pointers.
    for edge in &seg_edges {
        if edge.offset_bits == near_off || Some(edge.offset_bits) == far_off {
            continue;
        }
        spc = spc.write_hve_raw(smaller, edge.offset_bits, edge.size_bits, edge.value);
    }
    spc = spc.replace_all_pointers_towards_and_increment(seg, smaller, 0);

    // Step 4: a fresh NEAR-specifier pointer to the smaller segment,
    // nesting `minLength - 2` floored at 0 (its own head element).
    let fresh_nesting = info.min_length.saturating_sub(2) as u32;
    let (mut spc, fresh_ptr) = spc.search_or_create_address(smaller, info.head_offset, fresh_nesting, near_spec);
    let fresh_val = spc
        .values()
        .get_smg_value(&fresh_ptr)
        .expect("search_or_create_address always records the value it returns");

    // Step 5: write that pointer as the new concrete element's near field;
    // for a DLL, also point the smaller segment's far field back at the
    // new concrete element.
    spc = spc.write_hve_raw(concrete, near_off, layout.pointer_width_bits, fresh_val);
    if let Some(far_off) = far_off {
        let (new_spc, back_ptr) = spc.search_or_create_address(concrete, 0, 0, TargetSpecifier::Region);
        spc = new_spc;
        let back_val = spc.values().get_smg_value(&back_ptr).expect("just minted");
        spc = spc.write_hve_raw(smaller, far_off, layout.pointer_width_bits, back_val);
    }

    // Step 6: drop the original segment; its content now lives in the two
    // replacement objects.
    spc = spc.clear_edges(seg);
    spc = spc.invalidate(seg);
    spc = spc.remove_from_heap(seg);
    spc = spc.add_to_heap(concrete);
    spc = spc.add_to_heap(smaller);

    (spc, concrete, smaller)
}

/// Scan valid objects for the one whose near-offset field holds a pointer
/// landing on `seg` with the NEAR specifier — the predecessor a LAST
/// pointer should be redirected to once a 0+ segment vanishes entirely.
fn find_predecessor(spc: &Spc, seg: ObjectId, near_off: u64, near_spec: TargetSpecifier, pointer_width_bits: u64) -> Option<ObjectId> {
    for obj in spc.heap_objects() {
        if !spc.is_valid(obj) || obj == seg {
            continue;
        }
        let edges = spc.read_hve_raw(obj, near_off, pointer_width_bits, true);
        if let Some(e) = edges.first() {
            if let Some(pte) = spc.points_to_raw(e.value) {
                if pte.target == seg && pte.specifier == near_spec {
                    return Some(obj);
                }
            }
        }
    }
    None
}

/// The 0+ "minimal" branch (§4.H): the segment simply vanishes. Every
/// NEAR/ALL pointer is redirected to wherever the segment's own near
/// field pointed (nil, if that field held no live pointer); every FAR
/// pointer is redirected to the scanned-for predecessor, if any.
fn materialize_zero_minimal(spc: &Spc, seg: ObjectId, info: &SegmentInfo, side: Side, layout: LinkLayout) -> Spc {
    let (near_off, _far_off) = near_far_offsets(side, info);
    let (near_spec, far_spec) = near_far_specifiers(side);
    let next_val = spc
        .read_hve_raw(seg, near_off, layout.pointer_width_bits, true)
        .first()
        .map(|e| e.value);
    let target_after = next_val.and_then(|v| spc.points_to_raw(v));
    let predecessor = find_predecessor(spc, seg, near_off, near_spec, layout.pointer_width_bits);

    let mut spc = spc.clone();
    for (val, edge) in spc.pointers_towards(seg) {
        match edge.specifier {
            s if s == near_spec || s == TargetSpecifier::All => {
                if let Some(tgt) = target_after.clone() {
                    spc = spc.write_pte_raw(val, tgt);
                } else {
                    spc = spc.clear_pte(val);
                }
            }
            s if s == far_spec => {
                if let Some(prev) = predecessor {
                    spc = spc.write_pte_raw(
                        val,
                        PointsToEdge {
                            target: prev,
                            offset_bits: 0,
                            specifier: TargetSpecifier::Region,
                            nesting_level: 0,
                        },
                    );
                }
            }
            _ => {}
        }
    }
    spc = spc.clear_edges(seg);
    spc = spc.invalidate(seg);
    spc = spc.remove_from_heap(seg);
    spc
}

/// Materialize one element out of `seg`, dereferenced through `dereferenced`
/// (a `ValueId` whose PTE targets `seg`). Returns `[only state]`, or, when
/// `seg`'s current `minLength` is 0, `[minimal, extended]` in that fixed
/// order (§9 Open Question 1 — no switch, the spec names the order).
pub fn materialize(spc: &Spc, seg: ObjectId, dereferenced: ValueId, layout: LinkLayout) -> Result<SmallVec<[Spc; 2]>, SmgFatal> {
    if seg == ObjectId::NULL || !spc.is_valid(seg) {
        return Err(SmgFatal::MaterializeInvalidTarget { object: seg });
    }
    let obj = spc.object(seg).clone();
    let info = match obj.segment.clone() {
        Some(i) => i,
        None => return Err(SmgFatal::MaterializeInvalidTarget { object: seg }),
    };
    let edge = spc
        .points_to_raw(dereferenced)
        .ok_or(SmgFatal::MaterializeInvalidTarget { object: seg })?;
    let side = choose_side(edge.specifier, edge.nesting_level, &info);

    let mut out: SmallVec<[Spc; 2]> = SmallVec::new();
    if info.min_length == 0 {
        log::debug!("materializing 0+ segment {seg}: splitting into minimal/extended states");
        let minimal = materialize_zero_minimal(spc, seg, &info, side, layout);
        let synthetic = SegmentInfo {
            min_length: 1,
            ..info.clone()
        };
        let (extended, _concrete, _smaller) = peel_one(spc, seg, &synthetic, side, layout);
        out.push(minimal);
        out.push(extended);
    } else {
        log::trace!("materializing segment {seg} (min_length {})", info.min_length);
        let (next_spc, _concrete, _smaller) = peel_one(spc, seg, &info, side, layout);
        out.push(next_spc);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edges::TargetSpecifier;
    use crate::object::SegmentKind;
    use crate::spc::Spc as SpcT;

    fn sll_layout() -> LinkLayout {
        LinkLayout {
            kind: SegmentKind::Sll,
            nfo: 64,
            pfo: None,
            pointer_width_bits: 64,
            allow_head_offset_mismatch: false,
        }
    }

    fn seeded_segment(min_length: u64) -> (SpcT, ObjectId) {
        let spc = SpcT::new(64);
        let (spc, seg) = spc.push_object_with(true, |id| Object {
            id,
            size: BitNum::Concrete(128),
            base_offset: 0,
            nesting_level: 0,
            is_const_string: false,
            segment: Some(SegmentInfo {
                kind: SegmentKind::Sll,
                head_offset: 0,
                nfo: 64,
                pfo: None,
                min_length,
            }),
        });
        let spc = spc.add_to_heap(seg);
        (spc, seg)
    }

    #[test]
    fn peeling_a_positive_length_segment_yields_one_state() {
        let (spc, seg) = seeded_segment(3);
        let (spc, ptr) = spc.search_or_create_address(seg, 0, 2, TargetSpecifier::First);
        let ptr_val = spc.values().get_smg_value(&ptr).unwrap();
        let result = materialize(&spc, seg, ptr_val, sll_layout()).unwrap();
        assert_eq!(result.len(), 1);
        assert!(!result[0].is_valid(seg));
    }

    #[test]
    fn zero_plus_segment_yields_two_states_minimal_first() {
        let (spc, seg) = seeded_segment(0);
        let (spc, ptr) = spc.search_or_create_address(seg, 0, 0, TargetSpecifier::First);
        let ptr_val = spc.values().get_smg_value(&ptr).unwrap();
        let result = materialize(&spc, seg, ptr_val, sll_layout()).unwrap();
        assert_eq!(result.len(), 2);
        // Minimal: the segment is simply gone, nothing replaces it.
        assert!(!result[0].is_valid(seg));
        // Extended: the segment is gone but a fresh concrete + 0+ pair exists.
        assert!(!result[1].is_valid(seg));
        assert!(result[1].heap_objects().count() >= 2);
    }

    fn dll_layout() -> LinkLayout {
        LinkLayout {
            kind: SegmentKind::Dll,
            nfo: 64,
            pfo: Some(128),
            pointer_width_bits: 64,
            allow_head_offset_mismatch: false,
        }
    }

    fn seeded_dll_segment(min_length: u64) -> (SpcT, ObjectId) {
        let spc = SpcT::new(64);
        let (spc, seg) = spc.push_object_with(true, |id| Object {
            id,
            size: BitNum::Concrete(192),
            base_offset: 0,
            nesting_level: 0,
            is_const_string: false,
            segment: Some(SegmentInfo {
                kind: SegmentKind::Dll,
                head_offset: 0,
                nfo: 64,
                pfo: Some(128),
                min_length,
            }),
        });
        let spc = spc.add_to_heap(seg);
        (spc, seg)
    }

    #[test]
    fn peeling_dll_segment_from_last_side() {
        let (spc, seg) = seeded_dll_segment(3);
        let (spc, ptr) = spc.search_or_create_address(seg, 0, 2, TargetSpecifier::Last);
        let ptr_val = spc.values().get_smg_value(&ptr).unwrap();
        let result = materialize(&spc, seg, ptr_val, dll_layout()).unwrap();
        assert_eq!(result.len(), 1);
        let next = &result[0];
        assert!(!next.is_valid(seg));
        // the original DLL segment is replaced by one concrete tail element
        // plus one smaller (minLength - 1) segment.
        assert_eq!(next.heap_objects().filter(|&o| next.is_valid(o)).count(), 2);
    }

    #[test]
    fn materializing_invalid_target_is_fatal() {
        let spc = SpcT::new(64);
        let err = materialize(&spc, ObjectId::NULL, ValueId::ZERO, sll_layout()).unwrap_err();
        assert_eq!(err, SmgFatal::MaterializeInvalidTarget { object: ObjectId::NULL });
    }
}
