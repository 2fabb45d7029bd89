//! Memory objects: concrete regions and SLL/DLL summary segments.

use crate::entity::ObjectId;

/// Symbolic size/offset: either a concrete bit count or an opaque term the
/// external solver must reason about (§3 "[ADD] Typed offsets/sizes").
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BitNum {
    Concrete(u64),
    Symbolic(SymbolicTermId),
}

/// An opaque handle for a symbolic offset/size term owned by the external
/// solver collaborator (§6). The core never inspects its structure.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolicTermId(pub u32);

impl BitNum {
    pub fn concrete(&self) -> Option<u64> {
        match self {
            BitNum::Concrete(n) => Some(*n),
            BitNum::Symbolic(_) => None,
        }
    }

    pub fn is_concrete(&self) -> bool {
        matches!(self, BitNum::Concrete(_))
    }
}

impl From<u64> for BitNum {
    fn from(n: u64) -> Self {
        BitNum::Concrete(n)
    }
}

/// Which list shape a summary segment stands for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    Sll,
    Dll,
}

/// Segment-only fields (§3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentInfo {
    pub kind: SegmentKind,
    pub head_offset: u64,
    /// Offset of the "next" field, in bits.
    pub nfo: u64,
    /// Offset of the "previous" field, in bits; only meaningful for DLL.
    pub pfo: Option<u64>,
    pub min_length: u64,
}

/// A named memory region: concrete object or SLL/DLL summary (§3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Object {
    pub id: ObjectId,
    pub size: BitNum,
    pub base_offset: u64,
    pub nesting_level: u32,
    pub is_const_string: bool,
    pub segment: Option<SegmentInfo>,
}

impl Object {
    pub fn region(id: ObjectId, size: BitNum, base_offset: u64) -> Self {
        Object {
            id,
            size,
            base_offset,
            nesting_level: 0,
            is_const_string: false,
            segment: None,
        }
    }

    pub fn null(id: ObjectId) -> Self {
        Object {
            id,
            size: BitNum::Concrete(0),
            base_offset: 0,
            nesting_level: 0,
            is_const_string: false,
            segment: None,
        }
    }

    pub fn is_segment(&self) -> bool {
        self.segment.is_some()
    }

    pub fn min_length(&self) -> u64 {
        self.segment.as_ref().map_or(1, |s| s.min_length)
    }

    /// `len` as used by abstraction/materialization: a concrete region
    /// always counts as one element, a summary counts as its minimum
    /// length (§4.G step 1).
    pub fn abstract_len(&self) -> u64 {
        self.min_length()
    }

    /// Build a segment with `minLength - 1` and otherwise identical fields
    /// (§4.A `decrementLength`). Panics (a programmer-bug assertion, §7) if
    /// this object is not a segment or is already 0+.
    pub fn decrement_length(&self, new_id: ObjectId) -> Object {
        let seg = self
            .segment
            .as_ref()
            .expect("decrementLength on a non-segment object");
        assert!(seg.min_length > 0, "decrementLength on an already-0+ segment");
        Object {
            id: new_id,
            segment: Some(SegmentInfo {
                min_length: seg.min_length - 1,
                ..seg.clone()
            }),
            ..self.clone()
        }
    }

    /// Copy this object's shape (size, offset) into a fresh concrete region,
    /// dropping segment fields (§4.A `copyAsRegion`).
    pub fn copy_as_region(&self, new_id: ObjectId) -> Object {
        Object {
            id: new_id,
            segment: None,
            nesting_level: 0,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(min_length: u64) -> Object {
        Object {
            id: ObjectId::new_for_test(1),
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
        }
    }

    #[test]
    fn decrement_length_preserves_shape() {
        let s = seg(3);
        let smaller = s.decrement_length(ObjectId::new_for_test(2));
        assert_eq!(smaller.min_length(), 2);
        assert_eq!(smaller.segment.as_ref().unwrap().nfo, 64);
    }

    #[test]
    #[should_panic]
    fn decrement_length_on_zero_plus_panics() {
        seg(0).decrement_length(ObjectId::new_for_test(2));
    }

    #[test]
    fn copy_as_region_drops_segment() {
        let r = seg(4).copy_as_region(ObjectId::new_for_test(3));
        assert!(!r.is_segment());
        assert_eq!(r.abstract_len(), 1);
    }
}

#[cfg(test)]
impl ObjectId {
    /// Test-only constructor: production code only ever obtains an
    /// `ObjectId` from `PrimaryMap::push`.
    pub fn new_for_test(n: u32) -> Self {
        crate::entity::EntityRef::new(n as usize)
    }
}
