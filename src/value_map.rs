//! Bidirectional `Value <-> SMGValue` mapping (§4.C).
//!
//! Keys on the `Value` side are wrapped so that two `Value`s with equal
//! numeric content collapse onto the same [`ValueId`] — this is what makes
//! `searchOrCreateAddress`'s dedup (and the read/write algebra's "value
//! created lazily on first appearance") behave sensibly for numeric
//! constants instead of minting a fresh symbolic value per occurrence.

use im::HashMap as PHashMap;

use crate::entity::ValueId;
use crate::value::Value;

/// A `Value` wrapped so that `Eq`/`Hash` compare by semantic content:
/// two numerics with the same bits are equal regardless of identity;
/// symbolic/address-expr variants compare structurally.
#[derive(Clone, Debug)]
struct SemanticValue(Value);

impl PartialEq for SemanticValue {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Value::Numeric(a), Value::Numeric(b)) => a == b,
            (Value::Symbolic(a), Value::Symbolic(b)) => a == b,
            (Value::AddressExpr { .. }, Value::AddressExpr { .. }) => false,
            _ => false,
        }
    }
}
impl Eq for SemanticValue {}

impl std::hash::Hash for SemanticValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Numeric(n) => {
                0u8.hash(state);
                n.hash(state);
            }
            Value::Symbolic(s) => {
                1u8.hash(state);
                s.hash(state);
            }
            Value::AddressExpr { .. } => {
                // Address expressions are never stored as map keys (they
                // live only "in transit", §3) and are not deduplicated.
                2u8.hash(state);
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ValueMap {
    forward: PHashMap<SemanticValue, ValueId>,
    backward: PHashMap<ValueId, Value>,
}

impl ValueMap {
    /// A fresh map with the zero numeric `Value` pre-seeded to `ValueId::ZERO`
    /// (§4.C).
    pub fn new(width_bits: u32) -> Self {
        let mut m = ValueMap::default();
        let zero = Value::zero(width_bits);
        m.forward.insert(SemanticValue(zero.clone()), ValueId::ZERO);
        m.backward.insert(ValueId::ZERO, zero);
        m
    }

    pub fn get_smg_value(&self, v: &Value) -> Option<ValueId> {
        self.forward.get(&SemanticValue(v.clone())).copied()
    }

    pub fn get_value(&self, id: ValueId) -> Option<&Value> {
        self.backward.get(&id)
    }

    /// Insert a fresh `(Value, ValueId)` pair. Panics (programmer-bug
    /// assertion, §7) if either side is already mapped — callers must check
    /// `get_smg_value` first, exactly as `SPC::searchOrCreateAddress` does.
    pub fn insert(&self, value: Value, id: ValueId) -> ValueMap {
        debug_assert!(
            self.get_smg_value(&value).is_none(),
            "bijection violated: value already mapped (§3 invariant 4)"
        );
        debug_assert!(
            self.backward.get(&id).is_none(),
            "bijection violated: SMGValue already mapped (§3 invariant 4)"
        );
        let mut next = self.clone();
        next.forward.insert(SemanticValue(value.clone()), id);
        next.backward.insert(id, value);
        next
    }

    pub fn len(&self) -> usize {
        self.backward.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;
    use crate::value::NumericValue;

    #[test]
    fn zero_is_preseeded() {
        let m = ValueMap::new(32);
        assert_eq!(m.get_smg_value(&Value::zero(32)), Some(ValueId::ZERO));
    }

    #[test]
    fn numeric_content_collapses() {
        let m = ValueMap::new(32);
        let v1 = Value::Numeric(NumericValue::Int { bits: 7, width_bits: 32 });
        let v2 = Value::Numeric(NumericValue::Int { bits: 7, width_bits: 32 });
        let id: ValueId = EntityRef::new(1);
        let m = m.insert(v1, id);
        assert_eq!(m.get_smg_value(&v2), Some(id));
    }

    #[test]
    fn bijection_is_injective() {
        let m = ValueMap::new(32);
        let id: ValueId = EntityRef::new(1);
        let m = m.insert(Value::Symbolic(crate::object::SymbolicTermId(9)), id);
        assert_eq!(m.len(), 2);
    }

    proptest::proptest! {
        /// §8 invariant 3 (bijection): inserting a batch of distinct
        /// symbolic values under distinct fresh ids leaves the map
        /// injective in both directions — every id resolves back to the
        /// value that was inserted under it, and no two distinct terms
        /// ever collapse onto the same `ValueId`.
        #[test]
        fn distinct_symbolics_stay_distinct(terms in proptest::collection::hash_set(0u32..1000, 1..20)) {
            let mut m = ValueMap::new(32);
            let mut next_id = 1u32;
            let mut assigned = Vec::new();
            for term in terms {
                let id: ValueId = EntityRef::new(next_id as usize);
                next_id += 1;
                m = m.insert(Value::Symbolic(crate::object::SymbolicTermId(term)), id);
                assigned.push((term, id));
            }
            for (term, id) in &assigned {
                proptest::prop_assert_eq!(
                    m.get_smg_value(&Value::Symbolic(crate::object::SymbolicTermId(*term))),
                    Some(*id)
                );
                proptest::prop_assert_eq!(
                    m.get_value(*id),
                    Some(&Value::Symbolic(crate::object::SymbolicTermId(*term)))
                );
            }
        }
    }
}
