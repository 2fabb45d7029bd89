//! Monotonic statistics counters (§5). Plain `u64` fields bumped by plain
//! adds; the whole struct is owned by the host and borrowed `&mut` for the
//! duration of one operation, matching cranelift's per-`Context`
//! timing/statistics accumulation style. Move to atomics only if/when
//! parallel state exploration is introduced (§5).
#[derive(Clone, Debug, Default)]
pub struct Stats {
    pub reads: u64,
    pub writes: u64,
    pub partial_reads: u64,
    pub materializations: u64,
    pub zero_plus_splits: u64,
    pub abstractions_folded: u64,
    pub prunes: u64,
    pub objects_leaked: u64,
    pub subsumption_checks: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }
}
