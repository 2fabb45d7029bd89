//! Runtime-configurable switches (§6), including the Open Question
//! resolutions SPEC_FULL.md §9 pins behind explicit flags rather than
//! guessing silently.

use serde::{Deserialize, Serialize};

/// The core recognizes exactly the flags named in §6, plus the two
/// SPEC_FULL.md additions needed to make the Open Questions concrete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// §6: prefer a single fully-covering HVE on read when one exists.
    pub precise_smg_read: bool,
    /// §6: which error kind a memory error is classified under for the
    /// host's reporting target (kept opaque to the core beyond its name).
    pub memory_error_target: MemoryErrorTarget,
    /// §6 / §7 S4: objects still reachable only from `main`'s frame at
    /// program exit are leaks, not just ordinary scope-exit garbage.
    pub handle_non_freed_memory_in_main_as_mem_leak: bool,
    /// §6: track error predicates for later refinement.
    pub track_error_predicates: bool,
    /// §6 / §4.F: on a write whose size is symbolic, overapproximate
    /// (widen to unknown) instead of raising `SmgFatal`.
    pub overapproximate_for_symbolic_write: bool,
    /// §6: on a symbolic-size access generally, overapproximate rather
    /// than query the solver.
    pub overapproximate_values_for_symbolic_size: bool,
    /// §6: assign fresh symbolic values to uninitialized reads, rather
    /// than reporting `UseOfUninitialized` immediately.
    pub assign_symbolic_values: bool,
    /// §6: when set, symbolic values are always treated as `Unknown` for
    /// subsumption/comparison purposes rather than compared for identity.
    pub treat_symbolic_values_as_unknown: bool,
    /// §6: allocate an object for a name that resolves to an external
    /// variable instead of reporting it unresolved.
    pub allocate_external_variables: bool,
    /// §6: when an external variable's declaration is incomplete (no
    /// known size), treat it as external allocation rather than an error.
    pub handle_incomplete_external_variable_as_external_allocation: bool,
    /// §6: assumed size, in bits, for an external allocation whose size
    /// could not be determined.
    pub external_allocation_size: u64,

    // --- SPEC_FULL.md §9 Open Question switches ---
    /// Whether abstraction may fold two objects whose `base_offset`s
    /// differ, as long as every non-link field still compares equal.
    pub abstract_allow_head_offset_mismatch: bool,
    /// Whether `free` on a zero-valued pointer succeeds silently even if
    /// the pointer is additionally marked `Unknown`/symbolic.
    pub free_null_is_noop: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryErrorTarget {
    InvalidDeref,
    MemoryLeak,
    Both,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            precise_smg_read: true,
            memory_error_target: MemoryErrorTarget::Both,
            handle_non_freed_memory_in_main_as_mem_leak: true,
            track_error_predicates: false,
            overapproximate_for_symbolic_write: false,
            overapproximate_values_for_symbolic_size: false,
            assign_symbolic_values: true,
            treat_symbolic_values_as_unknown: false,
            allocate_external_variables: false,
            handle_incomplete_external_variable_as_external_allocation: false,
            external_allocation_size: 0,
            abstract_allow_head_offset_mismatch: false,
            free_null_is_noop: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_full() {
        let o = Options::default();
        assert!(o.precise_smg_read);
        assert!(!o.overapproximate_for_symbolic_write);
        assert!(o.assign_symbolic_values);
        assert!(o.free_null_is_noop);
        assert!(!o.abstract_allow_head_offset_mismatch);
    }
}
