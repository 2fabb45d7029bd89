//! Fast, non-cryptographic hash containers for transient working sets that
//! never need to be part of a persistent `Spc` snapshot (DFS visited sets,
//! the subsumption equality cache). Copied near-verbatim from
//! `cranelift/codegen/src/fx.rs`.

pub use rustc_hash::{FxHashMap, FxHashSet};
