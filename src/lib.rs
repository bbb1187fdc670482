//! Workspace root crate: re-exports `cityscope-core` so the demos can use a
//! single path. See `crates/cityscope-core` for the library itself.

pub use cityscope_core::*;
