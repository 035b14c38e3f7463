//! Repository-level clients built on top of [`crate::ops`].
//!
//! - [`git`]: the fork's working copy, as an unbound [`git::Cloner`] and a
//!   cloned [`git::Repository`]

pub mod git;
