//! Process-level integration with the version control toolchain.
//!
//! - [`git`]: the [`git::GitRunner`] seam through which every `git` process is
//!   spawned, with a real implementation and a mock for tests.

pub mod git;
