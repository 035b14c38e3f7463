//! Subcommands, implemented as methods on [`crate::App`].
//!
//! - [`sync`]: clone the fork, merge upstream into it and optionally push
//! - [`show_config`]: print the effective configuration

pub mod show_config;
pub mod sync;
