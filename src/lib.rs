pub mod clients;
pub mod ops;

mod app;
pub mod commands;
pub mod config;
pub mod error;

// Re-export the entry points used by the binary
pub use app::App;
pub use commands::sync::SyncReport;
pub use config::Config;
pub use error::SyncError;

// Disable colors for all tests to get clean output
#[cfg(test)]
#[ctor::ctor]
fn init_tests() {
    colored::control::set_override(false);
}
