//! Version command.

/// The current crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version_line() -> String {
    format!("supallm-run {}", VERSION)
}
