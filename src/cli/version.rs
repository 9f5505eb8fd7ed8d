//! Version command for the parley CLI.

/// The current version of parley, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version line printed by `parley version`.
pub fn version_string() -> String {
    format!("parley {}", VERSION)
}
