//! Command: print version information.

/// The version stamped at build time, or the crate version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("DOTBAK_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the dotbak version to stdout.
pub fn run() {
    println!("dotbak {}", version());
}
