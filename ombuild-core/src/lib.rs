// ombuild-core/src/lib.rs

// Declare the top-level modules within the library crate
pub mod build;
pub mod fetch;
pub mod patch;
pub mod pipeline;
pub mod toolchain;

// Re-export key types for easier use by the CLI crate
pub use patch::{PatchRule, BOOTSTRAP_SOURCES_RULE};
pub use toolchain::Toolchain;
