// ombuild-aio/src/lib.rs
//! IO operations for ombuild (external processes, filesystem, working scopes)

pub mod fs;
pub mod process;
pub mod scope;

pub use process::run_step;
pub use scope::WorkingScope;
