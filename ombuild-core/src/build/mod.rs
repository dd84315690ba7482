// ombuild-core/src/build/mod.rs
//! Configure and compile steps, run against a fetched and patched source tree.

mod cmake;
mod make;

pub use cmake::{configure, configure_args};
pub use make::{compile_and_install, make_install_args, BUILD_JOBS};
