//! API implementation submodules.
//!
//! Each submodule contains `impl ToolchainApi` blocks grouped by concern.
//! The struct definition lives in `lib.rs`.

mod builder;
mod conversion;
mod settings;
mod tools;
mod updates;

pub use builder::ToolchainApiBuilder;
pub use updates::UpdateCheck;
