//! API implementation submodules.
//!
//! Each submodule contains `impl Romport` blocks that extend the public API
//! with domain-specific methods. The struct definition remains in `lib.rs`.

mod builder;
mod library;
mod state;
mod sync;

pub use builder::RomportBuilder;
pub(crate) use state::RomportState;
