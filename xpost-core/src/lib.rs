//! Domain model and narrow capability traits for the publication fan-out
//! service: `spec.md` §3-§4. No I/O happens in this crate; it defines the
//! shapes and contracts that `xpost-engine`, `xpost-scheduler` and
//! `xpost-tokens` build on.

pub mod model;
pub mod registry;
pub mod traits;

pub use model::*;
pub use registry::PlatformRegistry;
pub use traits::{CreateOutcome, Lock, LockGuard, PlatformClient, PostFilter, PostRepository, TokenStore};


#[cfg(test)]
pub(crate) use test_support::NullPlatformClient;
