//! In-memory fixtures for the `PostRepository`, `TokenStore`, `Lock` and
//! `PlatformClient` traits, mirroring `syncstorage-db`'s `mock.rs` pattern:
//! real backing state instead of stubbed-out defaults, since the testable
//! properties in `spec.md` §8 depend on dedup/idempotency/lock behavior
//! that a pure stub can't exercise.

mod lock;
mod platform;
mod repository;
mod token_store;

pub use lock::InMemoryLock;
pub use platform::ScriptedPlatformClient;
pub use repository::InMemoryPostRepository;
pub use token_store::InMemoryTokenStore;
