/// Session state management
///
/// The store seam (Postgres-backed in production, in-memory for tests)
/// and the session manager that drives login, logout, and refresh
/// rotation over it.

pub mod manager;
pub mod store;

pub use manager::SessionManager;
pub use manager::SessionPair;
pub use store::Identity;
pub use store::IdentityStore;
pub use store::MemoryStore;
pub use store::PgStore;
pub use store::SessionStore;
