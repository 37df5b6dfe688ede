//! Service layer sitting between handlers and the store.

mod auth;

pub use auth::AuthService;
