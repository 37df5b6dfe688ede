//! medibills-store: ownership-scoped persistence for MediBills.
//!
//! Every owned record lives in SQLite behind a repository that takes the
//! caller's user id on every call and puts it in the SQL predicate:
//!
//! - **Fixed schema**: 11 tables created idempotently at startup
//! - **Referential rules in DDL**: cascade, restrict, and set-null are enforced
//!   by SQLite with `foreign_keys = ON`
//! - **Atomic creates**: foreign references are checked for ownership in the
//!   same transaction as the insert
//! - **Sessions**: HMAC-digested tokens with a rolling window and absolute cap
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          OwnedRepository (per entity)        │
//! │   list / get / create / update / delete      │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │      Ownership gates + join-table links      │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │        Database (sqlx SQLite pool)           │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use medibills_store::{Database, OwnedRepository};
//! use medibills_types::{config::DatabaseConfig, inputs::NewProvider, UserId};
//!
//! # async fn example(user: UserId) -> medibills_store::Result<()> {
//! let db = Database::open(&DatabaseConfig::default()).await?;
//! db.migrate().await?;
//!
//! let provider = db
//!     .providers()
//!     .create_for_user(user, NewProvider {
//!         name: "Riverside Clinic".into(),
//!         address: None,
//!         phone: None,
//!         website: None,
//!         payment_website: None,
//!     })
//!     .await?;
//! let mine = db.providers().list_for_user(user).await?;
//! assert_eq!(mine[0].id, provider.id);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bills;
pub mod charges;
pub mod collection_bills;
pub mod db;
pub mod eobs;
pub mod error;
mod links;
mod ownership;
pub mod payments;
pub mod providers;
pub mod repository;
pub mod service_events;
pub mod sessions;
pub mod tables;
pub mod users;

#[cfg(test)]
mod test_support;

pub use bills::BillRepository;
pub use charges::ChargeRepository;
pub use collection_bills::CollectionBillRepository;
pub use db::Database;
pub use eobs::EobRepository;
pub use error::{Result, StoreError};
pub use payments::PaymentRepository;
pub use providers::ProviderRepository;
pub use repository::OwnedRepository;
pub use service_events::ServiceEventRepository;
pub use sessions::{Session, SessionStore};
pub use tables::Table;
pub use users::{Credentials, UserRepository};
