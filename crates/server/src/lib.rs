//! MediBills server library.
//!
//! Provides the pieces the `medibills` binary is assembled from: command-line
//! configuration, database bootstrap, demo seeding, the serving loop, and
//! shutdown handling.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod config;
pub mod seed;
pub mod server;
pub mod shutdown;
