//! brokerkb-core - Core library for brokerkb
//!
//! This crate contains the case and sync-log models, the libSQL store, the
//! Dify document index client and the sync engine shared by the API server
//! and the CLI.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod index;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Case, CaseId};
