//! # Studytrack
//!
//! A self-hostable study tracker for two-year exam preparation: a shared
//! syllabus, per-student topic progress, revision scheduling, a backlog and
//! mock-test scores, with cohort analytics for admins.
//!
//! Usable both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! studytrack = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use studytrack::server::{AppState, create_router};
//! use studytrack::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/studytrack.db")?;
//! store.initialize()?;
//!
//! let state = Arc::new(AppState::new(
//!     Arc::new(store),
//!     vec!["head@school.example".to_string()],
//! ));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! The calculations behind every view live in [`engine`] and take plain data,
//! so they can be reused without a server.
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `studytrack` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod server;
pub mod store;
pub mod types;
