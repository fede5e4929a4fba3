//! Library crate for library-manager.
//!
//! This crate exposes the building blocks of the TUI:
//! - Book and user catalog with loans, plus file persistence (`catalog`)
//! - Error and result types (`error`)
//! - Logged-in user and permission rules (`session`)
//! - Name and identifier search (`search`)
//! - Application state and update loop (`app`)
//! - UI rendering and widgets (`ui`)
//! - Command-line arguments and subcommands (`cli`)
//! - Tracing setup (`logging`)
//!
//! It is used by the `library-manager` binary and by tests.
#![doc = include_str!("../README.md")]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod app;
pub mod catalog;
pub mod cli;
pub mod error;
pub mod logging;
pub mod search;
pub mod session;
pub mod ui;

// Re-export commonly used items at the crate root for convenience
/// Convenient error and result types shared across the crate.
pub use error::{CatalogError, CatalogResult, DynError, Result};
