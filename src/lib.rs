//! # Legacy Ledger
//!
//! Read-only ingestion and diagnostics for the dBase / FoxPro tables of a legacy
//! point-of-sale bookkeeping system.
//!
//! ## Features
//!
//! - **Forward-only table cursors**: one production adapter over `.dbf` files
//!   (code page taken from the header language driver, memo text read from the
//!   `.fpt` / `.dbt` file beside the table, deleted records skipped) and an
//!   in-memory source for tests
//! - **Null-tolerant field access**: malformed cells read as `""`, `0` or `None`
//!   instead of aborting a scan
//! - **Per-row failure isolation**: a row that cannot be mapped is logged and
//!   skipped, systemic failures carry the table path
//! - **Catalog search**: exact or substring matching over several columns,
//!   capped per request
//! - **Schema diagnostics**: reports that never fail, for an administrative screen
//! - **Packed references**: decoding of fixed-width document references stored in
//!   cash-cut text columns
//!
//! ## Entry points
//!
//! - [`LegacyCatalog`]: async facade over the configured tables
//! - [`SchemaDiagnostic`]: table inspection and raw samples
//! - [`parse_references`]: fixed-width reference decoder
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod reference;
pub mod repository;
pub mod search;
pub mod table;

mod helpers;

pub use crate::config::LegacyConfig;
pub use crate::config::LegacyTableKind;
pub use crate::config::PathProvider;
pub use crate::diagnostic::DiagnosticReport;
pub use crate::diagnostic::SchemaDiagnostic;
pub use crate::error::LegacyError;
pub use crate::reference::parse_references;
pub use crate::reference::DocumentReference;
pub use crate::repository::catalog::LegacyCatalog;
pub use crate::repository::LegacyTable;
pub use crate::search::matcher::MatchMode;
