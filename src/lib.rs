//! # policybook
//!
//! Ingests a carrier policy export workbook and licensing reference tables
//! and produces normalized JSON records.
//!
//! The workbook side is a minimal XLSX reader: it opens the ZIP package,
//! loads the shared string table, resolves the first sheet through the
//! workbook relationships and streams that sheet's rows as literal strings.
//!
//! ## Quick Start
//!
//! ```no_run
//! use policybook::policy::{import_policies, ImportOptions};
//! use policybook::render::{write_json, JsonFormat};
//!
//! let rows = policybook::read_rows("fng_book.xlsx")?;
//! let policies = import_policies(&rows, &ImportOptions::default())?;
//! write_json("data/policies.json", &policies, JsonFormat::Pretty)?;
//! # Ok::<(), policybook::Error>(())
//! ```
//!
//! ## Licensing tables
//!
//! ```no_run
//! use policybook::licensing::{sync_licensed_agents, LicensingSources};
//!
//! let rows = sync_licensed_agents(&LicensingSources::from_dir("licensing_db"))?;
//! println!("{} licensed agent rows", rows.len());
//! # Ok::<(), policybook::Error>(())
//! ```

pub mod container;
pub mod error;
pub mod licensing;
pub mod policy;
pub mod render;
pub mod xlsx;
pub mod xml;

// Re-exports
pub use container::Archive;
pub use error::{Error, Result};
pub use xlsx::{read_rows, read_rows_from_bytes, Row, WorkbookReader};
