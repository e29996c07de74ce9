//! `dutycheck-recon`: invoice vs customs-checklist reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded workbooks, returns normalized
//! records, unresolved item names, a difference report and a draft
//! correction request. No CLI or file IO dependencies.

pub mod checklist;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod export;
pub mod invoice;
pub mod model;
pub mod notify;
pub mod tariff;
pub mod text;

pub use config::ReconConfig;
pub use engine::{run, RunInput, RunOutput};
pub use error::ReconError;
pub use model::{Cell, DifferenceReport, Field, LineItem, RecordSet, Sheet, Workbook};
pub use tariff::{TariffResolver, TariffTable};
