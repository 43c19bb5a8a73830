//! Energy KPI curation
//!
//! Reads the raw energy, heating and CO2 fact tables, builds the date and
//! plant dimensions, derives the KPI fact tables and overwrites every output
//! table in the store. See `pipeline::run` for the stage order.

pub mod curated;
pub mod dimensions;
pub mod error;
pub mod join;
pub mod kpi;
pub mod pipeline;
pub mod publish;
pub mod records;
pub mod reference;

pub use error::PipelineError;
pub use pipeline::{run, PipelineOptions, RunSummary};
pub use reference::{load_reference, CapacityReference};
