#![forbid(unsafe_code)]
//! lensdex-core: records, field schemas, configuration, the YAML job DSL,
//! run summaries, and stable hashing.
//!
//! No async or file IO lives here; readers and stores are in `lensdex-io`.

pub mod config;
pub mod dsl;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod prelude;
pub mod record;
pub mod schema;

pub use config::IndexerConfig;
pub use error::{Error, Result};
pub use record::{Delimiter, Record};
pub use schema::{DocumentSchema, FieldKind, FieldSpec};

/// Crate version recorded in run summaries.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
