//! Convenient re-exports for downstream crates.

pub use crate::config::IndexerConfig;
pub use crate::dsl::yaml::{parse_yaml_job, GroupDef, JobSpec};
pub use crate::error::{Error, Result};
pub use crate::hash::Hash256;
pub use crate::manifest::{OutputStats, RunId, RunSummary};
pub use crate::record::{Delimiter, Record};
pub use crate::schema::{DocumentSchema, FieldKind, FieldSpec};
