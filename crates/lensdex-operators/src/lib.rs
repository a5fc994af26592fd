#![forbid(unsafe_code)]
//! lensdex-operators: the synchronous, single-threaded half of the pipeline.
//!
//! - `document`: records → JSON document bodies via a field-type table.
//! - `group`: incremental group-by over a key-sorted stream.
//! - `batch`: bulk headers and batches handed to the writers.
//!
//! Nothing here does IO or touches a runtime.

pub mod batch;
pub mod document;
pub mod error;
pub mod group;

pub use batch::{Batch, BulkHeader, Document};
pub use document::{BuiltDocument, DocumentBuilder};
pub use error::OpError;
pub use group::{GroupAggregator, GroupDocument, GroupLayout};
