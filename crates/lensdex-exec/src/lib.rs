#![forbid(unsafe_code)]
//! lensdex-exec: the two-stage indexing pipeline.
//!
//! One sequential producer (read, join, build, group) runs on a blocking
//! thread and feeds one bounded queue per output index. Each queue is drained
//! by its own writer task issuing bulk calls. Closing a queue shuts its writer
//! down after a final store flush.

pub mod datasets;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod prepare;
pub mod progress;
pub mod writer;

pub use datasets::Dataset;
pub use error::ExecError;
pub use job::{job_outputs, orchestrator_from_job};
pub use pipeline::{Augment, OutputTarget, PipelineOrchestrator};
pub use prepare::prepare_index;
pub use progress::ProgressReport;
pub use writer::{BatchQueue, BulkWriter};
