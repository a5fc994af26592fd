use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("io: {0}")]
    Io(#[from] lensdex_io::Error),

    #[error("read: {0}")]
    Read(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] lensdex_core::Error),

    #[error("operator: {0}")]
    Operator(#[from] lensdex_operators::OpError),

    #[error("writer for '{0}' stopped before its queue was closed")]
    WriterGone(String),

    #[error("task join: {0}")]
    Join(String),
}
