use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum FetchError {
    #[display("request to {endpoint} failed")]
    Network { endpoint: String },
    #[display("unexpected response format: {reason}")]
    Format { reason: String },
    #[display("failed to parse response: {reason}")]
    Parse { reason: String },
}

#[derive(Debug, Display, Error)]
pub enum AggregateError {
    #[display("no valid price among {fetched} fetched")]
    EmptyResult { fetched: usize },
}

#[derive(Debug, Display, Error)]
pub enum NotifyError {
    #[display("push channel is not configured: {reason}")]
    Config { reason: String },
    #[display("failed to deliver push message")]
    Delivery,
    #[display("push service rejected the message: {reason}")]
    Rejected { reason: String },
}

#[derive(Debug, Display, Error)]
pub enum StorageError {
    #[display("failed to read notification log")]
    Read,
    #[display("failed to write notification log")]
    Write,
    #[display("failed to serialize notification log")]
    Serialize,
}
