use crate::domain::DestinationId;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the command layer and the
/// delivery loop can decide between a user-facing message and a logged failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// The batch cap was reached and every candidate had already been delivered.
    #[error("reached search limit of {max_batch} posts without finding a new post")]
    SearchExhausted { max_batch: usize },

    #[error("no results found for {query}")]
    NoMatch { query: String },

    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("no channel accepts messages in destination {0}")]
    MissingDeliveryTarget(DestinationId),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
