use thiserror::Error;

/// Custom error types for the rating server
///
/// The Display strings of the room/session variants are the exact messages
/// surfaced to clients on the acknowledgement channel.
#[derive(Debug, Error)]
pub enum RoomError {
    /// Room and session errors
    #[error("Room not found")]
    RoomNotFound,

    #[error("Invalid rating")]
    InvalidRating,

    #[error("Only creator can {0}")]
    Forbidden(&'static str),

    /// Code generation errors
    #[error("Room code space exhausted after {0} attempts")]
    CodeSpaceExhausted(u32),

    /// Messaging errors
    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Connection channel closed")]
    ChannelClosed,
}

/// Convenience type alias for Results using RoomError
pub type Result<T> = std::result::Result<T, RoomError>;

/// A dropped receiver means the connection is gone; collapse the channel
/// error so callers can treat it like any other closed connection.
impl From<tokio::sync::mpsc::error::SendError<warp::ws::Message>> for RoomError {
    fn from(_: tokio::sync::mpsc::error::SendError<warp::ws::Message>) -> Self {
        RoomError::ChannelClosed
    }
}
