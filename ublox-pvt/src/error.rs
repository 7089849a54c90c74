use thiserror::Error;

#[derive(Error, Debug)]
/// Errors surfaced by the UBX codec and the fix publisher.
///
/// Framing problems (missing sync, incomplete or corrupt frames) are not
/// represented here: the [`FrameAssembler`](crate::FrameAssembler) absorbs them.
pub enum UbxError {
    /// A recognized message carried a payload of the wrong size.
    #[error("{message} payload length {got} != {expected}")]
    PayloadLength {
        /// Message the payload was decoded as
        message: &'static str,
        /// Required payload length
        expected: usize,
        /// Received payload length
        got: usize,
    },
    /// Writing to the receiver failed.
    #[error("receiver I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The telemetry bus rejected a publish.
    #[error("telemetry bus error: {0}")]
    Bus(String),
    /// A position record could not be serialized.
    #[error("failed to serialize position record: {0}")]
    Serialize(#[from] serde_json::Error),
}
