use thiserror::Error;

#[derive(Error, Debug)]
/// Errors that end the bridge
pub enum BridgeError {
    /// The serial device could not be opened
    #[error("failed to open serial port: {0}")]
    Serial(#[from] serialport::Error),
    /// File or console I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The stored configuration could not be read or written
    #[error("configuration error: {0}")]
    Config(String),
    /// The Ctrl+C handler could not be installed
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}
