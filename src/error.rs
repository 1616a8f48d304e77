/// Errors raised by the protocol codec.
///
/// Every kind is kept distinct so a caller can pick its own policy, e.g. repeat a
/// request after [`Error::ChecksumMismatch`] but give up after [`Error::DeviceError`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// An argument does not have the expected shape, e.g. a response field that is not ASCII text.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    /// The combination of mode, OBIS code and payload is not allowed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The OBIS code does not follow the `HH.HH.HH*FF` grammar.
    #[error("OBIS code format is wrong: '{0}'")]
    MalformedObis(String),
    /// The received buffer matches none of the known frame shapes.
    #[error("Invalid response format, response: {0:02X?}")]
    MalformedResponse(Vec<u8>),
    /// The frame is well formed but its block check character is wrong.
    #[error("Invalid checksum - calculated={calculated:02X} received={received:02X}")]
    ChecksumMismatch { calculated: u8, received: u8 },
    /// The meter answered with an error frame carrying this decimal code.
    #[error("Meter returned error code {0}")]
    DeviceError(String),
    /// Numeric text in a response could not be interpreted.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl Error {
    /// Transmission errors that may disappear when the request is sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ChecksumMismatch { .. } | Error::MalformedResponse(_)
        )
    }
}
