use thiserror::Error;

/// Fatal errors of the sensor.
///
/// Wire-format and policy outcomes are deliberately absent here: they travel
/// through [`EventDescription`](crate::events::EventDescription) back to the
/// parser and filters, which turn them into events instead of errors.
#[derive(Error, Debug)]
pub enum MuninnError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rule file error: {0}")]
    Rules(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Capture error on {ifname}: {reason}")]
    Capture { ifname: String, reason: String },

    #[error("Control socket error: {0}")]
    Control(String),
}

pub type Result<T> = std::result::Result<T, MuninnError>;
