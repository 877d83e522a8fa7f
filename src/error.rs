use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("VISA error: {0}")]
    Visa(String),
    #[error("VISA support not compiled in; rebuild with `--features visa`")]
    VisaUnavailable,
    #[error("Timed out waiting for a reply")]
    Timeout,
    #[error("Unable to parse reply to `{command}`: {reply:?}")]
    Parse { command: String, reply: String },
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
