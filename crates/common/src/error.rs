use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid serial number: {0:?}")]
    InvalidSerial(String),
}

pub type Result<T> = std::result::Result<T, Error>;
