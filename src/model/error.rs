use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BucketError {
    #[error("missing configuration key - {0}")]
    MissingConfig(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("authentication failed: {0}")]
    RemoteAuth(String),

    #[error("unable to open file: {}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("remote request failed: {0}")]
    Remote(String),
}

pub type BucketResult<T> = Result<T, BucketError>;

impl BucketError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BucketError::MissingConfig(_) | BucketError::InvalidConfig(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BucketError::NotFound(_))
    }
}
