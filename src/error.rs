//! Error type for fixture generation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while persisting a fixture.
#[derive(Error, Debug)]
pub enum FixtureError {
    /// The destination could not be created or written.
    #[error("cannot write fixture to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FixtureError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FixtureError::Io {
            path: path.into(),
            source,
        }
    }

    /// Underlying OS error kind.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            FixtureError::Io { source, .. } => source.kind(),
        }
    }
}
