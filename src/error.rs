use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors raised while streaming batches or setting up a training run.
/// None of them are recovered from, they abort the run.
#[derive(Debug)]
pub enum Error {
    /// A file expected for a drawn batch isn't there.
    MissingBatch { id: String, path: PathBuf },
    /// A batch file exists but can't be decoded or its shapes disagree.
    MalformedBatch { id: String, reason: String },
    /// The batch directory doesn't contain a single batch.
    EmptyPool { dir: PathBuf },
    /// The run was set up with an unusable combination of models and arguments.
    Configuration(String),
    /// Listing or writing failed.
    Io { path: PathBuf, source: io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn malformed<S: Into<String>, R: fmt::Display>(id: S, reason: R) -> Self {
        Error::MalformedBatch {
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingBatch { id, path } => {
                write!(f, "Batch '{}' is missing {}", id, path.display())
            }
            Error::MalformedBatch { id, reason } => {
                write!(f, "Batch '{}' is malformed: {}", id, reason)
            }
            Error::EmptyPool { dir } => {
                write!(f, "No batches found in {}", dir.display())
            }
            Error::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io { path, source } => write!(f, "{}: {}", path.display(), source),
        }
    }
}
