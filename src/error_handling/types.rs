use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    NotInRange(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::InvalidValue(e) => write!(f, "Invalid value: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Errors raised on the packet capture path.
///
/// `EmptySessionId`, `InvalidRange` and `InvalidFileName` are caller bugs and
/// are reported before any counter moves. `WriteFailed` is a runtime condition
/// that the capture path logs and swallows.
#[derive(Debug)]
pub enum DumpError {
    EmptySessionId,
    InvalidRange { offset: usize, limit: usize, len: usize },
    InvalidFileName(String),
    WriteFailed(PathBuf, std::io::Error),
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpError::EmptySessionId => write!(f, "Session identifier must not be empty"),
            DumpError::InvalidRange { offset, limit, len } => write!(
                f,
                "Invalid byte range [{}, {}) for a buffer of {} byte(s)",
                offset, limit, len
            ),
            DumpError::InvalidFileName(name) => write!(f, "Invalid dump file name: {:?}", name),
            DumpError::WriteFailed(path, e) => {
                write!(f, "Dump write failed for {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for DumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DumpError::WriteFailed(_, e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum KeyError {
    NotFound(PathBuf),
    IoError(PathBuf, std::io::Error),
    Encoding(String),
    Decoding(String),
    AlgorithmMismatch { expected: String, found: String },
    UnknownAlgorithm(String),
    Mismatch,
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::NotFound(path) => write!(f, "Key file not found: {}", path.display()),
            KeyError::IoError(path, e) => write!(f, "Key file IO error for {}: {}", path.display(), e),
            KeyError::Encoding(e) => write!(f, "Key encoding failed: {}", e),
            KeyError::Decoding(e) => write!(f, "Key decoding failed: {}", e),
            KeyError::AlgorithmMismatch { expected, found } => write!(
                f,
                "Key algorithm mismatch: expected {}, found {}",
                expected, found
            ),
            KeyError::UnknownAlgorithm(name) => write!(f, "Unknown key algorithm: {}", name),
            KeyError::Mismatch => write!(f, "Stored public key does not match the private key"),
        }
    }
}

impl std::error::Error for KeyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KeyError::IoError(_, e) => Some(e),
            _ => None,
        }
    }
}

impl KeyError {
    /// Maps an IO error on `path`, keeping a missing file distinguishable.
    pub(crate) fn from_io(path: PathBuf, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            KeyError::NotFound(path)
        } else {
            KeyError::IoError(path, err)
        }
    }
}
