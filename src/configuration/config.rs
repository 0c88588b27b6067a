use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::error_handling::types::ConfigError;
use crate::key_store::KeyAlgorithm;

/// Handshake packet size of the RTMP protocol.
pub const DEFAULT_HANDSHAKE_SIZE: usize = 1536;

/// Length of the handshake digest; `hrand2` covers the handshake minus it.
pub const HANDSHAKE_DIGEST_LENGTH: usize = 32;

/// Configuration of the packet dumper.
///
/// Every field has a default, so an empty TOML file (or `DumpConfig::default()`)
/// reproduces the classic layout: everything under `dump/`, packets as
/// `*.rtmp`, video frames as `*.bin`.
///
/// ```toml
/// dump_dir = "/var/tmp/rtmp-dump"
/// session_scoped_filenames = true
/// ```
///
/// # Fields Overview
///
/// - `dump_dir`: directory receiving every dump file. It must already exist.
/// - `extension`: extension of packet and handshake dumps
/// - `video_extension`: extension of video frame dumps
/// - `handshake_size`: handshake packet size; the random dumps are derived from it
/// - `session_scoped_filenames`: prefix sequenced dumps with the session id
/// - `key_algorithm`: algorithm of the handshake key pair kept in `dump_dir`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DumpConfig {
    pub dump_dir: PathBuf,
    pub extension: String,
    pub video_extension: String,
    pub handshake_size: usize,
    pub session_scoped_filenames: bool,
    pub key_algorithm: KeyAlgorithm,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            dump_dir: PathBuf::from("dump"),
            extension: String::from("rtmp"),
            video_extension: String::from("bin"),
            handshake_size: DEFAULT_HANDSHAKE_SIZE,
            session_scoped_filenames: false,
            key_algorithm: KeyAlgorithm::X25519,
        }
    }
}

impl DumpConfig {
    /// Uses the defaults with a different dump directory.
    pub fn with_dump_dir<P: AsRef<Path>>(dump_dir: P) -> Self {
        Self {
            dump_dir: dump_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Reads and validates a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        debug!("Loaded dump configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: DumpConfig =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handshake_size < HANDSHAKE_DIGEST_LENGTH {
            return Err(ConfigError::NotInRange(format!(
                "handshake_size must be at least {}, got {}",
                HANDSHAKE_DIGEST_LENGTH, self.handshake_size
            )));
        }
        for (field, ext) in [
            ("extension", &self.extension),
            ("video_extension", &self.video_extension),
        ] {
            if ext.is_empty() || ext.contains(['/', '\\', '.']) {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be a bare extension, got {:?}",
                    field, ext
                )));
            }
        }
        Ok(())
    }

    /// Bytes written to `hrand1`; `None` when the handshake is too small.
    pub fn handshake_rand1_len(&self) -> Option<usize> {
        self.handshake_size.checked_sub(8)
    }

    /// Bytes written to `hrand2`; `None` when the handshake is too small.
    pub fn handshake_rand2_len(&self) -> Option<usize> {
        self.handshake_size.checked_sub(HANDSHAKE_DIGEST_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_gives_defaults() {
        let config = DumpConfig::from_toml("").unwrap();
        assert_eq!(config, DumpConfig::default());
        assert_eq!(config.dump_dir, PathBuf::from("dump"));
        assert_eq!(config.handshake_rand1_len(), Some(1528));
        assert_eq!(config.handshake_rand2_len(), Some(1504));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "dump_dir = \"/tmp/captures\"\nsession_scoped_filenames = true\nkey_algorithm = \"ed25519\"\nhandshake_size = 64"
        )
        .unwrap();

        let config = DumpConfig::from_file(file.path()).unwrap_or_else(|e| panic!("{}", e));
        assert_eq!(config.dump_dir, PathBuf::from("/tmp/captures"));
        assert!(config.session_scoped_filenames);
        assert_eq!(config.key_algorithm, KeyAlgorithm::Ed25519);
        assert_eq!(config.handshake_size, 64);
        assert_eq!(config.extension, "rtmp");
    }

    #[test]
    fn rejects_small_handshake() {
        assert!(matches!(
            DumpConfig::from_toml("handshake_size = 16"),
            Err(ConfigError::NotInRange(_))
        ));
    }

    #[test]
    fn undersized_handshake_has_no_random_lengths() {
        let config = DumpConfig {
            handshake_size: 4,
            ..DumpConfig::default()
        };
        assert_eq!(config.handshake_rand1_len(), None);
        assert_eq!(config.handshake_rand2_len(), None);
    }

    #[test]
    fn rejects_extension_with_separator() {
        assert!(matches!(
            DumpConfig::from_toml("extension = \"../rtmp\""),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(matches!(
            DumpConfig::from_toml("dump_directory = \"x\""),
            Err(ConfigError::TomlError(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            DumpConfig::from_file(&dir.path().join("absent.toml")),
            Err(ConfigError::IoError(_))
        ));
    }
}
