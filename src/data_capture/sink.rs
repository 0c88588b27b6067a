//! Filesystem sink for dump files.
//!
//! The [`Sink`] trait is the only place the capture subsystem touches the
//! filesystem. [`FileSink`] writes each dump to `<dump_dir>/<name>.<ext>`,
//! truncating any previous file of the same name. It never creates the dump
//! directory; a missing directory surfaces as [`DumpError::WriteFailed`].

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::error_handling::types::DumpError;

/// Default extension for packet and handshake dumps.
pub const DEFAULT_EXTENSION: &str = "rtmp";

pub trait Sink: Send + Sync {
    /// Extension appended by [`write`](Self::write).
    fn extension(&self) -> &str;

    /// Writes `bytes` under the complete file name `file_name`.
    fn write_file(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, DumpError>;

    /// Writes `data[offset..limit]` to `<filename>.<extension>`.
    fn write(
        &self,
        filename: &str,
        data: &[u8],
        offset: usize,
        limit: usize,
    ) -> Result<PathBuf, DumpError> {
        let bytes = byte_range(data, offset, limit)?;
        self.write_file(&format!("{}.{}", filename, self.extension()), bytes)
    }
}

/// Returns `data[offset..limit]`, or [`DumpError::InvalidRange`].
pub fn byte_range(data: &[u8], offset: usize, limit: usize) -> Result<&[u8], DumpError> {
    if offset > limit || limit > data.len() {
        return Err(DumpError::InvalidRange {
            offset,
            limit,
            len: data.len(),
        });
    }
    Ok(&data[offset..limit])
}

/// Rejects names that would escape the dump directory.
pub fn check_file_name(name: &str) -> Result<(), DumpError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(DumpError::InvalidFileName(name.to_owned()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct FileSink {
    dump_dir: PathBuf,
    extension: String,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(dump_dir: P) -> Self {
        Self::with_extension(dump_dir, DEFAULT_EXTENSION)
    }

    pub fn with_extension<P: AsRef<Path>>(dump_dir: P, extension: &str) -> Self {
        let dump_dir = dump_dir.as_ref().to_path_buf();
        debug!("FileSink writing *.{} to {}", extension, dump_dir.display());
        Self {
            dump_dir,
            extension: extension.to_owned(),
        }
    }

    pub fn dump_dir(&self) -> &Path {
        &self.dump_dir
    }
}

impl Sink for FileSink {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn write_file(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, DumpError> {
        check_file_name(file_name)?;
        let path = self.dump_dir.join(file_name);
        let mut f = File::create(&path).map_err(|e| DumpError::WriteFailed(path.clone(), e))?;
        f.write_all(bytes)
            .map_err(|e| DumpError::WriteFailed(path.clone(), e))?;
        trace!("Wrote {} byte(s) to {}", bytes.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn writes_exact_range_with_extension() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());
        let path = sink.write("in_1", &[9, 1, 2, 3, 9], 1, 4).unwrap();
        assert_eq!(path, dir.path().join("in_1.rtmp"));
        assert_eq!(fs::read(path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn truncates_previous_file() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());
        sink.write("hrand1", b"longer content", 0, 14).unwrap();
        sink.write("hrand1", b"x", 0, 1).unwrap();
        assert_eq!(fs::read(dir.path().join("hrand1.rtmp")).unwrap(), b"x");
    }

    #[test]
    fn empty_range_writes_empty_file() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());
        sink.write("empty", &[1, 2, 3], 2, 2).unwrap();
        assert!(fs::read(dir.path().join("empty.rtmp")).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_ranges() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());
        assert!(matches!(
            sink.write("a", &[1, 2, 3], 2, 1),
            Err(DumpError::InvalidRange { offset: 2, limit: 1, len: 3 })
        ));
        assert!(matches!(
            sink.write("a", &[1, 2, 3], 0, 4),
            Err(DumpError::InvalidRange { .. })
        ));
        assert!(!dir.path().join("a.rtmp").exists());
    }

    #[test]
    fn rejects_names_with_separators() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());
        assert!(matches!(
            sink.write_file("../escape.rtmp", b"x"),
            Err(DumpError::InvalidFileName(_))
        ));
        assert!(matches!(
            sink.write_file("", b"x"),
            Err(DumpError::InvalidFileName(_))
        ));
    }

    #[test]
    fn missing_directory_is_a_write_failure() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path().join("not-created"));
        let err = sink.write("in_1", b"abc", 0, 3).unwrap_err();
        assert!(matches!(err, DumpError::WriteFailed(_, _)));
        assert!(!dir.path().join("not-created").exists());
    }

    #[test]
    fn custom_extension() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::with_extension(dir.path(), "bin");
        sink.write("frame", b"ab", 0, 2).unwrap();
        assert!(dir.path().join("frame.bin").exists());
    }
}
