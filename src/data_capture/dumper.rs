//! Protocol-facing façade over the capture subsystem.
//!
//! `DebugDumper` is what a protocol engine holds on to. It wires a
//! [`SessionSequencer`] to a [`FileSink`] rooted at the configured dump
//! directory and exposes one method per capture point of an RTMP session:
//! packets in and out, invoke packets, video frames, the two handshake random
//! blocks and the handshake key pair.
//!
//! None of these methods fail. Whatever goes wrong (bad arguments, a missing
//! dump directory, a full disk) is logged at ERROR and the session carries on.
//!
//! Minimal usage
//! ```no_run
//! use std::sync::Arc;
//! use packet_dumper::configuration::DumpConfig;
//! use packet_dumper::data_capture::DebugDumper;
//!
//! let dumper = Arc::new(DebugDumper::new(DumpConfig::with_dump_dir("dump")));
//! let seq = dumper.dump_incoming("session-1", &[0x03u8, 0x00, 0x00]);
//! assert_eq!(seq, Some(1));
//! ```

use std::path::Path;
use std::sync::Arc;

use log::{debug, error};

use crate::configuration::DumpConfig;
use crate::error_handling::types::KeyError;
use crate::key_store::{self, KeyPair};

use super::sequencer::SessionSequencer;
use super::sink::{byte_range, FileSink, Sink};
use super::types::{CaptureBuffer, CounterKey, Direction};

/// Counter key of the video frame stream.
const VIDEO_STREAM: &str = "video";

pub struct DebugDumper {
    config: DumpConfig,
    sequencer: SessionSequencer,
}

impl DebugDumper {
    pub fn new(config: DumpConfig) -> Self {
        let sink: Arc<dyn Sink> = Arc::new(FileSink::with_extension(
            &config.dump_dir,
            &config.extension,
        ));
        Self::with_sink(config, sink)
    }

    /// Uses `sink` for every dump except the key pair, which always goes to
    /// `config.dump_dir`.
    pub fn with_sink(config: DumpConfig, sink: Arc<dyn Sink>) -> Self {
        debug!(
            "DebugDumper created for {} (session scoped names: {})",
            config.dump_dir.display(),
            config.session_scoped_filenames
        );
        let sequencer =
            SessionSequencer::new(sink).with_session_scoped_filenames(config.session_scoped_filenames);
        Self { config, sequencer }
    }

    pub fn config(&self) -> &DumpConfig {
        &self.config
    }

    pub fn sequencer(&self) -> &SessionSequencer {
        &self.sequencer
    }

    /// Dumps a received packet as `in_<N>`; returns `N`.
    pub fn dump_incoming<B>(&self, session_id: &str, data: &B) -> Option<u64>
    where
        B: CaptureBuffer + ?Sized,
    {
        self.dump_packet(session_id, Direction::In, data)
    }

    /// Dumps a sent packet as `out_<N>`; returns `N`.
    pub fn dump_outgoing<B>(&self, session_id: &str, data: &B) -> Option<u64>
    where
        B: CaptureBuffer + ?Sized,
    {
        self.dump_packet(session_id, Direction::Out, data)
    }

    fn dump_packet<B>(&self, session_id: &str, direction: Direction, data: &B) -> Option<u64>
    where
        B: CaptureBuffer + ?Sized,
    {
        self.sequencer
            .record(session_id, direction, data)
            .map_err(|e| error!("[{}] {} packet not dumped: {}", session_id, direction, e))
            .ok()
    }

    /// Dumps an invoke packet as `packet_invoke_<action>_<transaction_id>`.
    pub fn dump_invoke_packet<B>(&self, action: &str, transaction_id: u32, data: &B)
    where
        B: CaptureBuffer + ?Sized,
    {
        let tag = format!("packet_invoke_{}_{}", action, transaction_id);
        if let Err(e) = self.sequencer.dump_tagged(&tag, data) {
            error!("Invoke packet {} not dumped: {}", tag, e);
        }
    }

    /// Dumps a video frame as `video_<N>.<video_extension>`; returns `N`,
    /// which counts frames across all sessions starting at 1.
    pub fn dump_video_frame<B>(&self, data: &B) -> Option<u64>
    where
        B: CaptureBuffer + ?Sized,
    {
        let bytes = match byte_range(data.array(), data.array_offset(), data.limit()) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Video frame not dumped: {}", e);
                return None;
            }
        };
        let frame = self.sequencer.next_sequence(CounterKey::Stream(VIDEO_STREAM));
        let file_name = format!("video_{}.{}", frame, self.config.video_extension);
        if let Err(e) = self.sequencer.sink().write_file(&file_name, bytes) {
            error!("Dropping dump {}: {}", file_name, e);
        }
        Some(frame)
    }

    /// Dumps the random bytes that fill the handshake response after its
    /// 8-byte header: the first `handshake_size - 8` bytes, as `hrand1`.
    pub fn dump_handshake_rand1(&self, rand_bytes: &[u8]) {
        self.dump_handshake_rand("hrand1", rand_bytes, self.config.handshake_rand1_len());
    }

    /// Dumps the random bytes used to build the handshake digest: the first
    /// `handshake_size - 32` bytes, as `hrand2`.
    pub fn dump_handshake_rand2(&self, rand_bytes: &[u8]) {
        self.dump_handshake_rand("hrand2", rand_bytes, self.config.handshake_rand2_len());
    }

    fn dump_handshake_rand(&self, tag: &str, rand_bytes: &[u8], length: Option<usize>) {
        let Some(length) = length else {
            error!(
                "Handshake random {} not dumped: handshake_size {} is too small",
                tag, self.config.handshake_size
            );
            return;
        };
        if let Err(e) = self.sequencer.dump_fixed_range(tag, rand_bytes, 0, length) {
            error!("Handshake random {} not dumped: {}", tag, e);
        }
    }

    /// Writes the handshake key pair to `public.key` / `private.key` in the
    /// dump directory. Use [`key_store::save_key_pair`] to handle errors.
    pub fn dump_key_pair(&self, pair: &KeyPair) {
        if let Err(e) = key_store::save_key_pair(&self.config.dump_dir, pair) {
            error!("Key pair not dumped: {}", e);
        }
    }

    /// Loads a key pair previously dumped by [`dump_key_pair`](Self::dump_key_pair),
    /// using the configured algorithm.
    pub fn load_key_pair(&self) -> Result<KeyPair, KeyError> {
        key_store::load_key_pair(&self.config.dump_dir, self.config.key_algorithm)
    }

    pub fn dump_dir(&self) -> &Path {
        &self.config.dump_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn dumper(dir: &TempDir) -> DebugDumper {
        DebugDumper::new(DumpConfig::with_dump_dir(dir.path()))
    }

    #[test]
    fn incoming_scenario() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new().unwrap();
        let dumper = dumper(&dir);

        assert_eq!(dumper.dump_incoming("sess-A", &[0x01u8, 0x02, 0x03]), Some(1));
        assert_eq!(fs::read(dir.path().join("in_1.rtmp")).unwrap(), vec![0x01, 0x02, 0x03]);

        assert_eq!(dumper.dump_incoming("sess-A", &[0xFFu8]), Some(2));
        assert_eq!(fs::read(dir.path().join("in_2.rtmp")).unwrap(), vec![0xFF]);
    }

    #[test]
    fn outgoing_uses_its_own_sequence() {
        let dir = TempDir::new().unwrap();
        let dumper = dumper(&dir);
        dumper.dump_incoming("s", &[1u8]);
        assert_eq!(dumper.dump_outgoing("s", &[2u8]), Some(1));
        assert_eq!(fs::read(dir.path().join("out_1.rtmp")).unwrap(), vec![2]);
    }

    #[test]
    fn handshake_rand1_keeps_handshake_minus_header() {
        let dir = TempDir::new().unwrap();
        let dumper = dumper(&dir);
        let rand: Vec<u8> = (0..1536u32).map(|i| (i % 251) as u8).collect();

        dumper.dump_handshake_rand1(&rand);
        let written = fs::read(dir.path().join("hrand1.rtmp")).unwrap();
        assert_eq!(written.len(), 1528);
        assert_eq!(written, rand[..1528]);
    }

    #[test]
    fn handshake_rand2_keeps_handshake_minus_digest() {
        let dir = TempDir::new().unwrap();
        let dumper = dumper(&dir);
        let rand = vec![0x5Au8; 1536];

        dumper.dump_handshake_rand2(&rand);
        assert_eq!(fs::read(dir.path().join("hrand2.rtmp")).unwrap().len(), 1504);
    }

    #[test]
    fn short_handshake_random_is_not_dumped() {
        let dir = TempDir::new().unwrap();
        let dumper = dumper(&dir);
        dumper.dump_handshake_rand1(&[0u8; 100]);
        assert!(!dir.path().join("hrand1.rtmp").exists());
    }

    #[test]
    fn undersized_handshake_config_is_logged_not_dumped() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new().unwrap();
        let dumper = DebugDumper::new(DumpConfig {
            handshake_size: 4,
            ..DumpConfig::with_dump_dir(dir.path())
        });

        dumper.dump_handshake_rand1(&[0u8; 4]);
        dumper.dump_handshake_rand2(&[0u8; 4]);
        assert!(!dir.path().join("hrand1.rtmp").exists());
        assert!(!dir.path().join("hrand2.rtmp").exists());
    }

    #[test]
    fn invoke_packet_name() {
        let dir = TempDir::new().unwrap();
        let dumper = dumper(&dir);
        dumper.dump_invoke_packet("connect", 1, &b"\x02\x00\x07connect".to_vec());
        assert_eq!(
            fs::read(dir.path().join("packet_invoke_connect_1.rtmp")).unwrap(),
            b"\x02\x00\x07connect"
        );
    }

    #[test]
    fn video_frames_count_from_one_with_bin_extension() {
        let dir = TempDir::new().unwrap();
        let dumper = dumper(&dir);
        assert_eq!(dumper.dump_video_frame(&[0x17u8, 0x01]), Some(1));
        assert_eq!(dumper.dump_video_frame(&[0x27u8]), Some(2));
        assert_eq!(fs::read(dir.path().join("video_1.bin")).unwrap(), vec![0x17, 0x01]);
        assert_eq!(fs::read(dir.path().join("video_2.bin")).unwrap(), vec![0x27]);
        assert!(!dir.path().join("video_1.bin.rtmp").exists());
    }

    #[test]
    fn missing_dump_directory_does_not_interrupt() {
        let dir = TempDir::new().unwrap();
        let dumper = DebugDumper::new(DumpConfig::with_dump_dir(dir.path().join("absent")));

        assert_eq!(dumper.dump_incoming("s", &[1u8]), Some(1));
        assert_eq!(dumper.dump_incoming("s", &[2u8]), Some(2));
        assert_eq!(dumper.dump_video_frame(&[3u8]), Some(1));
        dumper.dump_handshake_rand1(&[0u8; 1536]);
        dumper.dump_key_pair(&KeyPair::generate(key_store::KeyAlgorithm::X25519));
        assert!(!dir.path().join("absent").exists());
    }

    #[test]
    fn empty_session_is_logged_not_counted() {
        let dir = TempDir::new().unwrap();
        let dumper = dumper(&dir);
        assert_eq!(dumper.dump_incoming("", &[1u8]), None);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn key_pair_dump_and_reload() {
        let dir = TempDir::new().unwrap();
        let dumper = dumper(&dir);
        let pair = KeyPair::generate(key_store::KeyAlgorithm::X25519);

        dumper.dump_key_pair(&pair);
        assert!(dir.path().join(key_store::PUBLIC_KEY_FILE).exists());
        assert_eq!(dumper.load_key_pair().unwrap(), pair);
    }

    #[test]
    fn session_scoped_config_prefixes_names() {
        let dir = TempDir::new().unwrap();
        let config = DumpConfig {
            session_scoped_filenames: true,
            ..DumpConfig::with_dump_dir(dir.path())
        };
        let dumper = DebugDumper::new(config);
        dumper.dump_outgoing("c42", &[9u8]);
        assert!(dir.path().join("c42_out_1.rtmp").exists());
        assert!(!dir.path().join("out_1.rtmp").exists());
    }
}
