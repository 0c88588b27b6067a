//! Diagnostic capture of RTMP session traffic.
//!
//! Packets flowing through a session are dumped one file per packet, numbered
//! per session and direction ([`data_capture`]). The handshake key pair can be
//! saved and reloaded in standard SPKI / PKCS#8 encodings ([`key_store`]).

pub mod configuration;
pub use configuration::DumpConfig;

pub mod data_capture;
pub use data_capture::{DebugDumper, Direction, SessionSequencer};

pub mod error_handling;
pub use error_handling::types::{ConfigError, DumpError, KeyError};

pub mod key_store;
