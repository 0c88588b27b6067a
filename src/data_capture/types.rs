//! Common data types used across the data_capture subsystem.

use std::fmt;

/// Direction of a captured packet, relative to the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Bytes received from the remote peer.
    In,
    /// Bytes sent to the remote peer.
    Out,
}

impl Direction {
    /// Tag used in dump file names (`in_3`, `out_7`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of one counter in the sequencer table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CounterKey {
    /// Per-session, per-direction packet counter.
    Session { session_id: String, direction: Direction },
    /// Counter for a capture stream that is not tied to a session.
    Stream(&'static str),
}

impl CounterKey {
    pub fn session(session_id: &str, direction: Direction) -> Self {
        CounterKey::Session {
            session_id: session_id.to_owned(),
            direction,
        }
    }
}

/// A byte buffer as handed over by the protocol engine: a backing array plus
/// the window `[array_offset, limit)` that holds the packet.
pub trait CaptureBuffer {
    fn array(&self) -> &[u8];

    fn array_offset(&self) -> usize {
        0
    }

    /// End-exclusive read position into [`array`](Self::array).
    fn limit(&self) -> usize {
        self.array().len()
    }
}

impl CaptureBuffer for [u8] {
    fn array(&self) -> &[u8] {
        self
    }
}

impl<const N: usize> CaptureBuffer for [u8; N] {
    fn array(&self) -> &[u8] {
        self
    }
}

impl CaptureBuffer for Vec<u8> {
    fn array(&self) -> &[u8] {
        self
    }
}

/// Borrowed window over a larger array, for engines that reuse one backing
/// allocation for many packets.
#[derive(Debug, Clone, Copy)]
pub struct BufferWindow<'a> {
    array: &'a [u8],
    offset: usize,
    limit: usize,
}

impl<'a> BufferWindow<'a> {
    /// The window is not validated here; the sink rejects out-of-range
    /// windows when they are written.
    pub fn new(array: &'a [u8], offset: usize, limit: usize) -> Self {
        Self { array, offset, limit }
    }
}

impl CaptureBuffer for BufferWindow<'_> {
    fn array(&self) -> &[u8] {
        self.array
    }

    fn array_offset(&self) -> usize {
        self.offset
    }

    fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_slices_cover_the_whole_array() {
        let bytes = vec![1u8, 2, 3];
        assert_eq!(bytes.array_offset(), 0);
        assert_eq!(bytes.limit(), 3);
    }

    #[test]
    fn window_reports_its_bounds() {
        let backing = [0u8; 16];
        let window = BufferWindow::new(&backing, 4, 9);
        assert_eq!(window.array().len(), 16);
        assert_eq!(window.array_offset(), 4);
        assert_eq!(window.limit(), 9);
    }

    #[test]
    fn direction_tags() {
        assert_eq!(Direction::In.to_string(), "in");
        assert_eq!(Direction::Out.to_string(), "out");
    }
}
