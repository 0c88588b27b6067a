//! Per-session sequence numbering for packet dumps.
//!
//! `SessionSequencer` owns a table of counters keyed by
//! [`CounterKey`]. Every counter is an `AtomicU64` behind an `Arc`, so the
//! map lock is only held to find (or lazily insert) the counter; the
//! increment itself happens outside the lock. Callers on different keys never
//! wait on each other's increments, and callers on the same key never observe
//! the same value.
//!
//! A sequence number is consumed as soon as it is issued. If the sink then
//! fails, the failure is logged and the number is still returned: the dump is
//! best effort and a gap in the files on disk is the only visible trace.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, error, trace};

use crate::error_handling::types::DumpError;

use super::sink::{byte_range, check_file_name, Sink};
use super::types::{CaptureBuffer, CounterKey, Direction};

pub struct SessionSequencer {
    sink: Arc<dyn Sink>,
    counters: RwLock<HashMap<CounterKey, Arc<AtomicU64>>>,
    /// Prefix sequenced file names with the session identifier.
    session_scoped_filenames: bool,
}

impl SessionSequencer {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        debug!("SessionSequencer created");
        Self {
            sink,
            counters: RwLock::new(HashMap::new()),
            session_scoped_filenames: false,
        }
    }

    /// By default `in_<N>` / `out_<N>` names are shared by every session, so
    /// two sessions dumping in the same direction overwrite each other's
    /// files. Enabling this writes `<session>_in_<N>` instead.
    pub fn with_session_scoped_filenames(mut self, enabled: bool) -> Self {
        self.session_scoped_filenames = enabled;
        self
    }

    pub fn sink(&self) -> &Arc<dyn Sink> {
        &self.sink
    }

    pub fn record_incoming<B>(&self, session_id: &str, buffer: &B) -> Result<u64, DumpError>
    where
        B: CaptureBuffer + ?Sized,
    {
        self.record(session_id, Direction::In, buffer)
    }

    pub fn record_outgoing<B>(&self, session_id: &str, buffer: &B) -> Result<u64, DumpError>
    where
        B: CaptureBuffer + ?Sized,
    {
        self.record(session_id, Direction::Out, buffer)
    }

    /// Assigns the next sequence number for `(session_id, direction)` and
    /// dumps the buffer under it.
    ///
    /// Errors
    /// - [`DumpError::EmptySessionId`] / [`DumpError::InvalidRange`] when the
    ///   arguments are unusable; the counter is left untouched.
    /// - [`DumpError::InvalidFileName`] when session scoped names are on and
    ///   the session id cannot be part of a file name; likewise before counting.
    ///
    /// Sink failures are logged, not returned.
    pub fn record<B>(
        &self,
        session_id: &str,
        direction: Direction,
        buffer: &B,
    ) -> Result<u64, DumpError>
    where
        B: CaptureBuffer + ?Sized,
    {
        if session_id.is_empty() {
            return Err(DumpError::EmptySessionId);
        }
        if self.session_scoped_filenames {
            check_file_name(session_id)?;
        }
        byte_range(buffer.array(), buffer.array_offset(), buffer.limit())?;

        let seq = self.next_sequence(CounterKey::session(session_id, direction));
        let filename = self.sequenced_filename(session_id, direction, seq);
        trace!(
            "[{}] {} packet #{}: {} byte(s)",
            session_id,
            direction,
            seq,
            buffer.limit() - buffer.array_offset()
        );
        self.deliver(&filename, buffer.array(), buffer.array_offset(), buffer.limit());
        Ok(seq)
    }

    /// Dumps the buffer under `tag`, without touching any counter.
    pub fn dump_tagged<B>(&self, tag: &str, buffer: &B) -> Result<(), DumpError>
    where
        B: CaptureBuffer + ?Sized,
    {
        byte_range(buffer.array(), buffer.array_offset(), buffer.limit())?;
        self.deliver(tag, buffer.array(), buffer.array_offset(), buffer.limit());
        Ok(())
    }

    /// Dumps exactly `length` bytes of `data` starting at `offset`.
    pub fn dump_fixed_range(
        &self,
        tag: &str,
        data: &[u8],
        offset: usize,
        length: usize,
    ) -> Result<(), DumpError> {
        let limit = offset.checked_add(length).ok_or(DumpError::InvalidRange {
            offset,
            limit: usize::MAX,
            len: data.len(),
        })?;
        byte_range(data, offset, limit)?;
        self.deliver(tag, data, offset, limit);
        Ok(())
    }

    /// Increments the counter for `key` and returns the new value. The first
    /// value issued for any key is 1.
    pub fn next_sequence(&self, key: CounterKey) -> u64 {
        let existing = self
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        let counter = match existing {
            Some(counter) => counter,
            None => self
                .counters
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key)
                .or_default()
                .clone(),
        };
        counter.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Last sequence number issued for `(session_id, direction)`, if any.
    pub fn current_sequence(&self, session_id: &str, direction: Direction) -> Option<u64> {
        self.current(&CounterKey::session(session_id, direction))
    }

    /// Last value issued for any counter `key`, if any.
    pub fn current(&self, key: &CounterKey) -> Option<u64> {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|c| c.load(Ordering::Acquire))
    }

    fn sequenced_filename(&self, session_id: &str, direction: Direction, seq: u64) -> String {
        if self.session_scoped_filenames {
            format!("{}_{}_{}", session_id, direction, seq)
        } else {
            format!("{}_{}", direction, seq)
        }
    }

    /// Hands the range to the sink; failures end here.
    pub(crate) fn deliver(
        &self,
        filename: &str,
        data: &[u8],
        offset: usize,
        limit: usize,
    ) -> Option<PathBuf> {
        match self.sink.write(filename, data, offset, limit) {
            Ok(path) => Some(path),
            Err(e) => {
                error!("Dropping dump {}: {}", filename, e);
                None
            }
        }
    }
}
