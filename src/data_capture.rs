pub mod types;
pub mod sink;
pub mod sequencer;
pub mod dumper;


pub use types::{BufferWindow, CaptureBuffer, CounterKey, Direction};
pub use sink::{FileSink, Sink};
pub use sequencer::SessionSequencer;
pub use dumper::DebugDumper;
