//! Concurrent decode pipeline: source → read loop → packet queues →
//! decode loops → frame queues.

pub mod clock;
pub mod decode_loop;
pub mod queue;
pub mod read_loop;
pub mod shared;

pub use clock::{PresentationClock, WallClock};
pub use decode_loop::{DecodeLoop, DecodePolicy};
pub use queue::BoundedQueue;
pub use read_loop::ReadLoop;
pub use shared::{PipelineShared, StreamSlot};
