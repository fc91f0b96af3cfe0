pub mod buffer;
pub mod feeder;

#[cfg(feature = "cpal")]
pub mod output;

pub use buffer::AudioStagingBuffer;
pub use feeder::{AudioControls, AudioFeeder};

#[cfg(feature = "cpal")]
pub use output::CpalOutput;
