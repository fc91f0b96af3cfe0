pub mod controller;
pub mod render;
pub mod state;
pub mod sync;

pub use controller::PlaybackController;
pub use render::Presenter;
pub use state::{PlayerState, SharedStatus};
pub use sync::{SyncEngine, SyncReference};
