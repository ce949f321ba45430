//! Event Bus & Action Streamer (spec.md §4.8).

pub mod bus;
pub mod streamer;

pub use bus::EventBus;
pub use streamer::ActionStreamer;
