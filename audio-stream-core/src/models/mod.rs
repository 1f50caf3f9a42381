pub mod config;
pub mod device_event;
pub mod error;
pub mod format;
pub mod frame;
pub mod recording;
pub mod state;
