pub mod capturer;
pub mod handle;
pub mod monitor;
pub mod renderer;
pub mod stream_engine;
