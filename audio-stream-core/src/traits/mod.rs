pub mod device_listener;
pub mod endpoint;
pub mod transport;
