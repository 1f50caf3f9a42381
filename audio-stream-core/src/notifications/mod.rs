pub mod hub;
pub mod subscription;
pub mod volume;
