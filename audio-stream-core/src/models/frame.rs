use serde::{Deserialize, Serialize};

/// Position of a rendered frame, handed to render callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Seconds since `start`, advancing by `1 / sample_rate` per frame.
    pub elapsed_secs: f64,
    /// Zero-based frame index since `start`.
    pub ordinal: u64,
}

/// Direction of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Capture,
    Render,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capture => f.write_str("capture"),
            Self::Render => f.write_str("render"),
        }
    }
}
