use serde::{Deserialize, Serialize};

use super::error::InitError;
use super::format::AudioFormat;

/// What the capture loop does with packets the hardware flags as silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SilentPacketPolicy {
    /// Release the packet without forwarding anything to the sink.
    Skip,
    /// Forward a zero-filled span of the packet's length.
    Zeros,
}

/// Configuration for a stream engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfiguration {
    /// Requested hardware buffer duration in milliseconds (default: 16).
    /// Used by `initialize_from_config`; an explicit `initialize(ms)`
    /// overrides it.
    pub buffer_duration_ms: u32,

    /// Format to request, or None for the endpoint's native mix format.
    pub desired_format: Option<AudioFormat>,

    /// Handling of hardware-flagged silent capture packets (default: skip).
    pub silent_packets: SilentPacketPolicy,

    /// Write one silent buffer before the render transport starts (default: true).
    pub prime_with_silence: bool,

    /// Lower bound on the poll interval in microseconds (default: 1000).
    pub min_poll_interval_us: u64,

    /// Capacity of the capture→render bridge in samples, or None to grow.
    pub bridge_capacity: Option<usize>,
}

impl StreamConfiguration {
    pub fn validate(&self) -> Result<(), InitError> {
        if !(1..=2000).contains(&self.buffer_duration_ms) {
            return Err(InitError::InvalidConfiguration(format!(
                "buffer duration out of range: {}ms",
                self.buffer_duration_ms
            )));
        }
        if self.min_poll_interval_us == 0 {
            return Err(InitError::InvalidConfiguration(
                "minimum poll interval must be positive".into(),
            ));
        }
        if self.bridge_capacity == Some(0) {
            return Err(InitError::InvalidConfiguration(
                "bridge capacity must be positive".into(),
            ));
        }
        if let Some(format) = &self.desired_format {
            format.validate().map_err(InitError::InvalidConfiguration)?;
        }
        Ok(())
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, InitError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| InitError::InvalidConfiguration(format!("failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_buffer_duration_ms(mut self, ms: u32) -> Self {
        self.buffer_duration_ms = ms;
        self
    }
}

impl Default for StreamConfiguration {
    fn default() -> Self {
        Self {
            buffer_duration_ms: 16,
            desired_format: None,
            silent_packets: SilentPacketPolicy::Skip,
            prime_with_silence: true,
            min_poll_interval_us: 1000,
            bridge_capacity: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::SampleRepresentation;

    #[test]
    fn default_is_valid() {
        let config = StreamConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_duration_ms, 16);
        assert_eq!(config.silent_packets, SilentPacketPolicy::Skip);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(StreamConfiguration::default().with_buffer_duration_ms(0).validate().is_err());
        assert!(StreamConfiguration::default().with_buffer_duration_ms(5000).validate().is_err());

        let config = StreamConfiguration {
            bridge_capacity: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StreamConfiguration {
            desired_format: Some(AudioFormat::new(0, 48000, SampleRepresentation::Float32)),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(InitError::InvalidConfiguration(_))));
    }

    #[test]
    fn parses_partial_json() {
        let config = StreamConfiguration::from_json(
            r#"{ "buffer_duration_ms": 30, "silent_packets": "zeros",
                 "desired_format": { "channels": 1, "sample_rate": 16000, "representation": "int16" } }"#,
        )
        .unwrap();
        assert_eq!(config.buffer_duration_ms, 30);
        assert_eq!(config.silent_packets, SilentPacketPolicy::Zeros);
        assert!(config.prime_with_silence);
        assert_eq!(
            config.desired_format,
            Some(AudioFormat::new(1, 16000, SampleRepresentation::Int16))
        );
    }

    #[test]
    fn invalid_json_is_a_configuration_error() {
        assert!(matches!(
            StreamConfiguration::from_json("{ not json"),
            Err(InitError::InvalidConfiguration(_))
        ));
        assert!(StreamConfiguration::from_json(r#"{ "buffer_duration_ms": 0 }"#).is_err());
    }
}
