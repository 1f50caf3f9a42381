use crate::models::config::StreamConfiguration;
use crate::models::error::StreamError;
use crate::processing::bridge::{BridgeStats, SampleBridge};
use crate::traits::endpoint::Endpoint;

use super::capturer::Capturer;
use super::renderer::Renderer;

/// Live capture → render monitoring over a `SampleBridge`.
///
/// ```text
/// [Capturer thread] → push → [SampleBridge] → pop per frame → [Renderer thread]
/// ```
///
/// Sample order is preserved; timing is not aligned. An empty bridge
/// renders silence and a slow renderer lets the bridge grow.
///
/// The renderer pops one sample per frame, so a stereo capture plays back as
/// consecutive mono frames at half speed while the bridge keeps growing; pair
/// a mono capture format with the renderer for sample-exact monitoring.
#[derive(Debug, Clone)]
pub struct Monitor {
    bridge: SampleBridge,
}

impl Monitor {
    pub fn new(bridge: SampleBridge) -> Self {
        Self { bridge }
    }

    /// Bridge sized by `bridge_capacity`: bounded drop-oldest, or growable.
    pub fn with_config(config: &StreamConfiguration) -> Self {
        Self::new(SampleBridge::with_capacity(config.bridge_capacity))
    }

    /// Start the renderer draining the bridge, then the capturer feeding it.
    ///
    /// If the capturer fails to start, the renderer is stopped again.
    pub fn start<C: Endpoint, R: Endpoint>(
        &self,
        capturer: &mut Capturer<C>,
        renderer: &mut Renderer<R>,
    ) -> Result<(), StreamError> {
        renderer.start_from_bridge(&self.bridge)?;
        if let Err(e) = capturer.start_streaming_into(&self.bridge) {
            if let Err(stop_err) = renderer.stop() {
                log::warn!("failed to stop renderer after capture start failure: {}", stop_err);
            }
            return Err(e);
        }
        log::info!("monitoring started");
        Ok(())
    }

    /// Stop both engines and drop whatever is still queued.
    ///
    /// Both engines are always stopped; the capture error wins if both fail.
    pub fn stop<C: Endpoint, R: Endpoint>(
        &self,
        capturer: &mut Capturer<C>,
        renderer: &mut Renderer<R>,
    ) -> Result<(), StreamError> {
        let captured = capturer.stop();
        let rendered = renderer.stop();
        let stats = self.bridge.stats();
        log::info!(
            "monitoring stopped: {} pushed, {} popped, {} underruns, peak depth {}",
            stats.pushed,
            stats.popped,
            stats.underruns,
            stats.peak_depth
        );
        self.bridge.clear();
        captured.and(rendered)
    }

    pub fn bridge(&self) -> &SampleBridge {
        &self.bridge
    }

    pub fn stats(&self) -> BridgeStats {
        self.bridge.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::ring_buffer::OverflowPolicy;
    use crate::models::format::{AudioFormat, SampleRepresentation};
    use crate::models::state::StreamStatus;
    use crate::virtual_device::VirtualEndpoint;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn engines(mic: VirtualEndpoint) -> (Capturer<VirtualEndpoint>, Renderer<VirtualEndpoint>) {
        let format = AudioFormat::new(1, 48000, SampleRepresentation::Float32);
        let speaker = VirtualEndpoint::render("speaker", format);
        let config = StreamConfiguration {
            prime_with_silence: false,
            ..Default::default()
        };
        let mut capturer = Capturer::new(mic);
        let mut renderer = Renderer::with_config(speaker, config);
        capturer.initialize(100).unwrap();
        renderer.initialize(16).unwrap();
        (capturer, renderer)
    }

    #[test]
    fn captured_samples_reach_the_renderer_in_order() {
        let format = AudioFormat::new(1, 48000, SampleRepresentation::Float32);
        let mic = VirtualEndpoint::capture("mic", format).with_signal(Arc::new(|n| ((n % 997) + 1) as f32 / 1000.0));
        let (mut capturer, mut renderer) = engines(mic);
        let probe = renderer.endpoint().probe();

        let monitor = Monitor::new(SampleBridge::new());
        monitor.start(&mut capturer, &mut renderer).unwrap();
        thread::sleep(Duration::from_millis(120));
        monitor.stop(&mut capturer, &mut renderer).unwrap();

        let stats = monitor.stats();
        assert!(stats.pushed > 0);
        assert!(monitor.bridge().is_empty());

        // Underruns render silence; everything else must be the captured
        // signal in order.
        let played: Vec<f32> = probe.rendered_samples().into_iter().filter(|&s| s != 0.0).collect();
        assert!(!played.is_empty());
        for (n, sample) in played.iter().enumerate() {
            assert_eq!(*sample, ((n as u64 % 997) + 1) as f32 / 1000.0);
        }
    }

    #[test]
    fn failed_capture_start_stops_renderer() {
        let format = AudioFormat::new(1, 48000, SampleRepresentation::Float32);
        let mut renderer = Renderer::new(VirtualEndpoint::render("speaker", format));
        renderer.initialize(16).unwrap();
        let mut capturer = Capturer::new(VirtualEndpoint::capture("mic", format));

        let monitor = Monitor::new(SampleBridge::bounded(4800));
        assert_eq!(monitor.start(&mut capturer, &mut renderer), Err(StreamError::NotInitialized));
        assert_eq!(renderer.status(), StreamStatus::Idle);
        assert_eq!(renderer.endpoint().probe().stops(), 1);
    }

    #[test]
    fn configured_bridge_capacity() {
        let growable = Monitor::with_config(&StreamConfiguration::default());
        assert_eq!(growable.bridge().policy(), OverflowPolicy::Grow);

        let config = StreamConfiguration {
            bridge_capacity: Some(960),
            ..Default::default()
        };
        let bounded = Monitor::with_config(&config);
        assert_eq!(bounded.bridge().policy(), OverflowPolicy::DropOldest);
    }
}
