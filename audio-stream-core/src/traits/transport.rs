use crate::models::error::StreamError;

/// A hardware-filled capture region.
///
/// Borrowed for the duration of one acquire/release pair and must not be
/// retained past release.
#[derive(Debug, Clone, Copy)]
pub struct CapturePacket<'a> {
    pub data: &'a [u8],
    pub frames: u32,
    /// Set by the hardware when the region does not hold real samples.
    pub silent: bool,
}

/// Release flag for a written render region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFlags {
    Data,
    /// Hardware plays silence regardless of the region's contents.
    Silent,
}

/// Capture side of a hardware stream.
pub trait CaptureTransport: Send {
    /// Frames in the next queued packet, 0 when nothing is queued.
    fn next_packet_frames(&mut self) -> Result<u32, StreamError>;

    /// Acquire the next packet, hand it to `read`, then release it.
    ///
    /// Returns the number of frames released.
    fn read_packet(&mut self, read: &mut dyn FnMut(CapturePacket<'_>)) -> Result<u32, StreamError>;
}

/// Render side of a hardware stream.
pub trait RenderTransport: Send {
    /// Size of the hardware buffer in frames.
    fn buffer_frames(&self) -> u32;

    /// Frames queued for playback and not yet consumed by the device.
    fn current_padding(&mut self) -> Result<u32, StreamError>;

    /// Acquire `frames` frames, let `fill` write them, then release with
    /// the flag `fill` returns.
    fn write_frames(
        &mut self,
        frames: u32,
        fill: &mut dyn FnMut(&mut [u8]) -> RenderFlags,
    ) -> Result<(), StreamError>;

    /// Frames the hardware can accept right now.
    fn available_frames(&mut self) -> Result<u32, StreamError> {
        let padding = self.current_padding()?;
        Ok(self.buffer_frames().saturating_sub(padding))
    }
}
