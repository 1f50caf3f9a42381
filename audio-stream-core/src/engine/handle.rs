use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::time::Duration;

use crate::models::error::StreamError;
use crate::models::recording::CapturedRecording;

pub(crate) type RecordingSender = SyncSender<Result<CapturedRecording, StreamError>>;

type RecordingReceiver = Receiver<Result<CapturedRecording, StreamError>>;

#[derive(Debug)]
enum Slot {
    Pending(RecordingReceiver),
    Rejected,
    Taken,
}

/// Promise for the recording produced by `Capturer::start_recording`.
///
/// Resolves once the capture loop exits, i.e. after `Capturer::stop` or a
/// transport failure. A handle returned while the capturer was already
/// running is rejected and resolves to `StreamError::AlreadyRunning`.
/// Once a result has been taken, later polls report `InvalidState`.
#[derive(Debug)]
pub struct RecordingHandle {
    slot: Slot,
}

impl RecordingHandle {
    pub(crate) fn channel() -> (RecordingSender, Self) {
        let (sender, receiver) = mpsc::sync_channel(1);
        (
            sender,
            Self {
                slot: Slot::Pending(receiver),
            },
        )
    }

    pub(crate) fn rejected() -> Self {
        Self { slot: Slot::Rejected }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.slot, Slot::Rejected)
    }

    /// Block until the recording is available.
    pub fn wait(self) -> Result<CapturedRecording, StreamError> {
        match self.slot {
            Slot::Pending(receiver) => receiver.recv().unwrap_or_else(|_| Err(abandoned())),
            Slot::Rejected => Err(StreamError::AlreadyRunning),
            Slot::Taken => Err(already_taken()),
        }
    }

    /// Block for at most `timeout`. Returns None if the recording is still
    /// in progress.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<CapturedRecording, StreamError>> {
        let result = match &self.slot {
            Slot::Pending(receiver) => match receiver.recv_timeout(timeout) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => Err(abandoned()),
            },
            Slot::Rejected => return Some(Err(StreamError::AlreadyRunning)),
            Slot::Taken => return Some(Err(already_taken())),
        };
        self.slot = Slot::Taken;
        Some(result)
    }

    /// Non-blocking poll.
    pub fn try_take(&mut self) -> Option<Result<CapturedRecording, StreamError>> {
        let result = match &self.slot {
            Slot::Pending(receiver) => match receiver.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => Err(abandoned()),
            },
            Slot::Rejected => return Some(Err(StreamError::AlreadyRunning)),
            Slot::Taken => return Some(Err(already_taken())),
        };
        self.slot = Slot::Taken;
        Some(result)
    }
}

fn already_taken() -> StreamError {
    StreamError::InvalidState("recording already taken".into())
}

fn abandoned() -> StreamError {
    StreamError::Transport("capture loop ended without producing a recording".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::AudioFormat;

    #[test]
    fn rejected_handle_reports_already_running() {
        let mut handle = RecordingHandle::rejected();
        assert!(handle.is_rejected());
        assert_eq!(handle.try_take(), Some(Err(StreamError::AlreadyRunning)));
        assert_eq!(handle.wait(), Err(StreamError::AlreadyRunning));
    }

    #[test]
    fn pending_then_resolved() {
        let (sender, mut handle) = RecordingHandle::channel();
        assert!(handle.try_take().is_none());
        assert!(handle.wait_timeout(Duration::from_millis(5)).is_none());

        let recording = CapturedRecording::new(AudioFormat::float_stereo(48000), chrono::Utc::now(), vec![0.0; 4]);
        sender.send(Ok(recording.clone())).unwrap();
        assert_eq!(handle.wait().unwrap(), recording);
    }

    #[test]
    fn taken_recording_is_not_reported_twice() {
        let (sender, mut handle) = RecordingHandle::channel();
        let recording = CapturedRecording::new(AudioFormat::float_stereo(48000), chrono::Utc::now(), vec![0.0; 4]);
        sender.send(Ok(recording.clone())).unwrap();
        drop(sender);

        assert_eq!(handle.try_take(), Some(Ok(recording)));
        assert!(matches!(handle.try_take(), Some(Err(StreamError::InvalidState(_)))));
        assert!(matches!(
            handle.wait_timeout(Duration::from_millis(5)),
            Some(Err(StreamError::InvalidState(_)))
        ));
        assert!(!handle.is_rejected());
        assert!(matches!(handle.wait(), Err(StreamError::InvalidState(_))));
    }

    #[test]
    fn dropped_sender_resolves_to_error() {
        let (sender, handle) = RecordingHandle::channel();
        drop(sender);
        assert!(matches!(handle.wait(), Err(StreamError::Transport(_))));
    }
}
