//! Detection backend abstraction and the in-process evaluator facade.
//!
//! The session never talks to a camera or a model directly; it consumes
//! per-frame [`FrameObservations`]. A backend implements [`FaceDetector`] to
//! produce those observations from raw frames, which keeps the pipeline
//! testable against synthetic landmark scripts and lets deployments swap the
//! landmark model without touching the evaluation logic.

use thiserror::Error;

use crate::session::{FaceObservation, FrameObservations, LivenessSession, Snapshot, Tuning};

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("detector backend unavailable: {0}")]
    Unavailable(String),
    #[error("detection failed: {0}")]
    Inference(String),
}

/// A captured video frame handed to the detection backend.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: u64,
}

/// Capability interface over the external face/landmark detector.
pub trait FaceDetector {
    /// Detect zero or more faces with landmark contours in the frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceObservation>, DetectorError>;
}

/// Couples a detection backend to a session for in-process embedders.
///
/// `process_frame` runs the full per-frame pipeline and never returns an
/// error: backend faults map to the session's fail-closed `error` snapshot,
/// so a host loop can poll it on a timer without any error plumbing.
pub struct LivenessEvaluator<D: FaceDetector> {
    detector: D,
    session: LivenessSession,
}

impl<D: FaceDetector> LivenessEvaluator<D> {
    pub fn new(detector: D) -> Self {
        Self::with_tuning(detector, Tuning::default())
    }

    pub fn with_tuning(detector: D, tuning: Tuning) -> Self {
        Self {
            detector,
            session: LivenessSession::with_tuning(tuning),
        }
    }

    /// Detect faces in the frame and advance the session one step.
    pub fn process_frame(&mut self, frame: &Frame) -> Snapshot {
        match self.detector.detect(frame) {
            Ok(faces) => self.session.process(&FrameObservations {
                timestamp_ms: frame.timestamp_ms,
                faces,
            }),
            Err(_) => self.session.fault(),
        }
    }

    /// Reinitialize the session. Returns the new epoch.
    pub fn reset(&mut self) -> u64 {
        self.session.reset()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.session.snapshot()
    }

    pub fn session(&self) -> &LivenessSession {
        &self.session
    }
}
