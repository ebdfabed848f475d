//! Per-stream verification session.
//!
//! The session owns every piece of cross-frame state (gesture detectors,
//! motion history, spoof latches) and runs the per-frame pipeline: landmarks
//! to ratios, ratios to gesture state, nose position to motion statistics,
//! everything to scores and a discrete status. One `process` call per frame,
//! one snapshot out, no other entry point mutates state.
//!
//! `reset` reinitializes the whole session and bumps a monotonically
//! increasing epoch. Callers that submit observations asynchronously tag
//! them with the epoch they were captured under so results from before a
//! reset can be recognised and discarded.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{self, GeometryError, Point};
use crate::gesture::{self, BlinkDetector, MouthDetector};
use crate::motion::{self, ExpressionWindow, MotionSample, MotionTracker};
use crate::score::{self, SignalSummary, Status};

/// Tunable detection thresholds.
///
/// Defaults assume a typical webcam capture; coordinates are raw landmark
/// pixels with no normalisation by face size or resolution.
#[derive(Debug, Clone)]
pub struct Tuning {
    pub eye_ar_threshold: f32,
    pub eye_consec_frames: u32,
    pub mouth_ar_threshold: f32,
    pub mouth_consec_frames: u32,
    pub movement_threshold: f32,
    pub photo_motion_floor: f32,
    pub screen_variation_floor: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            eye_ar_threshold: gesture::EYE_AR_THRESHOLD,
            eye_consec_frames: gesture::EYE_AR_CONSEC_FRAMES,
            mouth_ar_threshold: gesture::MOUTH_AR_THRESHOLD,
            mouth_consec_frames: gesture::MOUTH_AR_CONSEC_FRAMES,
            movement_threshold: motion::MOVEMENT_THRESHOLD,
            photo_motion_floor: motion::PHOTO_MOTION_FLOOR,
            screen_variation_floor: motion::SCREEN_VARIATION_FLOOR,
        }
    }
}

/// One face observation from the external landmark detector.
///
/// Eye contours are exactly 6 ordered points each; the mouth contour carries
/// the 20-point mouth region of the 68-point scheme; the nose holds at least
/// the tip. Expression probabilities are optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceObservation {
    pub left_eye: [Point; 6],
    pub right_eye: [Point; 6],
    pub mouth: Vec<Point>,
    pub nose: Vec<Point>,
    #[serde(default)]
    pub expressions: Vec<f32>,
}

/// Everything the detector returned for one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameObservations {
    pub timestamp_ms: u64,
    pub faces: Vec<FaceObservation>,
}

#[derive(Error, Debug)]
pub enum LivenessError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("degenerate landmark geometry (non-finite aspect ratio)")]
    DegenerateGeometry,
}

/// Result of one processed frame. Field names serialize in camelCase: this
/// is the wire record downstream consumers render and gate on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub status: Status,
    pub eye_blink_count: u32,
    /// 0 or 1: whether a mouth opening is currently latched.
    pub mouth_movements: u8,
    pub head_movement_detected: bool,
    pub anti_spoofing_score: f32,
    pub liveness_score: f32,
    /// The final conjunctive verdict.
    pub is_active: bool,
    /// Transient latch state: eyes currently counted as closed.
    pub blink_detected: bool,
    pub mouth_open_detected: bool,
    pub spoofing_detected: bool,
    pub real_person_score: f32,
    pub photo_spoofing_detected: bool,
    pub screen_spoofing_detected: bool,
    /// Advisory expression-diversity metric; raises no flag.
    pub expression_variation: Option<f32>,
}

impl Snapshot {
    /// Creation-time snapshot: nothing observed, full anti-spoofing
    /// allowance, no liveness evidence.
    pub fn pending() -> Self {
        Self {
            status: Status::Pending,
            eye_blink_count: 0,
            mouth_movements: 0,
            head_movement_detected: false,
            anti_spoofing_score: 100.0,
            liveness_score: 0.0,
            is_active: false,
            blink_detected: false,
            mouth_open_detected: false,
            spoofing_detected: false,
            real_person_score: 0.0,
            photo_spoofing_detected: false,
            screen_spoofing_detected: false,
            expression_variation: None,
        }
    }
}

/// Owns all per-session detector state; one instance per camera stream.
#[derive(Debug, Clone)]
pub struct LivenessSession {
    tuning: Tuning,
    blink: BlinkDetector,
    mouth: MouthDetector,
    motion: MotionTracker,
    expressions: ExpressionWindow,
    epoch: u64,
    last: Snapshot,
}

impl LivenessSession {
    pub fn new() -> Self {
        Self::with_tuning(Tuning::default())
    }

    pub fn with_tuning(tuning: Tuning) -> Self {
        let (blink, mouth, motion) = components(&tuning);
        Self {
            tuning,
            blink,
            mouth,
            motion,
            expressions: ExpressionWindow::default(),
            epoch: 0,
            last: Snapshot::pending(),
        }
    }

    /// Current session epoch; bumped on every reset.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Snapshot as of the last processed frame (pending if none).
    pub fn snapshot(&self) -> Snapshot {
        self.last.clone()
    }

    /// Reinitialize all counters, histories, and latches. Returns the new
    /// epoch.
    pub fn reset(&mut self) -> u64 {
        let (blink, mouth, motion) = components(&self.tuning);
        self.blink = blink;
        self.mouth = mouth;
        self.motion = motion;
        self.expressions = ExpressionWindow::default();
        self.last = Snapshot::pending();
        self.epoch += 1;
        self.epoch
    }

    /// Run the per-frame pipeline over one frame's detections.
    ///
    /// Never panics and never returns an error: input-absence cases resolve
    /// to their own statuses without touching detector state, and processing
    /// faults resolve to a fail-closed `error` snapshot.
    pub fn process(&mut self, frame: &FrameObservations) -> Snapshot {
        match frame.faces.as_slice() {
            [] => self.off_frame(Status::NoFace),
            [face] => match self.process_face(face, frame.timestamp_ms) {
                Ok(snapshot) => snapshot,
                Err(_) => self.fault(),
            },
            _ => self.off_frame(Status::MultipleFaces),
        }
    }

    /// Fail-closed snapshot for a processing fault: unknown errors count as
    /// spoofing. Detector state stays as of the last completed update.
    pub fn fault(&mut self) -> Snapshot {
        let snapshot = Snapshot {
            status: Status::Error,
            is_active: false,
            spoofing_detected: true,
            ..self.last.clone()
        };
        self.last = snapshot.clone();
        snapshot
    }

    /// Input-absence snapshot: current counters, no verdict, no mutation.
    fn off_frame(&mut self, status: Status) -> Snapshot {
        let snapshot = Snapshot {
            status,
            is_active: false,
            ..self.last.clone()
        };
        self.last = snapshot.clone();
        snapshot
    }

    fn process_face(
        &mut self,
        face: &FaceObservation,
        timestamp_ms: u64,
    ) -> Result<Snapshot, LivenessError> {
        let left = geometry::eye_aspect_ratio(&face.left_eye);
        let right = geometry::eye_aspect_ratio(&face.right_eye);
        let ear = (left + right) / 2.0;
        let mar = geometry::mouth_aspect_ratio(&face.mouth)?;
        if !ear.is_finite() || !mar.is_finite() {
            return Err(LivenessError::DegenerateGeometry);
        }

        self.blink.update(ear);
        self.mouth.update(mar);

        if let Some(nose) = face.nose.first() {
            self.motion.update(MotionSample {
                x: nose.x,
                y: nose.y,
                timestamp_ms,
            });
        }
        self.expressions.update(&face.expressions);

        let signals = SignalSummary {
            blink_count: self.blink.count(),
            mouth_open: self.mouth.mouth_open(),
            head_movement: self.motion.movement_detected(),
            photo_flagged: self.motion.photo_flagged(),
            screen_flagged: self.motion.screen_flagged(),
            movement_variation: self.motion.movement_variation(),
        };
        let anti_spoofing = score::anti_spoofing_score(&signals);
        let liveness = score::liveness_score(&signals, anti_spoofing);
        let real_person = score::real_person_score(&signals, anti_spoofing);
        let verdict = score::is_live(&signals, liveness, anti_spoofing);
        let status = score::resolve_status(&signals, anti_spoofing, verdict);

        let snapshot = Snapshot {
            status,
            eye_blink_count: signals.blink_count,
            mouth_movements: signals.mouth_open as u8,
            head_movement_detected: signals.head_movement,
            anti_spoofing_score: anti_spoofing,
            liveness_score: liveness,
            is_active: verdict,
            blink_detected: self.blink.eyes_closed(),
            mouth_open_detected: signals.mouth_open,
            spoofing_detected: signals.photo_flagged || signals.screen_flagged,
            real_person_score: real_person,
            photo_spoofing_detected: signals.photo_flagged,
            screen_spoofing_detected: signals.screen_flagged,
            expression_variation: self.expressions.variation(),
        };
        self.last = snapshot.clone();
        Ok(snapshot)
    }
}

impl Default for LivenessSession {
    fn default() -> Self {
        Self::new()
    }
}

fn components(tuning: &Tuning) -> (BlinkDetector, MouthDetector, MotionTracker) {
    (
        BlinkDetector::new(tuning.eye_ar_threshold, tuning.eye_consec_frames),
        MouthDetector::new(tuning.mouth_ar_threshold, tuning.mouth_consec_frames),
        MotionTracker::new(
            tuning.movement_threshold,
            tuning.photo_motion_floor,
            tuning.screen_variation_floor,
        ),
    )
}
