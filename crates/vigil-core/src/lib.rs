//! Per-frame liveness and anti-spoofing evaluation over facial landmarks.
//!
//! A photograph, a replayed screen, or a static prop in front of the camera
//! cannot blink on demand, open its mouth, or move its head with natural
//! micro-motion. This crate fuses those temporal signals (eye closure,
//! mouth movement, head displacement, motion entropy) into stateful
//! detectors, aggregates them into confidence scores, and resolves a
//! discrete verification status suitable for gating a security-relevant
//! action.
//!
//! The crate is pure and synchronous: it consumes per-frame landmark
//! observations produced by an external detector and performs no I/O, no
//! inference, and no clock reads. All cross-frame state lives in a
//! [`LivenessSession`]; one `process` call per frame yields one
//! [`Snapshot`].
//!
//! # Threat Coverage
//!
//! - **Blocks:** printed photographs and static props (frozen head
//!   position), low-end screen replays (unnaturally uniform micro-motion),
//!   and presentations that never produce debounced blinks.
//! - **Does not block:** high-quality video replays with natural gesture
//!   content, 3D masks, or adversarial displays. The evaluator is a
//!   lightweight gate, not a substitute for image-level presentation-attack
//!   detection.

pub mod detector;
pub mod geometry;
pub mod gesture;
pub mod motion;
pub mod score;
pub mod session;

pub use detector::{DetectorError, FaceDetector, Frame, LivenessEvaluator};
pub use geometry::{distance, eye_aspect_ratio, mouth_aspect_ratio, GeometryError, Point};
pub use gesture::{BlinkDetector, MouthDetector};
pub use motion::{ExpressionWindow, MotionSample, MotionTracker};
pub use score::Status;
pub use session::{
    FaceObservation, FrameObservations, LivenessError, LivenessSession, Snapshot, Tuning,
};
