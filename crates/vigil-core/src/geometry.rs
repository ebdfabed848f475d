//! Landmark geometry primitives: aspect ratios over facial contour points.
//!
//! All inputs are raw pixel coordinates from the 68-point landmark scheme.
//! Ratios are scale-sensitive but translation-invariant, so they work at any
//! face position in the frame without normalisation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of contour points the mouth aspect ratio requires (indices 48–67
/// of the 68-point scheme, re-based to 0).
pub const MOUTH_CONTOUR_POINTS: usize = 20;

/// A 2-D landmark point in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("mouth contour too short: {got} points (need {MOUTH_CONTOUR_POINTS})")]
    ShortMouthContour { got: usize },
}

/// Euclidean distance between two landmark points.
pub fn distance(a: Point, b: Point) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dx * dx + dy * dy).sqrt()
}

/// Eye aspect ratio over the canonical 6-point eye contour.
///
/// Vertical openings ‖p1−p5‖ and ‖p2−p4‖ averaged against the horizontal
/// width ‖p0−p3‖. Low values mean the eyelid is closed.
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> f32 {
    let a = distance(eye[1], eye[5]);
    let b = distance(eye[2], eye[4]);
    let c = distance(eye[0], eye[3]);
    (a + b) / (2.0 * c)
}

/// Mouth aspect ratio over the 20-point mouth contour.
///
/// Three upper-to-lower lip gaps (13–19, 14–18, 15–17) against the
/// corner-to-corner width (12–16). High values mean the mouth is open.
/// A substituted landmark model must re-map indices to preserve the same
/// geometric meaning.
pub fn mouth_aspect_ratio(mouth: &[Point]) -> Result<f32, GeometryError> {
    if mouth.len() < MOUTH_CONTOUR_POINTS {
        return Err(GeometryError::ShortMouthContour { got: mouth.len() });
    }

    let a = distance(mouth[13], mouth[19]);
    let b = distance(mouth[14], mouth[18]);
    let c = distance(mouth[15], mouth[17]);
    let d = distance(mouth[12], mouth[16]);

    Ok((a + b + c) / (3.0 * d))
}
