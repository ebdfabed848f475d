//! Head motion history and static-presentation heuristics.
//!
//! A printed photograph held in front of the camera produces a near-frozen
//! head reference point across consecutive frames, and a replayed screen
//! produces unnaturally uniform micro-motion. Both are detectable from a
//! short window of nose positions without any extra inference.
//!
//! The photo and screen flags, and the head-movement flag, are one-way
//! latches: set by their detector, cleared only by a session reset. Later
//! favourable observations never clear them.

use std::collections::VecDeque;

/// Maximum retained head-position samples (ring-buffer semantics).
pub const MOTION_HISTORY_CAPACITY: usize = 10;
/// Single-step |dx| or |dy| above which deliberate head movement is assumed.
pub const MOVEMENT_THRESHOLD: f32 = 5.0;
/// Average per-step |dx|+|dy| below which the presentation reads as a
/// static print.
pub const PHOTO_MOTION_FLOOR: f32 = 0.1;
/// Mean per-step Euclidean displacement below which the presentation reads
/// as a replayed screen.
pub const SCREEN_VARIATION_FLOOR: f32 = 0.05;

const MIN_SAMPLES_FOR_MOVEMENT: usize = 3;
const MIN_SAMPLES_FOR_PHOTO: usize = 5;
const MIN_SAMPLES_FOR_SCREEN: usize = 8;

/// One head reference-point observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub x: f32,
    pub y: f32,
    pub timestamp_ms: u64,
}

/// Bounded history of head positions with derived motion statistics.
#[derive(Debug, Clone)]
pub struct MotionTracker {
    movement_threshold: f32,
    photo_floor: f32,
    screen_floor: f32,
    samples: VecDeque<MotionSample>,
    movement_detected: bool,
    photo_flagged: bool,
    screen_flagged: bool,
    average_movement: Option<f32>,
    movement_variation: Option<f32>,
}

impl MotionTracker {
    pub fn new(movement_threshold: f32, photo_floor: f32, screen_floor: f32) -> Self {
        Self {
            movement_threshold,
            photo_floor,
            screen_floor,
            samples: VecDeque::with_capacity(MOTION_HISTORY_CAPACITY + 1),
            movement_detected: false,
            photo_flagged: false,
            screen_flagged: false,
            average_movement: None,
            movement_variation: None,
        }
    }

    /// Append one head-position sample and refresh statistics and flags.
    pub fn update(&mut self, sample: MotionSample) {
        self.samples.push_back(sample);
        if self.samples.len() > MOTION_HISTORY_CAPACITY {
            self.samples.pop_front();
        }

        if self.samples.len() >= MIN_SAMPLES_FOR_MOVEMENT {
            let mut total = 0.0f32;
            let mut pairs = 0usize;
            for (prev, curr) in self.samples.iter().zip(self.samples.iter().skip(1)) {
                let dx = (curr.x - prev.x).abs();
                let dy = (curr.y - prev.y).abs();
                if dx > self.movement_threshold || dy > self.movement_threshold {
                    self.movement_detected = true;
                }
                total += dx + dy;
                pairs += 1;
            }

            let average = total / pairs as f32;
            self.average_movement = Some(average);
            if average < self.photo_floor && self.samples.len() >= MIN_SAMPLES_FOR_PHOTO {
                self.photo_flagged = true;
            }
        }

        if self.samples.len() >= MIN_SAMPLES_FOR_SCREEN {
            let mut total = 0.0f32;
            let mut pairs = 0usize;
            for (prev, curr) in self.samples.iter().zip(self.samples.iter().skip(1)) {
                let dx = curr.x - prev.x;
                let dy = curr.y - prev.y;
                total += (dx * dx + dy * dy).sqrt();
                pairs += 1;
            }

            let variation = total / pairs as f32;
            self.movement_variation = Some(variation);
            if variation < self.screen_floor {
                self.screen_flagged = true;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sticky: deliberate head movement seen at least once this session.
    pub fn movement_detected(&self) -> bool {
        self.movement_detected
    }

    /// Sticky: static-print presentation flagged this session.
    pub fn photo_flagged(&self) -> bool {
        self.photo_flagged
    }

    /// Sticky: screen-replay presentation flagged this session.
    pub fn screen_flagged(&self) -> bool {
        self.screen_flagged
    }

    /// Mean per-step |dx|+|dy|, once at least 3 samples are present.
    pub fn average_movement(&self) -> Option<f32> {
        self.average_movement
    }

    /// Mean per-step Euclidean displacement, once at least 8 samples are
    /// present.
    pub fn movement_variation(&self) -> Option<f32> {
        self.movement_variation
    }
}

impl Default for MotionTracker {
    fn default() -> Self {
        Self::new(MOVEMENT_THRESHOLD, PHOTO_MOTION_FLOOR, SCREEN_VARIATION_FLOOR)
    }
}

/// Sliding window of expression-probability vectors.
///
/// The derived variation metric (mean per-class variance across the window)
/// is advisory: a perfectly flat expression stream is a weak replay signal,
/// but it raises no flag on its own.
#[derive(Debug, Clone, Default)]
pub struct ExpressionWindow {
    frames: VecDeque<Vec<f32>>,
}

impl ExpressionWindow {
    /// Append one frame's expression probabilities. Empty vectors are
    /// skipped so detectors without expression output degrade cleanly.
    pub fn update(&mut self, probabilities: &[f32]) {
        if probabilities.is_empty() {
            return;
        }
        self.frames.push_back(probabilities.to_vec());
        if self.frames.len() > MOTION_HISTORY_CAPACITY {
            self.frames.pop_front();
        }
    }

    /// Mean per-class variance across the window. `None` until two frames
    /// with expression output have been seen.
    pub fn variation(&self) -> Option<f32> {
        if self.frames.len() < 2 {
            return None;
        }
        let classes = self.frames.iter().map(Vec::len).min()?;
        if classes == 0 {
            return None;
        }

        let n = self.frames.len() as f32;
        let mut total = 0.0f32;
        for class in 0..classes {
            let mean = self.frames.iter().map(|f| f[class]).sum::<f32>() / n;
            let var = self
                .frames
                .iter()
                .map(|f| (f[class] - mean).powi(2))
                .sum::<f32>()
                / n;
            total += var;
        }
        Some(total / classes as f32)
    }
}
