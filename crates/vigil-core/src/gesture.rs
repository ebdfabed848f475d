//! Temporal gesture detectors: debounced blink and mouth-open trackers.
//!
//! Both detectors convert a noisy per-frame aspect ratio into a discrete
//! signal by requiring the threshold condition to hold for a run of
//! consecutive frames before latching. The latch only clears after an
//! equally long run of the opposite condition, so a single borderline frame
//! never produces a spurious event.

/// Eye aspect ratio below which the eye counts as closed.
pub const EYE_AR_THRESHOLD: f32 = 0.25;
/// Consecutive frames required to latch (and unlatch) an eye closure.
pub const EYE_AR_CONSEC_FRAMES: u32 = 3;

/// Mouth aspect ratio above which the mouth counts as open.
pub const MOUTH_AR_THRESHOLD: f32 = 0.35;
/// Consecutive frames required to latch (and unlatch) a mouth opening.
pub const MOUTH_AR_CONSEC_FRAMES: u32 = 5;

/// Blink detector with a lifetime blink counter.
///
/// A blink registers exactly once per closure on the rising edge (the frame
/// the closed-run reaches the consecutive-frame requirement), regardless of
/// how long the eyes stay closed afterwards. The next blink cannot register
/// until the eyes have been confirmed open again.
#[derive(Debug, Clone)]
pub struct BlinkDetector {
    threshold: f32,
    consec_frames: u32,
    closed_run: u32,
    open_run: u32,
    closed_latched: bool,
    blinks: u32,
}

impl BlinkDetector {
    pub fn new(threshold: f32, consec_frames: u32) -> Self {
        Self {
            threshold,
            consec_frames,
            closed_run: 0,
            open_run: 0,
            closed_latched: false,
            blinks: 0,
        }
    }

    /// Feed one frame's eye aspect ratio. Returns true when this frame
    /// registered a new blink.
    pub fn update(&mut self, ear: f32) -> bool {
        if ear < self.threshold {
            self.closed_run += 1;
            self.open_run = 0;
        } else {
            self.closed_run = 0;
            self.open_run += 1;
        }

        let mut registered = false;
        if self.closed_run >= self.consec_frames && !self.closed_latched {
            self.blinks += 1;
            self.closed_latched = true;
            registered = true;
        }
        if self.open_run >= self.consec_frames && self.closed_latched {
            self.closed_latched = false;
        }
        registered
    }

    /// Lifetime blink count for this session.
    pub fn count(&self) -> u32 {
        self.blinks
    }

    /// Whether a closure is currently latched (eyes counted as closed).
    pub fn eyes_closed(&self) -> bool {
        self.closed_latched
    }
}

impl Default for BlinkDetector {
    fn default() -> Self {
        Self::new(EYE_AR_THRESHOLD, EYE_AR_CONSEC_FRAMES)
    }
}

/// Mouth-open detector.
///
/// Symmetric to [`BlinkDetector`] with the threshold direction inverted
/// (ratio above threshold means open) and a longer debounce run. Tracks only
/// whether a mouth opening is currently latched; there is no lifetime count.
#[derive(Debug, Clone)]
pub struct MouthDetector {
    threshold: f32,
    consec_frames: u32,
    open_run: u32,
    closed_run: u32,
    open_latched: bool,
}

impl MouthDetector {
    pub fn new(threshold: f32, consec_frames: u32) -> Self {
        Self {
            threshold,
            consec_frames,
            open_run: 0,
            closed_run: 0,
            open_latched: false,
        }
    }

    /// Feed one frame's mouth aspect ratio.
    pub fn update(&mut self, mar: f32) {
        if mar > self.threshold {
            self.open_run += 1;
            self.closed_run = 0;
        } else {
            self.open_run = 0;
            self.closed_run += 1;
        }

        if self.open_run >= self.consec_frames && !self.open_latched {
            self.open_latched = true;
        }
        if self.closed_run >= self.consec_frames && self.open_latched {
            self.open_latched = false;
        }
    }

    /// Whether a mouth opening is currently latched.
    pub fn mouth_open(&self) -> bool {
        self.open_latched
    }
}

impl Default for MouthDetector {
    fn default() -> Self {
        Self::new(MOUTH_AR_THRESHOLD, MOUTH_AR_CONSEC_FRAMES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLOSED: f32 = 0.10;
    const OPEN_EYE: f32 = 0.40;

    #[test]
    fn short_closure_counts_one_blink() {
        let mut blink = BlinkDetector::default();
        for _ in 0..3 {
            blink.update(CLOSED);
        }
        assert_eq!(blink.count(), 1);
        assert!(blink.eyes_closed());
    }

    #[test]
    fn long_closure_still_counts_one_blink() {
        let mut blink = BlinkDetector::default();
        for _ in 0..30 {
            blink.update(CLOSED);
        }
        assert_eq!(blink.count(), 1);
    }

    #[test]
    fn two_frame_closure_is_ignored() {
        let mut blink = BlinkDetector::default();
        blink.update(CLOSED);
        blink.update(CLOSED);
        blink.update(OPEN_EYE);
        assert_eq!(blink.count(), 0);
        assert!(!blink.eyes_closed());
    }

    #[test]
    fn reblink_requires_confirmed_open() {
        let mut blink = BlinkDetector::default();
        for _ in 0..3 {
            blink.update(CLOSED);
        }
        assert_eq!(blink.count(), 1);

        // Only two open frames: not confirmed open, second closure must not count
        blink.update(OPEN_EYE);
        blink.update(OPEN_EYE);
        for _ in 0..4 {
            blink.update(CLOSED);
        }
        assert_eq!(blink.count(), 1);

        // Confirmed open, then a fresh closure counts
        for _ in 0..3 {
            blink.update(OPEN_EYE);
        }
        for _ in 0..3 {
            blink.update(CLOSED);
        }
        assert_eq!(blink.count(), 2);
    }

    #[test]
    fn update_reports_rising_edge_once() {
        let mut blink = BlinkDetector::default();
        assert!(!blink.update(CLOSED));
        assert!(!blink.update(CLOSED));
        assert!(blink.update(CLOSED));
        assert!(!blink.update(CLOSED));
    }

    #[test]
    fn mouth_latches_after_five_open_frames() {
        let mut mouth = MouthDetector::default();
        for _ in 0..4 {
            mouth.update(0.6);
        }
        assert!(!mouth.mouth_open());
        mouth.update(0.6);
        assert!(mouth.mouth_open());
    }

    #[test]
    fn mouth_unlatches_after_five_closed_frames() {
        let mut mouth = MouthDetector::default();
        for _ in 0..5 {
            mouth.update(0.6);
        }
        assert!(mouth.mouth_open());

        for _ in 0..4 {
            mouth.update(0.1);
        }
        assert!(mouth.mouth_open());
        mouth.update(0.1);
        assert!(!mouth.mouth_open());
    }

    #[test]
    fn mouth_debounce_resets_on_interruption() {
        let mut mouth = MouthDetector::default();
        for _ in 0..4 {
            mouth.update(0.6);
        }
        mouth.update(0.1);
        for _ in 0..4 {
            mouth.update(0.6);
        }
        assert!(!mouth.mouth_open());
    }
}
