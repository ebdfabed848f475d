//! Score aggregation and verification status resolution.
//!
//! Three independently weighted 0–100 aggregates are computed over the same
//! detector signals: the anti-spoofing score (penalty-based), the liveness
//! score (gesture-based), and the real-person score (plausibility estimate).
//! The final verdict is a conjunction of hard gates, not a weighted sum, so
//! no single signal can be gamed into a pass.

use serde::Serialize;

/// Minimum liveness score for the final verdict.
pub const MIN_LIVENESS_SCORE: f32 = 80.0;
/// Minimum anti-spoofing score for the final verdict (and the `suspicious`
/// status floor).
pub const MIN_ANTI_SPOOFING_SCORE: f32 = 70.0;
/// Minimum lifetime blinks for the final verdict.
pub const MIN_BLINKS: u32 = 2;

/// Movement variation below this costs 30 anti-spoofing points.
const LOW_VARIATION_PENALTY_FLOOR: f32 = 0.1;
/// Movement variation below this costs a further 20 points (50 total).
const VERY_LOW_VARIATION_PENALTY_FLOOR: f32 = 0.05;

/// Detector outputs for one scoring pass, as of the frame just processed.
#[derive(Debug, Clone, Copy)]
pub struct SignalSummary {
    pub blink_count: u32,
    pub mouth_open: bool,
    pub head_movement: bool,
    pub photo_flagged: bool,
    pub screen_flagged: bool,
    pub movement_variation: Option<f32>,
}

/// Penalty-based spoofing confidence: 100 means no spoof evidence.
pub fn anti_spoofing_score(signals: &SignalSummary) -> f32 {
    let mut score: f32 = 100.0;
    if signals.photo_flagged {
        score -= 50.0;
    }
    if signals.screen_flagged {
        score -= 50.0;
    }
    if let Some(variation) = signals.movement_variation {
        if variation < LOW_VARIATION_PENALTY_FLOOR {
            score -= 30.0;
        }
        if variation < VERY_LOW_VARIATION_PENALTY_FLOOR {
            score -= 20.0;
        }
    }
    score.clamp(0.0, 100.0)
}

/// Gesture-weighted liveness confidence.
pub fn liveness_score(signals: &SignalSummary, anti_spoofing: f32) -> f32 {
    let mut score = (signals.blink_count as f32 * 20.0).min(40.0);
    if signals.mouth_open {
        score += 20.0;
    }
    if signals.head_movement {
        score += 20.0;
    }
    score += anti_spoofing * 0.2;
    score.clamp(0.0, 100.0)
}

/// Human-plausibility estimate over the same signals.
pub fn real_person_score(signals: &SignalSummary, anti_spoofing: f32) -> f32 {
    let mut score = 0.0;
    if signals.blink_count >= 2 {
        score += 40.0;
    }
    if signals.blink_count >= 3 {
        score += 10.0;
    }
    if signals.head_movement {
        score += 30.0;
    }
    if signals.mouth_open {
        score += 20.0;
    }
    score += anti_spoofing * 0.1;
    score.clamp(0.0, 100.0)
}

/// Final verdict: every gate must pass independently.
pub fn is_live(signals: &SignalSummary, liveness: f32, anti_spoofing: f32) -> bool {
    liveness >= MIN_LIVENESS_SCORE
        && signals.blink_count >= MIN_BLINKS
        && signals.head_movement
        && anti_spoofing >= MIN_ANTI_SPOOFING_SCORE
        && !signals.photo_flagged
        && !signals.screen_flagged
}

/// Discrete verification status. Serialized as snake_case strings on the
/// wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Session created, no frame processed yet.
    Pending,
    NoFace,
    MultipleFaces,
    /// Final verdict passed; the gated action may proceed.
    Active,
    PhotoDetected,
    ScreenDetected,
    NeedBlinks,
    NeedMovement,
    Suspicious,
    Inactive,
    /// Per-frame processing fault; treated as spoofing (fail closed).
    Error,
}

/// Priority cascade for a frame with exactly one face. Earlier conditions
/// preempt later ones even when several hold at once. Face-absence statuses
/// are resolved before this is reached.
pub fn resolve_status(signals: &SignalSummary, anti_spoofing: f32, verdict: bool) -> Status {
    if verdict {
        return Status::Active;
    }
    if signals.photo_flagged {
        return Status::PhotoDetected;
    }
    if signals.screen_flagged {
        return Status::ScreenDetected;
    }
    if signals.blink_count < MIN_BLINKS {
        return Status::NeedBlinks;
    }
    if !signals.head_movement {
        return Status::NeedMovement;
    }
    if anti_spoofing < MIN_ANTI_SPOOFING_SCORE {
        return Status::Suspicious;
    }
    Status::Inactive
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_signals() -> SignalSummary {
        SignalSummary {
            blink_count: 0,
            mouth_open: false,
            head_movement: false,
            photo_flagged: false,
            screen_flagged: false,
            movement_variation: None,
        }
    }

    #[test]
    fn anti_spoofing_starts_at_full_allowance() {
        assert_eq!(anti_spoofing_score(&clean_signals()), 100.0);
    }

    #[test]
    fn anti_spoofing_penalties_accumulate_and_clamp() {
        let mut signals = clean_signals();
        signals.photo_flagged = true;
        assert_eq!(anti_spoofing_score(&signals), 50.0);

        signals.screen_flagged = true;
        assert_eq!(anti_spoofing_score(&signals), 0.0);

        // Very low variation adds both penalties; already clamped at zero
        signals.movement_variation = Some(0.01);
        assert_eq!(anti_spoofing_score(&signals), 0.0);
    }

    #[test]
    fn anti_spoofing_variation_penalties_are_tiered() {
        let mut signals = clean_signals();
        signals.movement_variation = Some(0.07);
        assert_eq!(anti_spoofing_score(&signals), 70.0);

        signals.movement_variation = Some(0.03);
        assert_eq!(anti_spoofing_score(&signals), 50.0);

        signals.movement_variation = Some(0.5);
        assert_eq!(anti_spoofing_score(&signals), 100.0);
    }

    #[test]
    fn liveness_blink_contribution_caps_at_forty() {
        let mut signals = clean_signals();
        signals.blink_count = 5;
        // 40 (capped blinks) + 20 (anti * 0.2)
        assert_eq!(liveness_score(&signals, 100.0), 60.0);
    }

    #[test]
    fn liveness_full_signals_clamp_at_hundred() {
        let signals = SignalSummary {
            blink_count: 3,
            mouth_open: true,
            head_movement: true,
            photo_flagged: false,
            screen_flagged: false,
            movement_variation: Some(1.0),
        };
        assert_eq!(liveness_score(&signals, 100.0), 100.0);
    }

    #[test]
    fn real_person_score_weights() {
        let mut signals = clean_signals();
        signals.blink_count = 2;
        assert_eq!(real_person_score(&signals, 100.0), 50.0);

        signals.blink_count = 3;
        signals.head_movement = true;
        signals.mouth_open = true;
        // 40 + 10 + 30 + 20 + 10, clamped
        assert_eq!(real_person_score(&signals, 100.0), 100.0);
    }

    #[test]
    fn verdict_is_a_conjunction_not_a_score() {
        // High liveness score with a single blink must not pass
        let mut signals = clean_signals();
        signals.blink_count = 1;
        signals.head_movement = true;
        assert!(!is_live(&signals, 95.0, 100.0));

        signals.blink_count = 2;
        assert!(is_live(&signals, 95.0, 100.0));

        // Any raised spoof flag vetoes regardless of the scores
        signals.photo_flagged = true;
        assert!(!is_live(&signals, 95.0, 100.0));
    }

    #[test]
    fn verdict_requires_every_gate() {
        let passing = SignalSummary {
            blink_count: 2,
            mouth_open: true,
            head_movement: true,
            photo_flagged: false,
            screen_flagged: false,
            movement_variation: Some(1.0),
        };
        assert!(is_live(&passing, 85.0, 75.0));
        assert!(!is_live(&passing, 79.9, 75.0));
        assert!(!is_live(&passing, 85.0, 69.9));

        let mut no_movement = passing;
        no_movement.head_movement = false;
        assert!(!is_live(&no_movement, 85.0, 75.0));
    }

    #[test]
    fn status_cascade_prefers_spoof_flags() {
        // Photo flag and missing blinks both hold: photo wins
        let mut signals = clean_signals();
        signals.photo_flagged = true;
        assert_eq!(resolve_status(&signals, 50.0, false), Status::PhotoDetected);

        signals.photo_flagged = false;
        signals.screen_flagged = true;
        assert_eq!(resolve_status(&signals, 50.0, false), Status::ScreenDetected);
    }

    #[test]
    fn status_cascade_orders_remaining_conditions() {
        let mut signals = clean_signals();
        assert_eq!(resolve_status(&signals, 100.0, false), Status::NeedBlinks);

        signals.blink_count = 2;
        assert_eq!(resolve_status(&signals, 100.0, false), Status::NeedMovement);

        signals.head_movement = true;
        assert_eq!(resolve_status(&signals, 60.0, false), Status::Suspicious);
        assert_eq!(resolve_status(&signals, 100.0, false), Status::Inactive);
        assert_eq!(resolve_status(&signals, 100.0, true), Status::Active);
    }

    #[test]
    fn status_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&Status::MultipleFaces).unwrap(),
            "\"multiple_faces\""
        );
        assert_eq!(
            serde_json::to_string(&Status::PhotoDetected).unwrap(),
            "\"photo_detected\""
        );
        assert_eq!(serde_json::to_string(&Status::NoFace).unwrap(), "\"no_face\"");
    }
}
