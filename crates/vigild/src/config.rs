use std::path::PathBuf;
use vigil_core::Tuning;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite attendance database.
    pub db_path: PathBuf,
    /// Directory holding the detector models capture agents load.
    pub model_dir: PathBuf,
    /// Cadence (ms) capture agents are asked to post observations at.
    pub frame_interval_ms: u64,
    /// Observations older than this many ms are dropped as stale.
    pub max_frame_age_ms: u64,
    /// Server-side anti-spoofing floor for attendance marking.
    pub min_anti_spoofing_score: f32,
    /// Server-side real-person floor for attendance marking.
    pub min_real_person_score: f32,
    /// Core detection thresholds, individually overridable.
    pub tuning: Tuning,
    /// Whether the daemon runs on the session bus (development mode).
    pub session_bus: bool,
}

impl Config {
    /// Load configuration from `VIGIL_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("vigil");

        let db_path = std::env::var("VIGIL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("attendance.db"));

        let defaults = Tuning::default();
        let tuning = Tuning {
            eye_ar_threshold: env_f32("VIGIL_EYE_AR_THRESHOLD", defaults.eye_ar_threshold),
            mouth_ar_threshold: env_f32("VIGIL_MOUTH_AR_THRESHOLD", defaults.mouth_ar_threshold),
            movement_threshold: env_f32("VIGIL_MOVEMENT_THRESHOLD", defaults.movement_threshold),
            ..defaults
        };

        Self {
            db_path,
            model_dir: vigil_models::default_model_dir(),
            frame_interval_ms: env_u64("VIGIL_FRAME_INTERVAL_MS", 500),
            max_frame_age_ms: env_u64("VIGIL_MAX_FRAME_AGE_MS", 1500),
            min_anti_spoofing_score: env_f32("VIGIL_MIN_ANTI_SPOOFING", 60.0),
            min_real_person_score: env_f32("VIGIL_MIN_REAL_PERSON", 70.0),
            tuning,
            session_bus: std::env::var("VIGIL_SESSION_BUS").is_ok(),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
