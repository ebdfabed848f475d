use std::sync::Arc;
use tokio::sync::Mutex;
use zbus::interface;

use serde::Deserialize;
use vigil_core::FrameObservations;

use crate::config::Config;
use crate::engine::{EngineError, EngineHandle};
use crate::limiter::AttemptLimiter;
use crate::store::{AttendanceStore, StoreError};

/// Shared state accessible by D-Bus method handlers.
pub struct AppState {
    pub config: Config,
    pub engine: EngineHandle,
    pub store: AttendanceStore,
    pub limiter: AttemptLimiter,
    /// Whether the shared detector model directory verified at startup.
    pub detector_provisioned: bool,
}

/// D-Bus interface for the Vigil attendance daemon.
///
/// Bus name: org.freedesktop.Vigil1
/// Object path: /org/freedesktop/Vigil1
pub struct VigilService {
    pub state: Arc<Mutex<AppState>>,
}

/// Wire shape of one observation submission from a capture agent. The epoch
/// echoes the value returned by `BeginCheck`/`Reset`, so detections captured
/// before a reset are recognised as stale and discarded.
#[derive(Deserialize)]
struct FramePayload {
    epoch: u64,
    frame: FrameObservations,
}

fn rejection_slug(err: &EngineError) -> Option<&'static str> {
    match err {
        EngineError::StaleEpoch { .. } => Some("stale_epoch"),
        EngineError::LateFrame { .. } => Some("late_frame"),
        EngineError::ChannelClosed => None,
    }
}

#[interface(name = "org.freedesktop.Vigil1")]
impl VigilService {
    /// Begin a fresh verification attempt. Returns the new session epoch
    /// that capture agents must tag their submissions with.
    async fn begin_check(&self) -> zbus::fdo::Result<u64> {
        tracing::info!("begin_check requested");
        let engine = self.state.lock().await.engine.clone();
        engine
            .reset()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Feed one frame of detector observations (JSON payload with `epoch`
    /// and `frame`). Returns `{accepted, snapshot}` or
    /// `{accepted: false, reason}` for stale or late submissions.
    async fn process_frame(&self, payload: &str) -> zbus::fdo::Result<String> {
        let payload: FramePayload = serde_json::from_str(payload).map_err(|e| {
            zbus::fdo::Error::InvalidArgs(format!("malformed observation payload: {e}"))
        })?;

        let engine = self.state.lock().await.engine.clone();
        match engine.process(payload.epoch, payload.frame).await {
            Ok(snapshot) => Ok(serde_json::json!({
                "accepted": true,
                "snapshot": snapshot,
            })
            .to_string()),
            Err(err) => match rejection_slug(&err) {
                Some(reason) => Ok(serde_json::json!({
                    "accepted": false,
                    "reason": reason,
                    "detail": err.to_string(),
                })
                .to_string()),
                None => {
                    tracing::error!(error = %err, "process_frame failed");
                    Err(zbus::fdo::Error::Failed(err.to_string()))
                }
            },
        }
    }

    /// Current session epoch and snapshot as JSON, without mutating state.
    async fn snapshot(&self) -> zbus::fdo::Result<String> {
        let engine = self.state.lock().await.engine.clone();
        let (epoch, snapshot) = engine
            .snapshot()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Ok(serde_json::json!({
            "epoch": epoch,
            "snapshot": snapshot,
        })
        .to_string())
    }

    /// Reset all session state. Returns the new epoch.
    async fn reset(&self) -> zbus::fdo::Result<u64> {
        tracing::info!("reset requested");
        let engine = self.state.lock().await.engine.clone();
        engine
            .reset()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Return daemon status information as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let (engine, detector_provisioned, frame_interval_ms, record_count) = {
            let state = self.state.lock().await;
            (
                state.engine.clone(),
                state.detector_provisioned,
                state.config.frame_interval_ms,
                state.store.count_all().await.unwrap_or(0),
            )
        };
        let (epoch, snapshot) = engine
            .snapshot()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;

        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "detector_provisioned": detector_provisioned,
            "frame_interval_ms": frame_interval_ms,
            "attendance_records": record_count,
            "session_epoch": epoch,
            "session_status": snapshot.status,
        })
        .to_string())
    }

    /// Mark attendance for a student, gated on the current session's
    /// liveness verdict. The decision uses the daemon's own session state;
    /// nothing score-like is accepted from the caller.
    async fn mark_attendance(&self, subject: &str, student: &str) -> zbus::fdo::Result<String> {
        tracing::info!(subject, student, "mark_attendance requested");

        // --- Attempt limit check ---
        {
            let mut state = self.state.lock().await;
            if let Err(message) = state.limiter.check(student) {
                tracing::warn!(student, "mark_attendance: attempt limited");
                return Ok(serde_json::json!({
                    "status": "rate_limited",
                    "message": message,
                })
                .to_string());
            }
        }

        // --- Fetch snapshot and config (no lock held across the engine) ---
        let (engine, store, min_anti_spoofing, min_real_person) = {
            let state = self.state.lock().await;
            (
                state.engine.clone(),
                state.store.clone(),
                state.config.min_anti_spoofing_score,
                state.config.min_real_person_score,
            )
        };
        let (_, snapshot) = engine
            .snapshot()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;

        // --- Liveness gates (in rejection-priority order) ---
        if snapshot.spoofing_detected {
            tracing::warn!(subject, student, "mark_attendance: spoofing flagged");
            self.state.lock().await.limiter.record_failure(student);
            return Ok(serde_json::json!({
                "status": "spoofing_detected",
                "message": "Spoofing detected - attendance blocked",
            })
            .to_string());
        }
        if snapshot.anti_spoofing_score < min_anti_spoofing {
            tracing::warn!(
                subject,
                student,
                score = snapshot.anti_spoofing_score,
                "mark_attendance: below anti-spoofing floor"
            );
            self.state.lock().await.limiter.record_failure(student);
            return Ok(serde_json::json!({
                "status": "low_anti_spoofing",
                "message": "Insufficient anti-spoofing verification",
            })
            .to_string());
        }
        if !snapshot.is_active || snapshot.real_person_score < min_real_person {
            tracing::warn!(
                subject,
                student,
                status = ?snapshot.status,
                real_person = snapshot.real_person_score,
                "mark_attendance: liveness incomplete"
            );
            self.state.lock().await.limiter.record_failure(student);
            return Ok(serde_json::json!({
                "status": "not_live",
                "message": "Liveness verification incomplete",
            })
            .to_string());
        }

        // --- Record, with the evidence the decision was made on ---
        let reason = format!(
            "Liveness score: {:.0}% | Anti-spoofing: {:.0}%",
            snapshot.liveness_score, snapshot.anti_spoofing_score
        );
        let result = store
            .mark(
                subject,
                student,
                snapshot.liveness_score as f64,
                snapshot.anti_spoofing_score as f64,
                snapshot.real_person_score as f64,
                &reason,
            )
            .await;

        match result {
            Ok(record_id) => {
                self.state.lock().await.limiter.record_success(student);
                tracing::info!(
                    subject,
                    student,
                    record_id = %record_id,
                    liveness = snapshot.liveness_score,
                    "attendance marked"
                );
                Ok(serde_json::json!({
                    "status": "marked",
                    "record_id": record_id,
                    "liveness_score": snapshot.liveness_score,
                    "anti_spoofing_score": snapshot.anti_spoofing_score,
                    "message": format!("Attendance marked for {student}"),
                })
                .to_string())
            }
            Err(StoreError::AlreadyMarked { .. }) => {
                // Not a gate failure: no limiter increment
                tracing::info!(subject, student, "mark_attendance: already marked today");
                Ok(serde_json::json!({
                    "status": "already_marked",
                    "message": format!("Attendance already marked for {student} today"),
                })
                .to_string())
            }
            Err(err) => {
                tracing::error!(error = %err, "mark_attendance: store insert failed");
                Err(zbus::fdo::Error::Failed(err.to_string()))
            }
        }
    }

    /// List attendance records for a subject as JSON.
    async fn list_attendance(&self, subject: &str) -> zbus::fdo::Result<String> {
        tracing::info!(subject, "list_attendance requested");
        let store = self.state.lock().await.store.clone();
        let records = store
            .list_by_subject(subject)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        serde_json::to_string(&records).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }
}
