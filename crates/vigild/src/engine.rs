use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use vigil_core::{FrameObservations, LivenessSession, Snapshot, Tuning};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("observation epoch {got} is stale (session epoch {current})")]
    StaleEpoch { got: u64, current: u64 },
    #[error("frame is {age_ms}ms old (limit {limit_ms}ms)")]
    LateFrame { age_ms: u64, limit_ms: u64 },
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Process {
        epoch: u64,
        frame: FrameObservations,
        reply: oneshot::Sender<Result<Snapshot, EngineError>>,
    },
    Snapshot {
        reply: oneshot::Sender<(u64, Snapshot)>,
    },
    Reset {
        reply: oneshot::Sender<u64>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Submit one frame of observations captured under `epoch`.
    pub async fn process(
        &self,
        epoch: u64,
        frame: FrameObservations,
    ) -> Result<Snapshot, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Process {
                epoch,
                frame,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Current epoch and snapshot, without mutating anything.
    pub async fn snapshot(&self) -> Result<(u64, Snapshot), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Reinitialize the session. Returns the new epoch.
    pub async fn reset(&self) -> Result<u64, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Reset { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the session engine on a dedicated OS thread.
///
/// The single thread serializes every request, so no two frame invocations
/// ever overlap and the session needs no locking. Observations carrying a
/// stale epoch (captured before a reset) or an expired timestamp are
/// rejected before they touch session state.
pub fn spawn_engine(tuning: Tuning, max_frame_age_ms: u64) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);

    std::thread::Builder::new()
        .name("vigil-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            let mut session = LivenessSession::with_tuning(tuning);

            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Process {
                        epoch,
                        frame,
                        reply,
                    } => {
                        let result = run_process(&mut session, epoch, &frame, max_frame_age_ms);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Snapshot { reply } => {
                        let _ = reply.send((session.epoch(), session.snapshot()));
                    }
                    EngineRequest::Reset { reply } => {
                        let epoch = session.reset();
                        tracing::info!(epoch, "session reset");
                        let _ = reply.send(epoch);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}

fn run_process(
    session: &mut LivenessSession,
    epoch: u64,
    frame: &FrameObservations,
    max_frame_age_ms: u64,
) -> Result<Snapshot, EngineError> {
    let current = session.epoch();
    if epoch != current {
        tracing::debug!(got = epoch, current, "discarding stale-epoch observation");
        return Err(EngineError::StaleEpoch {
            got: epoch,
            current,
        });
    }

    let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let age_ms = now_ms.saturating_sub(frame.timestamp_ms);
    if age_ms > max_frame_age_ms {
        tracing::debug!(age_ms, limit_ms = max_frame_age_ms, "dropping late frame");
        return Err(EngineError::LateFrame {
            age_ms,
            limit_ms: max_frame_age_ms,
        });
    }

    let snapshot = session.process(frame);
    tracing::debug!(
        status = ?snapshot.status,
        blinks = snapshot.eye_blink_count,
        liveness = snapshot.liveness_score,
        anti_spoofing = snapshot.anti_spoofing_score,
        "frame processed"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{FaceObservation, Point, Status};

    fn now_ms() -> u64 {
        chrono::Utc::now().timestamp_millis() as u64
    }

    fn closed_eye_face() -> FaceObservation {
        let eye = [
            Point::new(0.0, 0.0),
            Point::new(0.3, -0.05),
            Point::new(0.7, -0.05),
            Point::new(1.0, 0.0),
            Point::new(0.7, 0.05),
            Point::new(0.3, 0.05),
        ];
        let mut mouth = vec![Point::new(0.0, 0.0); 20];
        mouth[16] = Point::new(1.0, 0.0);
        for (upper, lower, x) in [(13usize, 19usize, 0.25f32), (14, 18, 0.5), (15, 17, 0.75)] {
            mouth[upper] = Point::new(x, -0.05);
            mouth[lower] = Point::new(x, 0.05);
        }
        FaceObservation {
            left_eye: eye,
            right_eye: eye,
            mouth,
            nose: vec![Point::new(320.0, 240.0)],
            expressions: vec![],
        }
    }

    #[tokio::test]
    async fn fresh_engine_reports_pending() {
        let engine = spawn_engine(Tuning::default(), 1500);
        let (epoch, snapshot) = engine.snapshot().await.unwrap();
        assert_eq!(epoch, 0);
        assert_eq!(snapshot.status, Status::Pending);
    }

    #[tokio::test]
    async fn process_advances_session_state() {
        let engine = spawn_engine(Tuning::default(), 5000);
        let mut snapshot = None;
        for _ in 0..3 {
            let frame = FrameObservations {
                timestamp_ms: now_ms(),
                faces: vec![closed_eye_face()],
            };
            snapshot = Some(engine.process(0, frame).await.unwrap());
        }
        assert_eq!(snapshot.unwrap().eye_blink_count, 1);
    }

    #[tokio::test]
    async fn stale_epoch_is_rejected_without_mutation() {
        let engine = spawn_engine(Tuning::default(), 5000);
        let new_epoch = engine.reset().await.unwrap();
        assert_eq!(new_epoch, 1);

        let frame = FrameObservations {
            timestamp_ms: now_ms(),
            faces: vec![closed_eye_face()],
        };
        let err = engine.process(0, frame).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::StaleEpoch { got: 0, current: 1 }
        ));

        let (_, snapshot) = engine.snapshot().await.unwrap();
        assert_eq!(snapshot.status, Status::Pending);
    }

    #[tokio::test]
    async fn late_frame_is_dropped() {
        let engine = spawn_engine(Tuning::default(), 1000);
        let frame = FrameObservations {
            timestamp_ms: now_ms().saturating_sub(10_000),
            faces: vec![closed_eye_face()],
        };
        let err = engine.process(0, frame).await.unwrap_err();
        assert!(matches!(err, EngineError::LateFrame { .. }));
    }
}
