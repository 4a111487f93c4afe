//! Background sampling of the arm's pose and motion state
//!
//! [`KinematicMonitor`] polls the pose on its own thread at a fixed period,
//! derives speed and acceleration by finite differences and classifies the
//! motion. The latest sample is kept as a last-write-wins snapshot and
//! optionally published on the [`EventBus`]. Controllers only ever observe
//! snapshots; they never ask the arm whether it has arrived.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use hardware::{Pose6, PoseSource, RobotError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{EventBus, KinematicConfig, MotionError, StopSignal};

/// Discrete motion classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KinematicState {
    Stationary,
    Accelerating,
    Decelerating,
    Moving,
    /// Fewer than two consecutive good readings, so no velocity yet
    Unknown,
    /// Pose read failed
    Error,
}

/// One kinematic sample
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicSnapshot {
    /// Increments with every sample
    pub sequence: u64,
    /// Last successfully read pose
    pub pose: Option<Pose6>,
    /// mm/s
    pub speed: f64,
    /// mm/s^2
    pub acceleration: f64,
    pub state: KinematicState,
}

impl Default for KinematicSnapshot {
    fn default() -> Self {
        Self {
            sequence: 0,
            pose: None,
            speed: 0.0,
            acceleration: 0.0,
            state: KinematicState::Error,
        }
    }
}

impl KinematicSnapshot {
    pub fn is_stationary(&self) -> bool {
        self.state == KinematicState::Stationary
    }

    /// Stationary with the pose within `tolerance_mm` of `target`.
    pub fn is_settled_at(&self, target: &Pose6, tolerance_mm: f64) -> bool {
        self.is_stationary()
            && self
                .pose
                .is_some_and(|p| p.distance_to(target) <= tolerance_mm)
    }
}

/// Finite-difference speed/acceleration estimator.
#[derive(Debug, Clone)]
pub struct KinematicEstimator {
    config: KinematicConfig,
    previous: Option<(Pose6, f64)>,
    last_pose: Option<Pose6>,
    sequence: u64,
}

impl KinematicEstimator {
    pub fn new(config: KinematicConfig) -> Self {
        Self {
            config,
            previous: None,
            last_pose: None,
            sequence: 0,
        }
    }

    /// Fold in one pose reading taken `dt` seconds after the previous one.
    pub fn update(&mut self, reading: Result<Pose6, RobotError>, dt: f64) -> KinematicSnapshot {
        self.sequence += 1;

        let pose = match reading {
            Ok(pose) => pose,
            Err(e) => {
                debug!("Pose read failed: {e}");
                // Restart differencing once reads recover
                self.previous = None;
                return KinematicSnapshot {
                    sequence: self.sequence,
                    pose: self.last_pose,
                    speed: 0.0,
                    acceleration: 0.0,
                    state: KinematicState::Error,
                };
            }
        };

        let previous = self.previous;
        self.last_pose = Some(pose);

        let Some((prev_pose, prev_speed)) = previous else {
            self.previous = Some((pose, 0.0));
            return KinematicSnapshot {
                sequence: self.sequence,
                pose: Some(pose),
                speed: 0.0,
                acceleration: 0.0,
                state: KinematicState::Unknown,
            };
        };

        let (speed, acceleration) = if dt > 0.0 {
            let speed = pose.distance_to(&prev_pose) / dt;
            (speed, (speed - prev_speed) / dt)
        } else {
            (prev_speed, 0.0)
        };
        self.previous = Some((pose, speed));

        KinematicSnapshot {
            sequence: self.sequence,
            pose: Some(pose),
            speed,
            acceleration,
            state: self.classify(speed, acceleration),
        }
    }

    fn classify(&self, speed: f64, acceleration: f64) -> KinematicState {
        if speed < self.config.stationary_speed_mm_s {
            KinematicState::Stationary
        } else if acceleration > self.config.acceleration_threshold_mm_s2 {
            KinematicState::Accelerating
        } else if acceleration < -self.config.acceleration_threshold_mm_s2 {
            KinematicState::Decelerating
        } else {
            KinematicState::Moving
        }
    }
}

/// Pose sampler running on a dedicated thread.
pub struct KinematicMonitor {
    latest: Arc<Mutex<KinematicSnapshot>>,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl KinematicMonitor {
    /// Start sampling `source` every `config.sample_period()`.
    pub fn spawn(
        source: Arc<dyn PoseSource>,
        config: KinematicConfig,
        events: Option<Arc<EventBus>>,
    ) -> Self {
        let latest = Arc::new(Mutex::new(KinematicSnapshot::default()));
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let period = config.sample_period();

        let shared = latest.clone();
        let handle = thread::spawn(move || {
            let mut estimator = KinematicEstimator::new(config);
            let mut last = Instant::now();
            let mut was_error = false;

            loop {
                let now = Instant::now();
                let dt = now.duration_since(last).as_secs_f64();
                last = now;

                let snapshot = estimator.update(source.read_pose(), dt);
                let is_error = snapshot.state == KinematicState::Error;
                if is_error && !was_error {
                    warn!("Kinematic monitor lost pose readings");
                } else if !is_error && was_error {
                    info!("Kinematic monitor pose readings recovered");
                }
                was_error = is_error;

                if let Some(bus) = &events {
                    bus.publish_kinematics(&snapshot);
                }
                *shared.lock().unwrap() = snapshot;

                match shutdown_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("Kinematic monitor stopped");
        });

        info!("Kinematic monitor started ({:?} period)", period);
        Self {
            latest,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Most recent sample.
    pub fn latest(&self) -> KinematicSnapshot {
        self.latest.lock().unwrap().clone()
    }

    /// Poll snapshots until `predicate` holds.
    ///
    /// Fails with [`MotionError::StationaryTimeout`] after `timeout` and with
    /// [`MotionError::Aborted`] as soon as `stop` is requested.
    pub fn wait_until(
        &self,
        predicate: impl Fn(&KinematicSnapshot) -> bool,
        timeout: Duration,
        poll: Duration,
        stop: &StopSignal,
    ) -> Result<KinematicSnapshot, MotionError> {
        let start = Instant::now();
        loop {
            if stop.is_requested() {
                return Err(MotionError::Aborted);
            }
            let snapshot = self.latest();
            if predicate(&snapshot) {
                return Ok(snapshot);
            }
            if start.elapsed() >= timeout {
                warn!(
                    "Timed out after {:?} waiting for the robot (last state {:?})",
                    timeout, snapshot.state
                );
                return Err(MotionError::StationaryTimeout { timeout });
            }
            thread::sleep(poll);
        }
    }

    /// Wait for a sample taken after this call showing the arm at rest
    /// within `tolerance_mm` of `target`.
    pub fn wait_settled_at(
        &self,
        target: &Pose6,
        tolerance_mm: f64,
        timeout: Duration,
        poll: Duration,
        stop: &StopSignal,
    ) -> Result<KinematicSnapshot, MotionError> {
        let after = self.latest().sequence;
        self.wait_until(
            |s| s.sequence > after && s.is_settled_at(target, tolerance_mm),
            timeout,
            poll,
            stop,
        )
    }

    /// Stop the sampling thread and wait for it to exit.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for KinematicMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
