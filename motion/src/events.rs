//! Topics consumed by presentation collaborators
//!
//! Nothing published here feeds back into control; subscribers only observe.

use std::sync::Mutex;

use cell_math::Homography;
use hardware::Pose6;
use nalgebra::Point2;
use shared::event_bus::{Subscription, Topic};

use crate::KinematicSnapshot;

const TOPIC_CAPACITY: usize = 64;

/// Robot tool position projected into camera pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryPoint {
    pub sequence: u64,
    pub pose: Pose6,
    pub pixel: Point2<f64>,
}

/// Cell-wide topics, constructed once and passed to the components that publish.
pub struct EventBus {
    kinematics: Topic<KinematicSnapshot>,
    trajectory: Topic<TrajectoryPoint>,
    glue_type: Topic<String>,
    robot_to_camera: Mutex<Option<Homography>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            kinematics: Topic::new("kinematics", TOPIC_CAPACITY),
            trajectory: Topic::new("trajectory", TOPIC_CAPACITY),
            glue_type: Topic::new("glue_type", TOPIC_CAPACITY),
            robot_to_camera: Mutex::new(None),
        }
    }

    /// Enable trajectory projection with the camera-to-robot homography.
    pub fn set_homography(&self, camera_to_robot: Option<&Homography>) {
        *self.robot_to_camera.lock().unwrap() = camera_to_robot.map(Homography::inverse);
    }

    pub fn subscribe_kinematics(&self) -> Subscription<KinematicSnapshot> {
        self.kinematics.subscribe()
    }

    pub fn subscribe_trajectory(&self) -> Subscription<TrajectoryPoint> {
        self.trajectory.subscribe()
    }

    pub fn subscribe_glue_type(&self) -> Subscription<String> {
        self.glue_type.subscribe()
    }

    /// Publish a kinematic sample and, once calibrated, its projected position.
    pub fn publish_kinematics(&self, snapshot: &KinematicSnapshot) {
        self.kinematics.publish(snapshot.clone());

        let Some(pose) = snapshot.pose else {
            return;
        };
        let projected = self
            .robot_to_camera
            .lock()
            .unwrap()
            .as_ref()
            .map(|h| h.apply_point(Point2::new(pose.x, pose.y)));
        if let Some(pixel) = projected {
            if pixel.x.is_finite() && pixel.y.is_finite() {
                self.trajectory.publish(TrajectoryPoint {
                    sequence: snapshot.sequence,
                    pose,
                    pixel,
                });
            }
        }
    }

    pub fn publish_glue_type(&self, glue_type: &str) {
        self.glue_type.publish(glue_type.to_string());
    }
}
