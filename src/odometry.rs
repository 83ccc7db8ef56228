//! # Odometry
//!
//! Derives the rover's 2D trajectory from wheel-encoder distances and IMU
//! heading by differential-drive dead reckoning.
//!
//! Pure functions over store contents: the integrator holds no state and is
//! recomputed in full whenever a source channel changes. Text samples are
//! ignored, and only timestamps present in all three source channels
//! contribute.

use std::collections::{BTreeSet, HashMap};
use std::f64::consts::{PI, TAU};

use tracing::debug;

use crate::config::OdometryConfig;
use crate::store::{DataPoint, TelemetryStore};

/// Heading deltas below this are integrated as straight-line motion,
/// avoiding division by a near-zero turn angle in the arc branch
const STRAIGHT_MOTION_EPSILON: f64 = 1e-6;

/// One aligned odometry sample: both encoder distances and the heading at a
/// shared timestamp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Milliseconds since session start
    pub timestamp: u64,
    /// Cumulative left-wheel distance
    pub left_distance: f64,
    /// Cumulative right-wheel distance
    pub right_distance: f64,
    /// IMU heading in degrees
    pub heading_degrees: f64,
}

/// One integrated trajectory point in the body-fixed frame anchored at the
/// first aligned sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Milliseconds since session start
    pub timestamp: u64,
    pub x: f64,
    pub y: f64,
    /// IMU heading in degrees at this timestamp
    pub heading_degrees: f64,
}

/// Integrate a trajectory from the three odometry source series
///
/// Produces one `Position` per timestamp present in all three inputs, in
/// ascending order, anchored at the origin. Fewer than 2 aligned timestamps
/// means insufficient data and yields an empty trajectory; that is a
/// documented result, not an error.
pub fn integrate(left: &[DataPoint], right: &[DataPoint], heading: &[DataPoint]) -> Vec<Position> {
    let poses = align_poses(left, right, heading);
    if poses.len() < 2 {
        return Vec::new();
    }

    let mut positions = Vec::with_capacity(poses.len());
    let mut x = 0.0;
    let mut y = 0.0;

    let first = poses[0];
    let mut previous = first;
    positions.push(Position {
        timestamp: first.timestamp,
        x,
        y,
        heading_degrees: first.heading_degrees,
    });

    for pose in &poses[1..] {
        let left_delta = pose.left_distance - previous.left_distance;
        let right_delta = pose.right_distance - previous.right_distance;
        let average_distance = (left_delta + right_delta) / 2.0;

        let previous_heading = previous.heading_degrees.to_radians();
        let current_heading = pose.heading_degrees.to_radians();
        let delta_theta = normalize_angle(current_heading - previous_heading);

        if delta_theta.abs() < STRAIGHT_MOTION_EPSILON {
            x += average_distance * current_heading.cos();
            y += average_distance * current_heading.sin();
        } else {
            // Arc motion: the rover traveled along a circle of this radius
            let radius = average_distance / delta_theta;
            x += radius * (current_heading.sin() - previous_heading.sin());
            y += radius * (previous_heading.cos() - current_heading.cos());
        }

        positions.push(Position {
            timestamp: pose.timestamp,
            x,
            y,
            heading_degrees: pose.heading_degrees,
        });
        previous = *pose;
    }

    positions
}

/// Integrate the trajectory from a store using the configured channel names
///
/// Any source channel that is undeclared (or the alignment coming up short)
/// yields the empty trajectory.
pub fn trajectory(store: &TelemetryStore, channels: &OdometryConfig) -> Vec<Position> {
    let (left, right, heading) = match (
        store.points_for(&channels.left_channel),
        store.points_for(&channels.right_channel),
        store.points_for(&channels.heading_channel),
    ) {
        (Ok(left), Ok(right), Ok(heading)) => (left, right, heading),
        _ => {
            debug!(
                "odometry channels not all declared yet ({}, {}, {})",
                channels.left_channel, channels.right_channel, channels.heading_channel
            );
            return Vec::new();
        }
    };

    integrate(left, right, heading)
}

/// Keep the numeric samples of a series, keyed by timestamp
fn numeric_series(points: &[DataPoint]) -> HashMap<u64, f64> {
    points
        .iter()
        .filter_map(|point| point.value.as_number().map(|number| (point.timestamp, number)))
        .collect()
}

/// Align the three series on their shared timestamps, ascending
fn align_poses(left: &[DataPoint], right: &[DataPoint], heading: &[DataPoint]) -> Vec<Pose> {
    let left = numeric_series(left);
    let right = numeric_series(right);
    let heading = numeric_series(heading);

    let shared: BTreeSet<u64> = left
        .keys()
        .filter(|t| right.contains_key(t) && heading.contains_key(t))
        .copied()
        .collect();

    shared
        .into_iter()
        .map(|timestamp| Pose {
            timestamp,
            left_distance: left[&timestamp],
            right_distance: right[&timestamp],
            heading_degrees: heading[&timestamp],
        })
        .collect()
}

/// Normalize an angle in radians to the range (-pi, pi]
fn normalize_angle(radians: f64) -> f64 {
    let wrapped = radians.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}
