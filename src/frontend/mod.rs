//! Interfaces to the vision frontend.
//!
//! The calibration core never touches image data. It sees opaque per-frame
//! handles and asks a tracker for the relative rotation between two of them;
//! everything else about the frontend stays on the other side of the
//! [`RelativeRotationSource`] trait.

use nalgebra::UnitQuaternion;

use crate::time::Timestamp;

/// Outcome of geometric outlier rejection on a frame pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    /// Enough inliers; the relative rotation is usable
    Valid,
    /// Feature motion too small to constrain the rotation
    LowDisparity,
    /// Too few correspondences survived matching
    FewMatches,
    /// Estimation failed outright; the frame-to-frame chain is broken
    Invalid,
    /// Geometric verification is turned off for this run
    Disabled,
}

/// Per-frame output of the vision frontend, as seen by the calibration core
///
/// `frame_id` is the handle through which a tracker re-derives image
/// features for the frame; the core only compares timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutput {
    /// Identifier the tracker can resolve back to the full frame
    pub frame_id: u64,
    /// Capture time in nanoseconds
    pub timestamp: Timestamp,
}

impl FrameOutput {
    /// Create a new frame handle
    pub fn new(frame_id: u64, timestamp: Timestamp) -> Self {
        Self {
            frame_id,
            timestamp,
        }
    }
}

/// Provider of relative rotations between two frames
///
/// One synchronous query per aligner call; the implementation typically runs
/// 5-point RANSAC over feature correspondences. Takes `&mut self` so test
/// doubles can replay a script.
pub trait RelativeRotationSource {
    /// Rotation taking `prev`'s camera pose to `curr`'s, with the tracking
    /// verdict that qualifies it
    fn relative_rotation(
        &mut self,
        prev: &FrameOutput,
        curr: &FrameOutput,
    ) -> (TrackingStatus, UnitQuaternion<f64>);
}

/// Angular magnitude `‖log(R)‖` of a relative rotation, in radians
///
/// A non-finite angle degrades to zero, the same treatment as a frame with
/// no usable motion signal.
pub fn rotation_angle(rotation: &UnitQuaternion<f64>) -> f64 {
    let angle = rotation.angle();
    if angle.is_finite() {
        angle
    } else {
        0.0
    }
}
