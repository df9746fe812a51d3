//! Temporal calibration between a camera stream and an inertial stream.
//!
//! A visual-inertial estimator needs both sensor streams on one clock; an
//! unknown offset between image and IMU timestamps makes the rotational
//! signals lead or lag each other and biases the fused pose. This crate
//! estimates that offset online: it buffers per-frame relative-rotation
//! magnitudes from the vision tracker alongside gyroscope angular-rate
//! magnitudes, and once the window carries enough signal, cross-correlates
//! the two and converts the argmax lag into a shift on inertial timestamps.
//!
//! The estimation is single-shot: once a valid shift is emitted the aligner
//! stays inert and keeps reporting it.

pub mod alignment;
pub mod frontend;
pub mod imu;
pub mod simulation;
pub mod time;

// Re-export key types
pub use alignment::{
    best_correlation_lag, correlation_at, AlignerState, ConfigError, RingBuffer, TimeAligner,
    TimeAlignmentConfig, TimeAlignmentResult,
};
pub use frontend::{rotation_angle, FrameOutput, RelativeRotationSource, TrackingStatus};
pub use imu::ImuMeasurement;
pub use time::Timestamp;
