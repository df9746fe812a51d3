//! Inertial measurement types consumed by the temporal calibration core.
//!
//! The core only reads the gyroscope channel; accelerometer samples are
//! carried along because the driver delivers both in one record.

pub mod types;

pub use types::ImuMeasurement;
