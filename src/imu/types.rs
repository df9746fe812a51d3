//! IMU data types
//!
//! Uses nalgebra types since these records carry no autodiff requirements.

use nalgebra::Vector3;

use crate::time::Timestamp;

/// A single IMU measurement (gyroscope + accelerometer)
#[derive(Debug, Clone, Copy)]
pub struct ImuMeasurement {
    /// Timestamp in nanoseconds on the shared sensor clock
    pub timestamp: Timestamp,
    /// Angular velocity from gyroscope (rad/s) in body frame
    pub gyro: Vector3<f64>,
    /// Linear acceleration from accelerometer (m/s²) in body frame
    pub accel: Vector3<f64>,
}

impl ImuMeasurement {
    /// Create a new IMU measurement
    pub fn new(timestamp: Timestamp, gyro: Vector3<f64>, accel: Vector3<f64>) -> Self {
        Self {
            timestamp,
            gyro,
            accel,
        }
    }

    /// Scalar angular-rate magnitude `‖ω‖` in rad/s
    pub fn gyro_magnitude(&self) -> f64 {
        self.gyro.norm()
    }
}
