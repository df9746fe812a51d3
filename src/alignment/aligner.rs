//! Cross-correlation time alignment between camera and gyroscope streams.
//!
//! Consumes per-frame relative rotations from the vision tracker and the
//! inertial samples spanning each inter-frame interval, reconstructs the
//! rotation-magnitude signal of both streams on a common grid (either the
//! frame grid or the inertial grid), and once the window is full estimates
//! the stream offset as the correlation argmax converted back to seconds.
//!
//! Calibration is single-shot: after the first valid estimate the aligner
//! is inert and keeps reporting the emitted shift.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::cross_correlation::best_correlation_lag;
use super::ring_buffer::RingBuffer;
use crate::frontend::{rotation_angle, FrameOutput, RelativeRotationSource, TrackingStatus};
use crate::imu::ImuMeasurement;
use crate::time::{ns_to_s, Timestamp};

/// Options consumed once at aligner construction
#[derive(Debug, Clone)]
pub struct TimeAlignmentConfig {
    /// Accumulate one window sample per inertial measurement instead of one
    /// per frame
    pub imu_rate_estimation: bool,
    /// Capacity of the correlation window (both buffers)
    pub window_size: usize,
    /// Gyroscope white noise density (rad/s/√Hz), drives the variance gate
    pub gyro_noise_density: f64,
    /// Nominal period of the active sampling grid in seconds
    pub nominal_sampling_time_s: f64,
}

impl Default for TimeAlignmentConfig {
    fn default() -> Self {
        Self {
            imu_rate_estimation: false,
            window_size: 100,
            gyro_noise_density: 0.0,
            nominal_sampling_time_s: 0.005,
        }
    }
}

impl TimeAlignmentConfig {
    /// Check the invariants the aligner relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size < 2 {
            return Err(ConfigError::WindowTooSmall(self.window_size));
        }
        if !(self.nominal_sampling_time_s.is_finite() && self.nominal_sampling_time_s > 0.0) {
            return Err(ConfigError::InvalidSamplingPeriod(
                self.nominal_sampling_time_s,
            ));
        }
        if !(self.gyro_noise_density.is_finite() && self.gyro_noise_density >= 0.0) {
            return Err(ConfigError::InvalidNoiseDensity(self.gyro_noise_density));
        }
        Ok(())
    }
}

/// Rejected configuration values
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The window cannot hold a correlatable signal
    #[error("correlation window must hold at least two samples, got {0}")]
    WindowTooSmall(usize),
    /// The sampling period would break the lag-to-seconds conversion
    #[error("nominal sampling period must be positive and finite, got {0}")]
    InvalidSamplingPeriod(f64),
    /// The noise density would break the variance gate threshold
    #[error("gyro noise density must be finite and non-negative, got {0}")]
    InvalidNoiseDensity(f64),
}

/// Outcome of one [`TimeAligner::estimate_time_alignment`] call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAlignmentResult {
    /// Whether calibration has concluded and `imu_time_shift` is final
    pub valid: bool,
    /// Seconds to add to inertial timestamps before fusion
    pub imu_time_shift: f64,
}

impl TimeAlignmentResult {
    fn not_ready() -> Self {
        Self {
            valid: false,
            imu_time_shift: 0.0,
        }
    }

    fn aligned(imu_time_shift: f64) -> Self {
        Self {
            valid: true,
            imu_time_shift,
        }
    }
}

/// Externally observable phase of the aligner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignerState {
    /// No reference frame cached yet
    AwaitInitial,
    /// Accumulating samples; the window is not full
    Warming,
    /// Window full; waiting for the variance gate to open
    Ready,
    /// An estimate has been emitted; the aligner is inert
    Done,
}

/// One entry of the correlation window
#[derive(Debug, Clone, Copy)]
struct SignalSample {
    timestamp: Timestamp,
    value: f64,
}

/// Online estimator of the camera/IMU time offset
///
/// Feed it once per frame via [`estimate_time_alignment`]; it reports
/// `valid = false` while warming up or gated out, and a final shift in
/// seconds once the correlation window carries enough signal.
///
/// [`estimate_time_alignment`]: TimeAligner::estimate_time_alignment
#[derive(Debug)]
pub struct TimeAligner {
    imu_rate_estimation: bool,
    nominal_sampling_time_s: f64,
    /// Minimum inertial-signal variance, `(3σ)²` with `σ = noise / √Δt`
    variance_threshold: f64,
    vision_buffer: RingBuffer<SignalSample>,
    imu_buffer: RingBuffer<SignalSample>,
    prev_frame: Option<FrameOutput>,
    /// Rotation magnitude buffered for the previous frame, used as the left
    /// endpoint when interpolating vision values onto the inertial grid
    prev_vision_angle: f64,
    emitted_shift: Option<f64>,
}

impl TimeAligner {
    /// Create an aligner with validated options
    pub fn new(config: TimeAlignmentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let sigma = config.gyro_noise_density / config.nominal_sampling_time_s.sqrt();
        Ok(Self {
            imu_rate_estimation: config.imu_rate_estimation,
            nominal_sampling_time_s: config.nominal_sampling_time_s,
            variance_threshold: (3.0 * sigma).powi(2),
            vision_buffer: RingBuffer::new(config.window_size),
            imu_buffer: RingBuffer::new(config.window_size),
            prev_frame: None,
            prev_vision_angle: 0.0,
            emitted_shift: None,
        })
    }

    /// Current phase of the calibration state machine
    pub fn state(&self) -> AlignerState {
        if self.emitted_shift.is_some() {
            AlignerState::Done
        } else if self.prev_frame.is_none() {
            AlignerState::AwaitInitial
        } else if self.vision_buffer.is_full() && self.imu_buffer.is_full() {
            AlignerState::Ready
        } else {
            AlignerState::Warming
        }
    }

    /// Process one frame and the inertial samples since the previous one
    ///
    /// `imu` must cover the interval between the previous accepted frame and
    /// `frame`, with its first sample coincident with the previous frame.
    /// Frames must arrive in strictly increasing timestamp order.
    ///
    /// Returns `valid = false` while the estimate is not ready, and
    /// `valid = true` with the final shift (possibly zero, when there is
    /// nothing to calibrate against) once calibration has concluded.
    pub fn estimate_time_alignment(
        &mut self,
        tracker: &mut dyn RelativeRotationSource,
        frame: &FrameOutput,
        imu: &[ImuMeasurement],
    ) -> TimeAlignmentResult {
        if let Some(shift) = self.emitted_shift {
            return TimeAlignmentResult::aligned(shift);
        }

        let prev_frame = match self.prev_frame {
            None => {
                self.bootstrap(frame, imu);
                return TimeAlignmentResult::not_ready();
            }
            Some(prev) => prev,
        };

        let (status, rotation) = tracker.relative_rotation(&prev_frame, frame);
        let vision_angle = match status {
            TrackingStatus::Disabled => {
                warn!("geometric verification disabled, nothing to calibrate");
                return self.finish(0.0);
            }
            TrackingStatus::Invalid => {
                warn!(
                    frame_id = frame.frame_id,
                    "relative rotation chain broken, re-anchoring on current frame"
                );
                self.prev_frame = Some(*frame);
                self.prev_vision_angle = 0.0;
                return TimeAlignmentResult::aligned(0.0);
            }
            TrackingStatus::LowDisparity | TrackingStatus::FewMatches => 0.0,
            TrackingStatus::Valid => rotation_angle(&rotation),
        };

        let num_new = self.ingest(&prev_frame, frame, vision_angle, imu);
        self.prev_frame = Some(*frame);
        self.prev_vision_angle = vision_angle;
        debug_assert_eq!(self.vision_buffer.len(), self.imu_buffer.len());

        if num_new == 0 {
            warn!(
                frame_id = frame.frame_id,
                "no inertial samples since previous frame, nothing to calibrate"
            );
            return self.finish(0.0);
        }

        if !self.vision_buffer.is_full() || !self.imu_buffer.is_full() {
            return TimeAlignmentResult::not_ready();
        }

        let imu_values: Vec<f64> = self.imu_buffer.iter().map(|s| s.value).collect();
        let variance = population_variance(&imu_values);
        if variance < self.variance_threshold {
            debug!(
                variance,
                threshold = self.variance_threshold,
                "inertial variance below gate, deferring correlation"
            );
            return TimeAlignmentResult::not_ready();
        }

        let vision_values: Vec<f64> = self.vision_buffer.iter().map(|s| s.value).collect();
        let lag = best_correlation_lag(&vision_values, &imu_values, vision_values.len() - 1);
        let period_s = if self.imu_rate_estimation {
            self.nominal_sampling_time_s
        } else {
            self.mean_frame_period_s()
        };
        let imu_time_shift = lag as f64 * period_s;
        info!(
            lag,
            period_s, imu_time_shift, "estimated time shift between camera and IMU"
        );
        self.finish(imu_time_shift)
    }

    /// Latch the terminal state and report the final result
    fn finish(&mut self, imu_time_shift: f64) -> TimeAlignmentResult {
        self.emitted_shift = Some(imu_time_shift);
        TimeAlignmentResult::aligned(imu_time_shift)
    }

    /// Cache the first frame as the rotation anchor
    ///
    /// In inertial-rate mode the bootstrap batch also seeds the window so
    /// the first inter-frame interval continues an unbroken inertial grid;
    /// there is no motion estimate yet, so the vision side starts flat.
    fn bootstrap(&mut self, frame: &FrameOutput, imu: &[ImuMeasurement]) {
        if self.imu_rate_estimation {
            for m in imu {
                self.imu_buffer.push(SignalSample {
                    timestamp: m.timestamp,
                    value: m.gyro_magnitude(),
                });
                self.vision_buffer.push(SignalSample {
                    timestamp: m.timestamp,
                    value: 0.0,
                });
            }
        }
        self.prev_frame = Some(*frame);
        self.prev_vision_angle = 0.0;
    }

    /// Buffer this frame's signal samples; returns how many were added
    fn ingest(
        &mut self,
        prev_frame: &FrameOutput,
        frame: &FrameOutput,
        vision_angle: f64,
        imu: &[ImuMeasurement],
    ) -> usize {
        if self.imu_rate_estimation {
            self.ingest_imu_rate(prev_frame, frame, vision_angle, imu)
        } else {
            self.ingest_frame_rate(frame, vision_angle, imu)
        }
    }

    /// One paired sample per inertial measurement, vision interpolated onto
    /// the inertial grid
    fn ingest_imu_rate(
        &mut self,
        prev_frame: &FrameOutput,
        frame: &FrameOutput,
        vision_angle: f64,
        imu: &[ImuMeasurement],
    ) -> usize {
        if imu.len() < 2 {
            // the only sample (if any) coincides with the previous frame
            return 0;
        }
        let span = (frame.timestamp - prev_frame.timestamp) as f64;
        for m in &imu[1..] {
            let fraction = if span > 0.0 {
                (m.timestamp - prev_frame.timestamp) as f64 / span
            } else {
                1.0
            };
            let interpolated =
                self.prev_vision_angle + fraction * (vision_angle - self.prev_vision_angle);
            self.vision_buffer.push(SignalSample {
                timestamp: m.timestamp,
                value: interpolated,
            });
            self.imu_buffer.push(SignalSample {
                timestamp: m.timestamp,
                value: m.gyro_magnitude(),
            });
        }
        imu.len() - 1
    }

    /// One paired sample per frame: the rotation magnitude against the
    /// angular rate integrated over the interval and normalized by its
    /// duration
    fn ingest_frame_rate(
        &mut self,
        frame: &FrameOutput,
        vision_angle: f64,
        imu: &[ImuMeasurement],
    ) -> usize {
        let (first, last) = match (imu.first(), imu.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0,
        };
        let elapsed = ns_to_s(last.timestamp - first.timestamp);
        let value = if elapsed > 0.0 {
            let mut integrated = 0.0;
            for pair in imu.windows(2) {
                integrated += ns_to_s(pair[1].timestamp - pair[0].timestamp)
                    * pair[1].gyro_magnitude();
            }
            integrated / elapsed
        } else {
            first.gyro_magnitude()
        };
        self.imu_buffer.push(SignalSample {
            timestamp: frame.timestamp,
            value,
        });
        self.vision_buffer.push(SignalSample {
            timestamp: frame.timestamp,
            value: vision_angle,
        });
        1
    }

    /// Mean spacing of the buffered frame timestamps in seconds
    fn mean_frame_period_s(&self) -> f64 {
        let n = self.vision_buffer.len();
        let first = self.vision_buffer[0].timestamp;
        let last = self.vision_buffer[n - 1].timestamp;
        ns_to_s(last - first) / (n - 1) as f64
    }
}

fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}
