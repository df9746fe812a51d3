//! Synthetic camera/IMU sequences for exercising the aligner.
//!
//! Builds a triangular rotation profile sampled at frame times, the matching
//! per-interval inertial batches on a finer grid, and optionally a known
//! injected delay between the two streams, so tests and demos can check the
//! recovered shift against ground truth.

use nalgebra::{UnitQuaternion, Vector3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::frontend::{FrameOutput, RelativeRotationSource, TrackingStatus};
use crate::imu::ImuMeasurement;
use crate::time::Timestamp;

/// Parameters of the synthetic rotation signal
#[derive(Debug, Clone)]
pub struct SyntheticSignalConfig {
    /// Number of frames after the bootstrap frame
    pub num_frames: usize,
    /// Inertial samples per inter-frame interval
    pub imu_per_frame: usize,
    /// Peak-slope scale of the triangular rotation profile (radians/frame)
    pub rotation_scale: f64,
    /// Inertial sampling period in seconds
    pub imu_period_s: f64,
    /// Injected offset of the inertial stream in samples; positive means the
    /// inertial timestamps run early relative to the frames
    pub delay_samples: i64,
}

impl Default for SyntheticSignalConfig {
    fn default() -> Self {
        Self {
            num_frames: 10,
            imu_per_frame: 5,
            rotation_scale: 0.1,
            imu_period_s: 1.0e-9,
            delay_samples: 0,
        }
    }
}

/// Dense signal on the inertial grid plus its frame-rate subsampling
struct Signal {
    vision_times: Vec<Timestamp>,
    vision_angles: Vec<f64>,
    imu_times: Vec<Timestamp>,
    imu_angles: Vec<f64>,
}

fn generate_signal(config: &SyntheticSignalConfig) -> Signal {
    let mut signal = Signal {
        vision_times: Vec::new(),
        vision_angles: Vec::new(),
        imu_times: Vec::new(),
        imu_angles: Vec::new(),
    };

    if config.delay_samples < 0 {
        for i in 0..config.delay_samples.unsigned_abs() {
            signal.imu_angles.push(0.0);
            signal.imu_times.push(i as Timestamp);
        }
    } else {
        signal.imu_angles.push(0.0);
        signal.imu_times.push(0);
    }

    let mut prev_angle = 0.0;
    for i in 1..=config.num_frames {
        // triangular profile: ramp up to the midpoint, back down to zero
        let angle = if i <= config.num_frames / 2 {
            config.rotation_scale * i as f64
        } else {
            config.rotation_scale * (config.num_frames - i) as f64
        };

        signal
            .vision_times
            .push((i * config.imu_per_frame) as Timestamp);
        signal.vision_angles.push(angle);

        let diff = angle - prev_angle;
        for k in 1..=config.imu_per_frame {
            let ratio = k as f64 / config.imu_per_frame as f64;
            signal
                .imu_angles
                .push((ratio * diff + prev_angle) / config.imu_period_s);
            let next_time = signal.imu_times.last().copied().unwrap_or(0) + 1;
            signal.imu_times.push(next_time);
        }

        prev_angle = angle;
    }

    if config.delay_samples > 0 {
        for _ in 0..config.delay_samples {
            signal.imu_angles.push(0.0);
            let next_time = signal.imu_times.last().copied().unwrap_or(0) + 1;
            signal.imu_times.push(next_time);
        }
    }

    signal
}

/// A full synthetic run: frame handles, scripted tracker verdicts, and one
/// inertial batch per frame
///
/// `frames[0]` is the bootstrap frame with a single zero inertial sample;
/// batch `i` covers the interval ending at frame `i` and shares its first
/// sample with the previous batch's last.
#[derive(Debug, Clone)]
pub struct AlignmentScenario {
    /// Frame handles, bootstrap frame first
    pub frames: Vec<FrameOutput>,
    /// Verdicts for each frame after the bootstrap, in call order
    pub verdicts: Vec<(TrackingStatus, UnitQuaternion<f64>)>,
    /// Inertial batches, one per frame (bootstrap included)
    pub batches: Vec<Vec<ImuMeasurement>>,
    config: SyntheticSignalConfig,
}

impl AlignmentScenario {
    /// Build the scenario for the given signal parameters
    pub fn generate(config: &SyntheticSignalConfig) -> Self {
        let signal = generate_signal(config);

        let mut frames = vec![FrameOutput::new(0, 0)];
        let mut verdicts = Vec::with_capacity(config.num_frames);
        for (i, (&time, &angle)) in signal
            .vision_times
            .iter()
            .zip(&signal.vision_angles)
            .enumerate()
        {
            // the axis is arbitrary; only the magnitude reaches the aligner
            let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angle);
            verdicts.push((TrackingStatus::Valid, rotation));
            frames.push(FrameOutput::new((i + 1) as u64, time));
        }

        let mut batches =
            vec![vec![ImuMeasurement::new(0, Vector3::zeros(), Vector3::zeros())]];
        let delay = config.delay_samples;
        let first_imu_time = if delay > 0 {
            signal.imu_times[delay as usize]
        } else {
            signal.imu_times[0]
        };
        for i in 0..config.num_frames {
            let offset = if delay > 0 {
                config.imu_per_frame * i + delay as usize
            } else {
                config.imu_per_frame * i
            };
            let batch = (0..=config.imu_per_frame)
                .map(|k| {
                    let idx = k + offset;
                    ImuMeasurement::new(
                        signal.imu_times[idx] - first_imu_time,
                        Vector3::new(0.0, 0.0, signal.imu_angles[idx]),
                        Vector3::zeros(),
                    )
                })
                .collect();
            batches.push(batch);
        }

        Self {
            frames,
            verdicts,
            batches,
            config: config.clone(),
        }
    }

    /// Window size that makes the correlation fire on the last frame
    pub fn window_size(&self, imu_rate: bool) -> usize {
        if imu_rate {
            self.config.num_frames * self.config.imu_per_frame
        } else {
            self.config.num_frames
        }
    }

    /// Shift the correlation recovers for this scenario, in seconds
    ///
    /// The truncated correlation pulls the argmax one inertial sample toward
    /// zero; at frame rate the delay is quantized to whole frame periods.
    pub fn expected_shift(&self, imu_rate: bool) -> f64 {
        let delay = self.config.delay_samples;
        if imu_rate {
            if delay == 0 {
                return 0.0;
            }
            self.config.imu_period_s * (delay - delay.signum()) as f64
        } else {
            let per = self.config.imu_per_frame as f64;
            let periods = (delay as f64 / per).round();
            self.config.imu_period_s * per * periods
        }
    }
}

/// Add zero-mean white noise to every gyro channel
///
/// `sample_rate_hz` discretizes the density into a per-sample standard
/// deviation `σ = density · √rate`. A non-positive σ leaves the batches
/// untouched.
pub fn add_gyro_noise(
    batches: &mut [Vec<ImuMeasurement>],
    noise_density: f64,
    sample_rate_hz: f64,
    seed: u64,
) {
    let sigma = noise_density * sample_rate_hz.sqrt();
    let normal = match Normal::new(0.0, sigma) {
        Ok(normal) if sigma > 0.0 => normal,
        _ => return,
    };
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for batch in batches {
        for measurement in batch {
            measurement.gyro += Vector3::new(
                normal.sample(&mut rng),
                normal.sample(&mut rng),
                normal.sample(&mut rng),
            );
        }
    }
}

/// Replays a fixed list of tracker verdicts, one per query
///
/// Returns `Invalid` with an identity rotation once the script runs out, and
/// counts queries so tests can assert how often the aligner consulted it.
#[derive(Debug, Clone)]
pub struct ScriptedRotationSource {
    script: Vec<(TrackingStatus, UnitQuaternion<f64>)>,
    queries: usize,
}

impl ScriptedRotationSource {
    /// Create a source replaying `script` in order
    pub fn new(script: Vec<(TrackingStatus, UnitQuaternion<f64>)>) -> Self {
        Self { script, queries: 0 }
    }

    /// Number of times the source has been queried
    pub fn queries(&self) -> usize {
        self.queries
    }
}

impl RelativeRotationSource for ScriptedRotationSource {
    fn relative_rotation(
        &mut self,
        _prev: &FrameOutput,
        _curr: &FrameOutput,
    ) -> (TrackingStatus, UnitQuaternion<f64>) {
        let index = self.queries;
        self.queries += 1;
        self.script
            .get(index)
            .copied()
            .unwrap_or((TrackingStatus::Invalid, UnitQuaternion::identity()))
    }
}
