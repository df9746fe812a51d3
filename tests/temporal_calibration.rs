//! End-to-end scenarios for the camera/IMU time aligner.
//!
//! Each test drives the public API the way the host estimator would: one
//! call per frame, with the inertial batch spanning the interval since the
//! previous frame.

use approx::assert_abs_diff_eq;
use nalgebra::{UnitQuaternion, Vector3};
use vio_timealign::simulation::{
    add_gyro_noise, AlignmentScenario, ScriptedRotationSource, SyntheticSignalConfig,
};
use vio_timealign::{
    FrameOutput, ImuMeasurement, TimeAligner, TimeAlignmentConfig, TimeAlignmentResult,
    TrackingStatus,
};

fn scenario_config(imu_rate: bool, scenario: &AlignmentScenario) -> TimeAlignmentConfig {
    TimeAlignmentConfig {
        imu_rate_estimation: imu_rate,
        window_size: scenario.window_size(imu_rate),
        gyro_noise_density: 0.0,
        nominal_sampling_time_s: 1.0e-9,
    }
}

/// Feed every frame of the scenario; returns all per-call results
fn run_scenario(
    scenario: &AlignmentScenario,
    config: TimeAlignmentConfig,
) -> Vec<TimeAlignmentResult> {
    let mut aligner = TimeAligner::new(config).unwrap();
    let mut tracker = ScriptedRotationSource::new(scenario.verdicts.clone());
    scenario
        .frames
        .iter()
        .zip(&scenario.batches)
        .map(|(frame, batch)| aligner.estimate_time_alignment(&mut tracker, frame, batch))
        .collect()
}

fn assert_warmup_then_final(results: &[TimeAlignmentResult], expected_shift: f64) {
    let (final_result, warmup) = results.split_last().unwrap();
    for result in warmup {
        assert!(!result.valid);
        assert_abs_diff_eq!(result.imu_time_shift, 0.0);
    }
    assert!(final_result.valid);
    assert_abs_diff_eq!(final_result.imu_time_shift, expected_shift, epsilon = 1e-15);
}

#[test]
fn test_bad_ransac_status() {
    let mut tracker = ScriptedRotationSource::new(vec![
        (TrackingStatus::Invalid, UnitQuaternion::identity()),
        (TrackingStatus::Disabled, UnitQuaternion::identity()),
    ]);
    let mut aligner = TimeAligner::new(TimeAlignmentConfig::default()).unwrap();
    let frame = FrameOutput::new(1, 1);

    // initial frame
    let result = aligner.estimate_time_alignment(&mut tracker, &frame, &[]);
    assert!(!result.valid);
    assert_abs_diff_eq!(result.imu_time_shift, 0.0);

    // alignment "succeeds" when the rotation estimate is invalid
    let result = aligner.estimate_time_alignment(&mut tracker, &frame, &[]);
    assert!(result.valid);
    assert_abs_diff_eq!(result.imu_time_shift, 0.0);

    // and when geometric verification is disabled outright
    let result = aligner.estimate_time_alignment(&mut tracker, &frame, &[]);
    assert!(result.valid);
    assert_abs_diff_eq!(result.imu_time_shift, 0.0);

    assert_eq!(tracker.queries(), 2);
}

#[test]
fn test_empty_imu() {
    let script = (0..3)
        .map(|_| (TrackingStatus::Valid, UnitQuaternion::identity()))
        .collect();
    let mut tracker = ScriptedRotationSource::new(script);
    let mut aligner = TimeAligner::new(TimeAlignmentConfig::default()).unwrap();
    let frame = FrameOutput::new(1, 1);

    let result = aligner.estimate_time_alignment(&mut tracker, &frame, &[]);
    assert!(!result.valid);
    assert_abs_diff_eq!(result.imu_time_shift, 0.0);

    // alignment "succeeds" when no inertial data arrives between frames,
    // and stays concluded without consulting the tracker again
    for _ in 0..2 {
        let result = aligner.estimate_time_alignment(&mut tracker, &frame, &[]);
        assert!(result.valid);
        assert_abs_diff_eq!(result.imu_time_shift, 0.0);
    }
    assert_eq!(tracker.queries(), 1);
}

fn run_short_sequence(imu_rate: bool) {
    let script = (0..3)
        .map(|_| (TrackingStatus::Valid, UnitQuaternion::identity()))
        .collect();
    let mut tracker = ScriptedRotationSource::new(script);
    let config = TimeAlignmentConfig {
        imu_rate_estimation: imu_rate,
        window_size: 10,
        ..Default::default()
    };
    let mut aligner = TimeAligner::new(config).unwrap();

    for i in 0..4_i64 {
        let frame = FrameOutput::new(i as u64, i);
        let batch = [
            ImuMeasurement::new(i - 1, Vector3::zeros(), Vector3::zeros()),
            ImuMeasurement::new(i, Vector3::zeros(), Vector3::zeros()),
        ];
        let result = aligner.estimate_time_alignment(&mut tracker, &frame, &batch);
        assert!(!result.valid);
        assert_abs_diff_eq!(result.imu_time_shift, 0.0);
    }
}

#[test]
fn test_window_not_filled() {
    run_short_sequence(true);
}

#[test]
fn test_window_not_filled_frame_rate() {
    run_short_sequence(false);
}

#[test]
fn test_low_variance() {
    let config = TimeAlignmentConfig {
        window_size: 3,
        gyro_noise_density: 1.0,
        ..Default::default()
    };
    let script = (0..3)
        .map(|_| (TrackingStatus::Valid, UnitQuaternion::identity()))
        .collect();
    let mut tracker = ScriptedRotationSource::new(script);
    let mut aligner = TimeAligner::new(config).unwrap();

    // a constant (zero) gyro signal never opens the variance gate
    for i in 0..4_i64 {
        let frame = FrameOutput::new(i as u64, i);
        let batch = [ImuMeasurement::new(i, Vector3::zeros(), Vector3::zeros())];
        let result = aligner.estimate_time_alignment(&mut tracker, &frame, &batch);
        assert!(!result.valid);
        assert_abs_diff_eq!(result.imu_time_shift, 0.0);
    }
}

#[test]
fn test_enough_variance() {
    let config = TimeAlignmentConfig {
        window_size: 3,
        gyro_noise_density: 0.0,
        ..Default::default()
    };
    let script: Vec<_> = (0..3)
        .map(|_| (TrackingStatus::Valid, UnitQuaternion::identity()))
        .collect();
    let num_results = script.len();
    let mut tracker = ScriptedRotationSource::new(script);
    let mut aligner = TimeAligner::new(config).unwrap();

    for i in 0..=num_results as i64 {
        let frame = FrameOutput::new(i as u64, i);
        let batch = [ImuMeasurement::new(i, Vector3::zeros(), Vector3::zeros())];
        let result = aligner.estimate_time_alignment(&mut tracker, &frame, &batch);
        if (i as usize) < num_results {
            assert!(!result.valid);
            assert_abs_diff_eq!(result.imu_time_shift, 0.0);
        } else {
            assert!(result.valid);
            // the shift cannot exceed the window extent on either side
            let bound = (num_results - 1) as f64 * 1.0e-9;
            assert!(result.imu_time_shift <= bound);
            assert!(result.imu_time_shift >= -bound);
        }
    }
}

#[test]
fn test_well_formed_no_delay() {
    let scenario = AlignmentScenario::generate(&SyntheticSignalConfig {
        imu_per_frame: 1,
        ..Default::default()
    });
    let mut config = scenario_config(true, &scenario);
    // at one sample per interval nothing ever overflows the window, so it
    // must also hold the bootstrap frame's seed sample
    config.window_size += 1;
    let results = run_scenario(&scenario, config);
    assert_warmup_then_final(&results, 0.0);
}

#[test]
fn test_well_formed_multi_imu_no_delay() {
    let scenario = AlignmentScenario::generate(&SyntheticSignalConfig::default());
    let results = run_scenario(&scenario, scenario_config(true, &scenario));
    assert_warmup_then_final(&results, 0.0);
}

#[test]
fn test_well_formed_multi_imu_no_delay_frame_rate() {
    let scenario = AlignmentScenario::generate(&SyntheticSignalConfig::default());
    let results = run_scenario(&scenario, scenario_config(false, &scenario));
    assert_warmup_then_final(&results, 0.0);
}

#[test]
fn test_neg_delay_imu_rate() {
    let scenario = AlignmentScenario::generate(&SyntheticSignalConfig {
        delay_samples: -8,
        ..Default::default()
    });
    let results = run_scenario(&scenario, scenario_config(true, &scenario));
    assert_warmup_then_final(&results, scenario.expected_shift(true));
}

#[test]
fn test_pos_delay_imu_rate() {
    let scenario = AlignmentScenario::generate(&SyntheticSignalConfig {
        delay_samples: 7,
        ..Default::default()
    });
    let results = run_scenario(&scenario, scenario_config(true, &scenario));
    assert_warmup_then_final(&results, scenario.expected_shift(true));
}

#[test]
fn test_neg_delay_frame_rate() {
    let scenario = AlignmentScenario::generate(&SyntheticSignalConfig {
        delay_samples: -8,
        ..Default::default()
    });
    let results = run_scenario(&scenario, scenario_config(false, &scenario));
    assert_warmup_then_final(&results, scenario.expected_shift(false));
}

#[test]
fn test_pos_delay_frame_rate() {
    let scenario = AlignmentScenario::generate(&SyntheticSignalConfig {
        delay_samples: 7,
        ..Default::default()
    });
    let results = run_scenario(&scenario, scenario_config(false, &scenario));
    assert_warmup_then_final(&results, scenario.expected_shift(false));
}

#[test]
fn test_opposite_delays_give_opposite_shifts() {
    let forward = AlignmentScenario::generate(&SyntheticSignalConfig {
        delay_samples: 7,
        ..Default::default()
    });
    let backward = AlignmentScenario::generate(&SyntheticSignalConfig {
        delay_samples: -7,
        ..Default::default()
    });
    let shift_forward = run_scenario(&forward, scenario_config(true, &forward))
        .last()
        .unwrap()
        .imu_time_shift;
    let shift_backward = run_scenario(&backward, scenario_config(true, &backward))
        .last()
        .unwrap()
        .imu_time_shift;
    assert_abs_diff_eq!(shift_forward, -shift_backward, epsilon = 1e-15);
    assert!(shift_forward > 0.0);
}

#[test]
fn test_gate_opens_on_noisy_but_moving_signal() {
    let mut scenario = AlignmentScenario::generate(&SyntheticSignalConfig::default());
    // gyro noise orders of magnitude below the motion signal: the gate must
    // open and the estimate must match the clean run
    add_gyro_noise(&mut scenario.batches, 1.0e-6, 1.0e9, 99);
    let config = TimeAlignmentConfig {
        gyro_noise_density: 1.0e-6,
        ..scenario_config(true, &scenario)
    };
    let results = run_scenario(&scenario, config);
    assert_warmup_then_final(&results, 0.0);
}

#[test]
fn test_result_is_stable_after_conclusion() {
    let scenario = AlignmentScenario::generate(&SyntheticSignalConfig {
        delay_samples: 7,
        ..Default::default()
    });
    let config = scenario_config(true, &scenario);
    let mut aligner = TimeAligner::new(config).unwrap();
    let mut tracker = ScriptedRotationSource::new(scenario.verdicts.clone());

    let mut last = None;
    for (frame, batch) in scenario.frames.iter().zip(&scenario.batches) {
        last = Some(aligner.estimate_time_alignment(&mut tracker, frame, batch));
    }
    let concluded = last.unwrap();
    assert!(concluded.valid);

    // replaying the whole sequence against the concluded aligner changes
    // nothing and generates no tracker traffic
    let queries = tracker.queries();
    for (frame, batch) in scenario.frames.iter().zip(&scenario.batches) {
        let result = aligner.estimate_time_alignment(&mut tracker, frame, batch);
        assert_eq!(result, concluded);
    }
    assert_eq!(tracker.queries(), queries);
}
