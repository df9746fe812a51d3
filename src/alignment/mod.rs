//! The temporal calibration core: correlation window, cross-correlation,
//! and the per-frame time aligner.

pub mod aligner;
pub mod cross_correlation;
pub mod ring_buffer;

pub use aligner::{
    AlignerState, ConfigError, TimeAligner, TimeAlignmentConfig, TimeAlignmentResult,
};
pub use cross_correlation::{best_correlation_lag, correlation_at};
pub use ring_buffer::RingBuffer;
