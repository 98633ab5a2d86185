use serde::{Deserialize, Serialize};

/// Default number of peaks in a waveform summary.
pub const DEFAULT_WAVEFORM_BUCKETS: usize = 400;

/// Fixed-length normalized amplitude summary stored as `waveform_json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformSummary {
    pub peaks: Vec<f64>,
    /// Seconds of audio the peaks cover.
    pub duration: f64,
}

impl WaveformSummary {
    /// All-zero summary used when analysis fails.
    pub fn zeroed(buckets: usize, duration: f64) -> Self {
        Self {
            peaks: vec![0.0; buckets],
            duration,
        }
    }

    /// True when there are exactly `buckets` peaks, all within [0, 1].
    pub fn is_well_formed(&self, buckets: usize) -> bool {
        self.peaks.len() == buckets
            && self
                .peaks
                .iter()
                .all(|p| p.is_finite() && (0.0..=1.0).contains(p))
    }
}
