//! Cost function for execution candidates

use crate::cluster::ModelPlacement;

/// Coefficients of the cost formula. Lower cost is better.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostWeights {
    /// Added when the model is not resident in memory
    pub cold_penalty: f64,
    /// Per in-flight request on the model's accelerator
    pub in_flight: f64,
    /// Per percent of accelerator utilization
    pub gpu_util: f64,
    /// Per percent of accelerator memory in use
    pub vram_util: f64,
    /// Network latency is divided by this before capping
    pub latency_divisor_ms: f64,
    pub latency_cap: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            cold_penalty: 60.0,
            in_flight: 25.0,
            gpu_util: 0.6,
            vram_util: 0.2,
            latency_divisor_ms: 20.0,
            latency_cap: 50.0,
        }
    }
}

/// Cost of executing on a placement reached with `latency_ms` of round trip.
///
/// Missing telemetry contributes nothing, so a telemetry-blind node only
/// pays for cold start, queueing and latency.
pub fn compute_cost(placement: &ModelPlacement, latency_ms: u64, weights: &CostWeights) -> f64 {
    let cold = if placement.loaded {
        0.0
    } else {
        weights.cold_penalty
    };
    let queueing = placement.in_flight as f64 * weights.in_flight;
    let gpu = placement
        .gpu_util_percent
        .map_or(0.0, |util| util * weights.gpu_util);
    let vram = placement
        .vram_util_percent
        .map_or(0.0, |util| util * weights.vram_util);
    let latency = if latency_ms == 0 || weights.latency_divisor_ms <= 0.0 {
        0.0
    } else {
        (latency_ms as f64 / weights.latency_divisor_ms).min(weights.latency_cap)
    };

    cold + queueing + gpu + vram + latency
}

/// Whether `candidate` should replace `best` under the hysteresis margin.
///
/// An infinite (unavailable) best is replaced by any finite candidate.
pub fn beats(best: f64, candidate: f64, margin: f64) -> bool {
    if !candidate.is_finite() {
        return false;
    }
    if !best.is_finite() {
        return true;
    }
    best - candidate >= margin
}
