//! Identity-threshold ladders
//!
//! Two ladders drive the pipeline: the dedup ladder walks downwards from
//! near-identical (100%) to a floor, and the cluster ladder walks upwards
//! from loose families to tight allele groups.

use std::cmp::Ordering;

use crate::error::{PipelineError, Result};

/// Thresholds closer than this are treated as the same value.
const THRESHOLD_EPSILON: f64 = 1e-9;

/// Upper bound on the number of dedup rounds a ladder may describe.
pub const MAX_DEDUP_STEPS: usize = 1000;

/// Round away accumulated floating point noise from repeated decrements.
fn tidy(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Round a cluster threshold to the precision used in artifact names.
fn quantize(value: f64) -> f64 {
    (value * 1e3).round() / 1e3
}

/// Render a threshold the way it appears in artifact names (`98`, `97.5`).
pub fn format_threshold(threshold: f64) -> String {
    if threshold.fract() == 0.0 {
        format!("{:.0}", threshold)
    } else {
        let s = format!("{:.3}", threshold);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Descending percent-identity cutoffs used by the deflator.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupLadder {
    steps: Vec<f64>,
}

impl DedupLadder {
    /// Build the ladder `high, high - step, ...` down to and including `floor`.
    ///
    /// When `step` does not divide `high - floor`, the floor itself is still
    /// appended as the final cutoff.
    pub fn new(high: f64, floor: f64, step: f64) -> Result<Self> {
        if !(high.is_finite() && floor.is_finite() && step.is_finite()) {
            return Err(PipelineError::Configuration(
                "dedup ladder values must be finite".to_string(),
            ));
        }
        if high > 100.0 || floor <= 0.0 || floor > high {
            return Err(PipelineError::Configuration(format!(
                "dedup ladder must satisfy 0 < floor <= high <= 100 (high={}, floor={})",
                high, floor
            )));
        }
        if step <= 0.0 {
            return Err(PipelineError::Configuration(format!(
                "dedup step must be positive (got {})",
                step
            )));
        }

        // float-to-int casts saturate, so a huge ratio lands above the cap
        let n = ((high - floor) / step + THRESHOLD_EPSILON).floor() as usize;
        if n > MAX_DEDUP_STEPS {
            return Err(PipelineError::Configuration(format!(
                "dedup step {} gives more than {} rounds between {} and {}",
                step, MAX_DEDUP_STEPS, high, floor
            )));
        }
        let mut steps: Vec<f64> = (0..=n).map(|i| tidy(high - i as f64 * step)).collect();
        if let Some(&last) = steps.last() {
            if last - floor > THRESHOLD_EPSILON {
                steps.push(tidy(floor));
            }
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[f64] {
        &self.steps
    }

    pub fn floor(&self) -> f64 {
        // new() always produces at least one step
        self.steps.last().copied().unwrap_or(100.0)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Ascending percent-identity thresholds used by the hierarchical cluster engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterLadder {
    thresholds: Vec<f64>,
}

impl ClusterLadder {
    /// Sort and deduplicate `values`. Every value must lie in (0, 100].
    ///
    /// Values are rounded to three decimals first, so two thresholds never
    /// share one artifact name.
    pub fn new(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(PipelineError::Configuration(
                "cluster ladder needs at least one threshold".to_string(),
            ));
        }
        if let Some(bad) = values
            .iter()
            .find(|v| !v.is_finite() || **v <= 0.0 || **v > 100.0)
        {
            return Err(PipelineError::Configuration(format!(
                "cluster threshold {} outside (0, 100]",
                bad
            )));
        }

        let mut thresholds: Vec<f64> = values.iter().map(|v| quantize(*v)).collect();
        if let Some(bad) = thresholds.iter().find(|v| **v <= 0.0) {
            return Err(PipelineError::Configuration(format!(
                "cluster threshold {} rounds to zero",
                bad
            )));
        }
        thresholds.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        thresholds.dedup_by(|a, b| (*a - *b).abs() < THRESHOLD_EPSILON);
        Ok(Self { thresholds })
    }

    /// Parse a comma separated list such as `50,60,70,80,90,95,98`.
    pub fn parse(list: &str) -> Result<Self> {
        let values = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<f64>().map_err(|_| {
                    PipelineError::Configuration(format!("invalid cluster threshold '{}'", s))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        Self::new(&values)
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}

impl Default for ClusterLadder {
    fn default() -> Self {
        Self {
            thresholds: vec![50.0, 60.0, 70.0, 80.0, 90.0, 95.0, 98.0],
        }
    }
}
