//! Convergence-test parameters, error norms and order-of-convergence checks.

use crate::TaskError;
use log::{info, warn};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tidewater_config::TidewaterConfig;

/// Section holding component-wide convergence defaults.
pub const CONVERGENCE_SECTION: &str = "convergence";

/// Norm used to reduce model-minus-exact differences to one error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorNorm {
    /// Weighted L2 norm of the difference relative to the exact solution.
    L2,
    /// Root-mean-square difference.
    Rms,
    /// Maximum absolute difference.
    Linf,
}

impl FromStr for ErrorNorm {
    type Err = TaskError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "l2" => Ok(ErrorNorm::L2),
            "rms" => Ok(ErrorNorm::Rms),
            "linf" | "inf" => Ok(ErrorNorm::Linf),
            other => Err(TaskError::ConvergenceInput(format!(
                "unknown error norm {other:?} (expected l2, rms or linf)"
            ))),
        }
    }
}

impl fmt::Display for ErrorNorm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorNorm::L2 => "l2",
            ErrorNorm::Rms => "rms",
            ErrorNorm::Linf => "linf",
        };
        f.write_str(name)
    }
}

impl ErrorNorm {
    /// Reduce paired samples to a single error.
    ///
    /// `weights` (e.g. cell areas) apply to the L2 norm only; when absent
    /// every sample has weight one. The L2 norm falls back to the absolute
    /// value when the exact solution is identically zero.
    pub fn compute(
        &self,
        model: &[f64],
        exact: &[f64],
        weights: Option<&[f64]>,
    ) -> Result<f64, TaskError> {
        if model.len() != exact.len() {
            return Err(TaskError::ConvergenceInput(format!(
                "model has {} samples but exact solution has {}",
                model.len(),
                exact.len()
            )));
        }
        if model.is_empty() {
            return Err(TaskError::ConvergenceInput("no samples".to_string()));
        }
        if let Some(weights) = weights {
            if weights.len() != model.len() {
                return Err(TaskError::ConvergenceInput(format!(
                    "{} weights for {} samples",
                    weights.len(),
                    model.len()
                )));
            }
        }

        let diffs = model.iter().zip(exact).map(|(m, e)| m - e);
        let error = match self {
            ErrorNorm::L2 => {
                let weight = |idx: usize| weights.map_or(1.0, |w| w[idx]);
                let num: f64 = diffs
                    .enumerate()
                    .map(|(idx, d)| weight(idx) * d * d)
                    .sum();
                let den: f64 = exact
                    .iter()
                    .enumerate()
                    .map(|(idx, e)| weight(idx) * e * e)
                    .sum();
                if den > 0.0 {
                    (num / den).sqrt()
                } else {
                    num.sqrt()
                }
            }
            ErrorNorm::Rms => {
                let sum: f64 = diffs.map(|d| d * d).sum();
                (sum / model.len() as f64).sqrt()
            }
            ErrorNorm::Linf => diffs.map(f64::abs).fold(0.0, f64::max),
        };
        Ok(error)
    }
}

/// Parameters of a resolution/time-step convergence test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceSettings {
    /// Mesh resolutions in km.
    pub resolutions: Vec<f64>,
    /// Time step per km of resolution, in seconds.
    pub dt_per_km: f64,
    /// Barotropic time step per km, in seconds, for split-explicit runs.
    pub btr_dt_per_km: Option<f64>,
    /// Minimum acceptable order of convergence.
    pub conv_thresh: f64,
    /// Order above which a warning is logged.
    pub conv_max: f64,
    pub error_norm: ErrorNorm,
}

impl ConvergenceSettings {
    /// Read settings from a task section, falling back to `[convergence]`
    /// for `conv_thresh`, `conv_max` and `error_norm`.
    pub fn from_config(config: &TidewaterConfig, section: &str) -> Result<Self, TaskError> {
        let resolutions = config.get_float_list(section, "resolutions")?;
        if resolutions.is_empty() {
            return Err(TaskError::ConvergenceInput(format!(
                "{section}:resolutions is empty"
            )));
        }
        if let Some(bad) = resolutions.iter().find(|res| **res <= 0.0) {
            return Err(TaskError::ConvergenceInput(format!(
                "{section}:resolutions has non-positive entry {bad}"
            )));
        }
        let dt_per_km = config.get_float(section, "dt_per_km")?;
        let btr_dt_per_km = if config.has_option(section, "btr_dt_per_km") {
            Some(config.get_float(section, "btr_dt_per_km")?)
        } else {
            None
        };
        let conv_thresh = get_float_with_fallback(config, section, "conv_thresh")?;
        let conv_max = get_float_with_fallback(config, section, "conv_max")?;
        let error_norm = match lookup_with_fallback(config, section, "error_norm")? {
            Some(value) => value.parse()?,
            None => ErrorNorm::L2,
        };
        Ok(Self {
            resolutions,
            dt_per_km,
            btr_dt_per_km,
            conv_thresh,
            conv_max,
            error_norm,
        })
    }

    /// Baroclinic time step in seconds for a resolution in km.
    pub fn time_step(&self, resolution: f64) -> f64 {
        self.dt_per_km * resolution
    }

    /// Barotropic time step in seconds, when configured.
    pub fn btr_time_step(&self, resolution: f64) -> Option<f64> {
        self.btr_dt_per_km.map(|per_km| per_km * resolution)
    }

    /// Judge an order of convergence against the thresholds.
    pub fn check(&self, order: f64) -> Result<ConvergenceVerdict, TaskError> {
        if order < self.conv_thresh {
            return Err(TaskError::ConvergenceTooLow {
                order,
                threshold: self.conv_thresh,
            });
        }
        if order > self.conv_max {
            warn!(
                "order of convergence {order:.3} > max tolerance {}",
                self.conv_max
            );
            return Ok(ConvergenceVerdict::AboveMax);
        }
        Ok(ConvergenceVerdict::Pass)
    }

    /// Fit the order of convergence from per-resolution errors and check it.
    pub fn analyze(&self, errors: &[f64]) -> Result<ConvergenceReport, TaskError> {
        let order = order_of_convergence(&self.resolutions, errors)?;
        info!(
            "order of convergence {order:.3} (norm={}, resolutions={})",
            self.error_norm,
            self.resolutions.len()
        );
        let verdict = self.check(order)?;
        Ok(ConvergenceReport {
            resolutions: self.resolutions.clone(),
            errors: errors.to_vec(),
            order,
            verdict,
        })
    }
}

/// Outcome of a passing convergence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceVerdict {
    Pass,
    /// Converges faster than expected, which usually means a flawed test.
    AboveMax,
}

/// Errors and the fitted order for a convergence run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceReport {
    pub resolutions: Vec<f64>,
    pub errors: Vec<f64>,
    pub order: f64,
    pub verdict: ConvergenceVerdict,
}

/// Least-squares slope of log10(error) against log10(resolution).
pub fn order_of_convergence(resolutions: &[f64], errors: &[f64]) -> Result<f64, TaskError> {
    if resolutions.len() != errors.len() {
        return Err(TaskError::ConvergenceInput(format!(
            "{} resolutions but {} errors",
            resolutions.len(),
            errors.len()
        )));
    }
    if resolutions.len() < 2 {
        return Err(TaskError::ConvergenceInput(
            "at least two resolutions are needed".to_string(),
        ));
    }
    if resolutions.iter().chain(errors).any(|value| *value <= 0.0) {
        return Err(TaskError::ConvergenceInput(
            "resolutions and errors must be positive".to_string(),
        ));
    }

    let xs: Vec<f64> = resolutions.iter().map(|value| value.log10()).collect();
    let ys: Vec<f64> = errors.iter().map(|value| value.log10()).collect();
    let n = xs.len() as f64;
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = ys.iter().sum::<f64>() / n;
    let sxy: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum();
    let sxx: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
    if sxx == 0.0 {
        return Err(TaskError::ConvergenceInput(
            "resolutions must not all be equal".to_string(),
        ));
    }
    Ok(sxy / sxx)
}

/// Format a time step as `HH:MM:SS`, or `DDDD_HH:MM:SS` past one day.
pub fn format_time_step(seconds: f64) -> String {
    let (days, hh, mm, ss) = split_duration(seconds);
    if days > 0 {
        format!("{days:04}_{hh:02}:{mm:02}:{ss:02}")
    } else {
        format!("{hh:02}:{mm:02}:{ss:02}")
    }
}

/// Format a run duration given in hours as `DDDD_HH:MM:SS`.
pub fn format_run_duration(hours: f64) -> String {
    let (days, hh, mm, ss) = split_duration(hours * 3600.0);
    format!("{days:04}_{hh:02}:{mm:02}:{ss:02}")
}

/// Whole days, hours, minutes and seconds of a duration in seconds.
fn split_duration(seconds: f64) -> (u64, u64, u64, u64) {
    let total = seconds.round().max(0.0) as u64;
    let (days, rem) = (total / 86_400, total % 86_400);
    let (hours, rem) = (rem / 3600, rem % 3600);
    (days, hours, rem / 60, rem % 60)
}

/// Directory-friendly resolution label, e.g. `60km` or `2.5km`.
pub fn resolution_label(resolution: f64) -> String {
    if resolution.fract() == 0.0 {
        format!("{}km", resolution as i64)
    } else {
        format!("{resolution}km")
    }
}

/// Cell counts of a doubly periodic planar hex mesh: `(nx, ny)`.
///
/// Both counts are even and at least 4.
pub fn planar_hex_nx_ny(lx: f64, ly: f64, resolution: f64) -> (u64, u64) {
    let nx = (2 * (0.5 * lx / resolution + 0.5).floor() as u64).max(4);
    let ny = (2 * (0.5 * ly * (2.0 / 3f64.sqrt()) / resolution + 0.5).floor() as u64).max(4);
    (nx, ny)
}

/// Approximate cell count of a quasi-uniform spherical mesh.
pub fn spherical_cell_count(radius_km: f64, resolution: f64) -> u64 {
    let cell_area = 3f64.sqrt() / 2.0 * resolution * resolution;
    (4.0 * std::f64::consts::PI * radius_km * radius_km / cell_area).round() as u64
}

fn lookup_with_fallback(
    config: &TidewaterConfig,
    section: &str,
    option: &str,
) -> Result<Option<String>, TaskError> {
    if let Some(value) = config.get_opt(section, option)? {
        return Ok(Some(value));
    }
    Ok(config.get_opt(CONVERGENCE_SECTION, option)?)
}

fn get_float_with_fallback(
    config: &TidewaterConfig,
    section: &str,
    option: &str,
) -> Result<f64, TaskError> {
    let source = if config.has_option(section, option) {
        section
    } else {
        CONVERGENCE_SECTION
    };
    Ok(config.get_float(source, option)?)
}
