//! Robust displacement-rate estimation.
//!
//! Turns an irregular series of (date, displacement, weight) samples for
//! one monitoring point into a calibrated velocity model: weighted linear
//! regression, a single MAD-based outlier pass, optional quadratic
//! acceleration, quality/trend classification, forward projections, and a
//! 95 % confidence interval on the rate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Minimum number of samples required to produce an estimate.
pub const MIN_SAMPLES: usize = 3;

/// Minimum retained samples for the quadratic (acceleration) fit.
const MIN_SAMPLES_QUADRATIC: usize = 5;

/// Modified Z-score threshold above which a residual is an outlier.
const OUTLIER_Z_THRESHOLD: f64 = 3.5;

/// Scale factor relating the MAD to the standard deviation of a normal
/// distribution.
const MAD_SCALE: f64 = 0.6745;

/// Days per Julian year, used to convert date offsets to elapsed years.
const DAYS_PER_YEAR: f64 = 365.25;

/// Threshold for treating a regression denominator as singular.
const SINGULAR_EPS: f64 = 1e-12;

/// Two-sided 95 % Student-t critical values for 1..=30 degrees of
/// freedom; the normal approximation (1.96) applies beyond that.
const T_TABLE_95: [f64; 30] = [
    12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228, 2.201, 2.179, 2.160,
    2.145, 2.131, 2.120, 2.110, 2.101, 2.093, 2.086, 2.080, 2.074, 2.069, 2.064, 2.060, 2.056,
    2.052, 2.048, 2.045, 2.042,
];

/// One displacement measurement for a point.
#[derive(Debug, Clone, Copy)]
pub struct DisplacementSample {
    /// Acquisition date of the measurement.
    pub measured_on: NaiveDate,
    /// Displacement in millimeters relative to the reference date.
    pub displacement_mm: f64,
    /// Optional quality weight (coherence). Defaults to 1.0, which makes
    /// the weighted fit identical to ordinary least squares.
    pub weight: Option<f64>,
}

/// Quality tier assigned to an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// Trend classification of the fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Accelerating,
    Decelerating,
    Stable,
}

/// A fitted displacement-rate model with its diagnostics.
///
/// Serialized (versioned) into the measurement `diagnostics` column, so
/// every field is optional-for-consumers rather than an untyped map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityEstimate {
    /// Displacement rate, mm/year.
    pub velocity_mm_yr: f64,
    /// Model intercept at the earliest sample, mm.
    pub intercept_mm: f64,
    /// 2a of the quadratic fit, mm/year²; absent below 5 retained samples.
    pub acceleration_mm_yr2: Option<f64>,
    /// Coefficient of determination of the retained fit.
    pub r_squared: f64,
    /// Standard error of the retained fit, mm.
    pub std_error_mm: f64,
    /// Half-width of the 95 % confidence interval on the velocity.
    pub ci95_mm_yr: f64,
    pub data_quality: DataQuality,
    pub trend: Trend,
    /// Samples retained after the outlier pass.
    pub sample_count: usize,
    pub outliers_removed: usize,
    /// Linear model evaluated 30 days past the last observation, mm.
    pub projected_30d_mm: f64,
    /// Linear model evaluated 90 days past the last observation, mm.
    pub projected_90d_mm: f64,
}

/// Fit a displacement-rate model over a point's measurement series.
///
/// Returns `None` when fewer than [`MIN_SAMPLES`] samples are supplied or
/// the regression is degenerate (all dates equal, or all weights zero).
pub fn estimate(samples: &[DisplacementSample]) -> Option<VelocityEstimate> {
    if samples.len() < MIN_SAMPLES {
        return None;
    }

    let origin = samples.iter().map(|s| s.measured_on).min()?;
    let mut xs: Vec<f64> = Vec::with_capacity(samples.len());
    let mut ys: Vec<f64> = Vec::with_capacity(samples.len());
    let mut ws: Vec<f64> = Vec::with_capacity(samples.len());
    for s in samples {
        xs.push((s.measured_on - origin).num_days() as f64 / DAYS_PER_YEAR);
        ys.push(s.displacement_mm);
        ws.push(sanitize_weight(s.weight));
    }

    let first_fit = weighted_linear_fit(&xs, &ys, &ws)?;
    let first_stats = fit_statistics(&xs, &ys, first_fit);

    // Single outlier pass on the residuals of the first fit.
    let keep = retained_after_outlier_pass(&first_stats.residuals);
    let removed = xs.len() - keep.len();

    let (xs, ys, fit, stats, outliers_removed) = if removed > 0 && keep.len() >= MIN_SAMPLES {
        let rxs: Vec<f64> = keep.iter().map(|&i| xs[i]).collect();
        let rys: Vec<f64> = keep.iter().map(|&i| ys[i]).collect();
        let rws: Vec<f64> = keep.iter().map(|&i| ws[i]).collect();
        let refit = weighted_linear_fit(&rxs, &rys, &rws)?;
        let restats = fit_statistics(&rxs, &rys, refit);
        (rxs, rys, refit, restats, removed)
    } else {
        // Removal would leave too few points; keep the original fit.
        (xs, ys, first_fit, first_stats, 0)
    };

    let n = xs.len();
    let acceleration_mm_yr2 = if n >= MIN_SAMPLES_QUADRATIC {
        quadratic_fit(&xs, &ys).map(|q| 2.0 * q.a)
    } else {
        None
    };

    let data_quality = classify_quality(n, stats.r_squared, stats.std_error, outliers_removed);
    let trend = classify_trend(fit.slope, acceleration_mm_yr2);

    let t_last = xs.iter().copied().fold(f64::MIN, f64::max);
    let project = |days: f64| fit.intercept + fit.slope * (t_last + days / DAYS_PER_YEAR);

    let ci95_mm_yr = t_critical_95(n.saturating_sub(2)) * stats.std_error;

    Some(VelocityEstimate {
        velocity_mm_yr: fit.slope,
        intercept_mm: fit.intercept,
        acceleration_mm_yr2,
        r_squared: stats.r_squared,
        std_error_mm: stats.std_error,
        ci95_mm_yr,
        data_quality,
        trend,
        sample_count: n,
        outliers_removed,
        projected_30d_mm: project(30.0),
        projected_90d_mm: project(90.0),
    })
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct LinearFit {
    slope: f64,
    intercept: f64,
}

#[derive(Debug, Clone)]
struct FitStatistics {
    residuals: Vec<f64>,
    r_squared: f64,
    std_error: f64,
}

/// Non-finite or negative weights contribute nothing to the fit.
fn sanitize_weight(weight: Option<f64>) -> f64 {
    match weight {
        Some(w) if w.is_finite() && w > 0.0 => w,
        Some(_) => 0.0,
        None => 1.0,
    }
}

/// Weighted least-squares line. `None` when the design is singular
/// (all x equal, or total weight zero).
fn weighted_linear_fit(xs: &[f64], ys: &[f64], ws: &[f64]) -> Option<LinearFit> {
    let sw: f64 = ws.iter().sum();
    let swx: f64 = xs.iter().zip(ws).map(|(x, w)| w * x).sum();
    let swy: f64 = ys.iter().zip(ws).map(|(y, w)| w * y).sum();
    let swxx: f64 = xs.iter().zip(ws).map(|(x, w)| w * x * x).sum();
    let swxy: f64 = xs.iter().zip(ys).zip(ws).map(|((x, y), w)| w * x * y).sum();

    let denom = sw * swxx - swx * swx;
    if denom.abs() < SINGULAR_EPS || sw < SINGULAR_EPS {
        return None;
    }

    let slope = (sw * swxy - swx * swy) / denom;
    let intercept = (swy - slope * swx) / sw;
    Some(LinearFit { slope, intercept })
}

/// Residuals, R², and standard error of a fitted line.
fn fit_statistics(xs: &[f64], ys: &[f64], fit: LinearFit) -> FitStatistics {
    let n = xs.len();
    let residuals: Vec<f64> = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| y - (fit.intercept + fit.slope * x))
        .collect();

    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    let mean_y: f64 = ys.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = ys.iter().map(|y| (y - mean_y) * (y - mean_y)).sum();

    let r_squared = if ss_tot < SINGULAR_EPS {
        // A flat series fit exactly is a perfect model; anything else
        // explains none of the (zero) variance.
        if ss_res < SINGULAR_EPS {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    };

    let std_error = if n > 2 {
        (ss_res / (n - 2) as f64).sqrt()
    } else {
        0.0
    };

    FitStatistics {
        residuals,
        r_squared,
        std_error,
    }
}

/// Indices retained after the modified-Z-score outlier test.
///
/// `z_i = 0.6745 * (r_i - median(r)) / MAD`; residuals with `|z| > 3.5`
/// are dropped. When the MAD is zero (more than half the residuals are
/// identical) no point is flagged.
fn retained_after_outlier_pass(residuals: &[f64]) -> Vec<usize> {
    let med = median(residuals);
    let abs_dev: Vec<f64> = residuals.iter().map(|r| (r - med).abs()).collect();
    let mad = median(&abs_dev);

    if mad < SINGULAR_EPS {
        return (0..residuals.len()).collect();
    }

    residuals
        .iter()
        .enumerate()
        .filter(|(_, r)| (MAD_SCALE * (**r - med) / mad).abs() <= OUTLIER_Z_THRESHOLD)
        .map(|(i, _)| i)
        .collect()
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

#[derive(Debug, Clone, Copy)]
struct QuadraticFit {
    a: f64,
}

/// Unweighted quadratic least squares `d = a·t² + b·t + c`, solved by
/// Cramer's rule over the normal equations. `None` when singular.
fn quadratic_fit(xs: &[f64], ys: &[f64]) -> Option<QuadraticFit> {
    let n = xs.len() as f64;
    let sx: f64 = xs.iter().sum();
    let sx2: f64 = xs.iter().map(|x| x * x).sum();
    let sx3: f64 = xs.iter().map(|x| x * x * x).sum();
    let sx4: f64 = xs.iter().map(|x| x * x * x * x).sum();
    let sy: f64 = ys.iter().sum();
    let sxy: f64 = xs.iter().zip(ys).map(|(x, y)| x * y).sum();
    let sx2y: f64 = xs.iter().zip(ys).map(|(x, y)| x * x * y).sum();

    // Normal equations, unknowns (a, b, c):
    //   [sx4 sx3 sx2] [a]   [sx2y]
    //   [sx3 sx2 sx ] [b] = [sxy ]
    //   [sx2 sx  n  ] [c]   [sy  ]
    let det = det3(sx4, sx3, sx2, sx3, sx2, sx, sx2, sx, n);
    if det.abs() < SINGULAR_EPS {
        return None;
    }

    let det_a = det3(sx2y, sx3, sx2, sxy, sx2, sx, sy, sx, n);
    Some(QuadraticFit { a: det_a / det })
}

#[allow(clippy::too_many_arguments)]
fn det3(m00: f64, m01: f64, m02: f64, m10: f64, m11: f64, m12: f64, m20: f64, m21: f64, m22: f64) -> f64 {
    m00 * (m11 * m22 - m12 * m21) - m01 * (m10 * m22 - m12 * m20) + m02 * (m10 * m21 - m11 * m20)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Fixed decision table over (count, R², SE, outliers removed).
fn classify_quality(count: usize, r_squared: f64, std_error: f64, outliers: usize) -> DataQuality {
    if count >= 10 && r_squared >= 0.9 && std_error < 2.0 && outliers <= 1 {
        DataQuality::Excellent
    } else if count >= 5 && r_squared >= 0.7 && std_error < 5.0 && outliers <= 2 {
        DataQuality::Good
    } else if count >= 3 && r_squared >= 0.5 && std_error < 10.0 && outliers <= 3 {
        DataQuality::Fair
    } else {
        DataQuality::Poor
    }
}

/// Accelerating/decelerating requires |acceleration| > 1 mm/yr²; the
/// sign relation to the velocity picks the direction.
fn classify_trend(velocity: f64, acceleration: Option<f64>) -> Trend {
    match acceleration {
        Some(a) if a.abs() > 1.0 && a * velocity > 0.0 => Trend::Accelerating,
        Some(a) if a.abs() > 1.0 && a * velocity < 0.0 => Trend::Decelerating,
        _ => Trend::Stable,
    }
}

/// Tabulated two-sided 95 % Student-t critical value for `df` degrees of
/// freedom; 1.96 beyond the table.
fn t_critical_95(df: usize) -> f64 {
    match df {
        0 => T_TABLE_95[0],
        1..=30 => T_TABLE_95[df - 1],
        _ => 1.96,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample(measured_on: NaiveDate, displacement_mm: f64) -> DisplacementSample {
        DisplacementSample {
            measured_on,
            displacement_mm,
            weight: None,
        }
    }

    /// Monthly dates starting 2024-01-01.
    fn monthly_dates(count: usize) -> Vec<NaiveDate> {
        (0..count)
            .map(|i| date(2024, 1, 1) + chrono::Duration::days(30 * i as i64))
            .collect()
    }

    // -- insufficient data ----------------------------------------------------

    #[test]
    fn empty_series_returns_none() {
        assert!(estimate(&[]).is_none());
    }

    #[test]
    fn one_sample_returns_none() {
        assert!(estimate(&[sample(date(2024, 1, 1), 1.0)]).is_none());
    }

    #[test]
    fn two_samples_return_none() {
        let samples = [
            sample(date(2024, 1, 1), 1.0),
            sample(date(2024, 2, 1), 2.0),
        ];
        assert!(estimate(&samples).is_none());
    }

    #[test]
    fn three_samples_suffice() {
        let samples = [
            sample(date(2024, 1, 1), 0.0),
            sample(date(2024, 4, 1), -3.0),
            sample(date(2024, 7, 1), -6.0),
        ];
        assert!(estimate(&samples).is_some());
    }

    // -- degenerate designs ---------------------------------------------------

    #[test]
    fn all_equal_dates_return_none() {
        let d = date(2024, 1, 1);
        let samples = [sample(d, 1.0), sample(d, 2.0), sample(d, 3.0)];
        assert!(estimate(&samples).is_none());
    }

    #[test]
    fn all_zero_weights_return_none() {
        let samples: Vec<DisplacementSample> = monthly_dates(4)
            .into_iter()
            .enumerate()
            .map(|(i, d)| DisplacementSample {
                measured_on: d,
                displacement_mm: i as f64,
                weight: Some(0.0),
            })
            .collect();
        assert!(estimate(&samples).is_none());
    }

    // -- regression correctness -----------------------------------------------

    #[test]
    fn exact_linear_series_recovers_slope() {
        // -12 mm/yr: one millimeter lost every 365.25/12 days.
        let samples: Vec<DisplacementSample> = (0..6)
            .map(|i| {
                let days = (i as f64 * DAYS_PER_YEAR / 12.0).round() as i64;
                let t = days as f64 / DAYS_PER_YEAR;
                sample(date(2024, 1, 1) + chrono::Duration::days(days), -12.0 * t)
            })
            .collect();

        let est = estimate(&samples).unwrap();
        assert!((est.velocity_mm_yr - (-12.0)).abs() < 0.05);
        assert!(est.r_squared > 0.999);
        assert!(est.std_error_mm < 0.05);
        assert_eq!(est.outliers_removed, 0);
    }

    #[test]
    fn unit_weights_match_ordinary_least_squares() {
        let dates = monthly_dates(5);
        let ys = [0.0, -1.1, -2.2, -2.8, -4.1];

        let weighted: Vec<DisplacementSample> = dates
            .iter()
            .zip(ys)
            .map(|(d, y)| DisplacementSample {
                measured_on: *d,
                displacement_mm: y,
                weight: Some(1.0),
            })
            .collect();
        let unweighted: Vec<DisplacementSample> =
            dates.iter().zip(ys).map(|(d, y)| sample(*d, y)).collect();

        // Textbook OLS on the same (t, y) pairs.
        let xs: Vec<f64> = dates
            .iter()
            .map(|d| (*d - dates[0]).num_days() as f64 / DAYS_PER_YEAR)
            .collect();
        let n = xs.len() as f64;
        let mean_x = xs.iter().sum::<f64>() / n;
        let mean_y = ys.iter().sum::<f64>() / n;
        let ols_slope = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (x - mean_x) * (y - mean_y))
            .sum::<f64>()
            / xs.iter().map(|x| (x - mean_x) * (x - mean_x)).sum::<f64>();
        let ols_intercept = mean_y - ols_slope * mean_x;

        let est_w = estimate(&weighted).unwrap();
        let est_u = estimate(&unweighted).unwrap();

        assert!((est_w.velocity_mm_yr - ols_slope).abs() < 1e-9);
        assert!((est_w.intercept_mm - ols_intercept).abs() < 1e-9);
        assert!((est_u.velocity_mm_yr - est_w.velocity_mm_yr).abs() < 1e-12);
        assert!((est_u.intercept_mm - est_w.intercept_mm).abs() < 1e-12);
    }

    #[test]
    fn higher_weight_pulls_fit_toward_sample() {
        let dates = monthly_dates(4);
        // Last sample disagrees with the linear trend of the first three.
        let build = |w_last: f64| -> Vec<DisplacementSample> {
            dates
                .iter()
                .enumerate()
                .map(|(i, d)| DisplacementSample {
                    measured_on: *d,
                    displacement_mm: if i == 3 { -9.0 } else { -(i as f64) },
                    weight: Some(if i == 3 { w_last } else { 1.0 }),
                })
                .collect()
        };

        let light = estimate(&build(0.1)).unwrap();
        let heavy = estimate(&build(5.0)).unwrap();
        // More weight on the steep last sample makes the rate more negative.
        assert!(heavy.velocity_mm_yr < light.velocity_mm_yr);
    }

    // -- outlier handling -----------------------------------------------------

    /// 12 monthly samples on a clean -20 mm/yr trend with small
    /// alternating noise, plus one +30 mm spike.
    fn series_with_spike() -> Vec<DisplacementSample> {
        let noise = [0.3, -0.4, 0.2, -0.1, 0.4, -0.3, 0.1, -0.2, 0.3, -0.4, 0.2, -0.1];
        monthly_dates(12)
            .into_iter()
            .enumerate()
            .map(|(i, d)| {
                let t = (30 * i) as f64 / DAYS_PER_YEAR;
                let spike = if i == 6 { 30.0 } else { 0.0 };
                sample(d, -20.0 * t + noise[i] + spike)
            })
            .collect()
    }

    #[test]
    fn spike_is_removed_and_fit_improves() {
        let spiky = series_with_spike();
        let est = estimate(&spiky).unwrap();
        assert_eq!(est.outliers_removed, 1);
        assert_eq!(est.sample_count, 11);

        // Unfiltered fit for comparison: same data, statistics computed
        // without the outlier pass.
        let origin = spiky[0].measured_on;
        let xs: Vec<f64> = spiky
            .iter()
            .map(|s| (s.measured_on - origin).num_days() as f64 / DAYS_PER_YEAR)
            .collect();
        let ys: Vec<f64> = spiky.iter().map(|s| s.displacement_mm).collect();
        let ws = vec![1.0; xs.len()];
        let raw_fit = weighted_linear_fit(&xs, &ys, &ws).unwrap();
        let raw_stats = fit_statistics(&xs, &ys, raw_fit);

        assert!(est.std_error_mm < raw_stats.std_error);
        assert!(est.r_squared > raw_stats.r_squared);
    }

    #[test]
    fn outlier_not_removed_when_too_few_would_remain() {
        // Three samples, one wildly off: removal would leave two, so the
        // pass must keep all three.
        let samples = [
            sample(date(2024, 1, 1), 0.0),
            sample(date(2024, 2, 1), -1.0),
            sample(date(2024, 3, 1), 500.0),
        ];
        let est = estimate(&samples).unwrap();
        assert_eq!(est.outliers_removed, 0);
        assert_eq!(est.sample_count, 3);
    }

    #[test]
    fn flat_residuals_have_no_outliers() {
        let samples: Vec<DisplacementSample> = monthly_dates(6)
            .into_iter()
            .enumerate()
            .map(|(i, d)| sample(d, -2.0 * i as f64))
            .collect();
        let est = estimate(&samples).unwrap();
        assert_eq!(est.outliers_removed, 0);
    }

    // -- acceleration and trend -----------------------------------------------

    #[test]
    fn no_acceleration_below_five_samples() {
        let samples: Vec<DisplacementSample> = monthly_dates(4)
            .into_iter()
            .enumerate()
            .map(|(i, d)| sample(d, -(i as f64)))
            .collect();
        let est = estimate(&samples).unwrap();
        assert!(est.acceleration_mm_yr2.is_none());
        assert_eq!(est.trend, Trend::Stable);
    }

    #[test]
    fn quadratic_series_reports_acceleration() {
        // d = -10·t² over two years: acceleration -20 mm/yr².
        let samples: Vec<DisplacementSample> = (0..9)
            .map(|i| {
                let days = i * 91;
                let t = days as f64 / DAYS_PER_YEAR;
                sample(
                    date(2024, 1, 1) + chrono::Duration::days(days),
                    -10.0 * t * t,
                )
            })
            .collect();
        let est = estimate(&samples).unwrap();
        let accel = est.acceleration_mm_yr2.expect("quadratic fit expected");
        assert!((accel - (-20.0)).abs() < 0.5, "acceleration {accel}");
        // Velocity is negative over this window and acceleration shares
        // its sign: the subsidence is speeding up.
        assert!(est.velocity_mm_yr < 0.0);
        assert_eq!(est.trend, Trend::Accelerating);
    }

    #[test]
    fn opposing_acceleration_is_decelerating() {
        // Starts sinking fast, flattens out: d = -30t + 10t².
        let samples: Vec<DisplacementSample> = (0..9)
            .map(|i| {
                let days = i * 45;
                let t = days as f64 / DAYS_PER_YEAR;
                sample(
                    date(2024, 1, 1) + chrono::Duration::days(days),
                    -30.0 * t + 10.0 * t * t,
                )
            })
            .collect();
        let est = estimate(&samples).unwrap();
        assert!(est.velocity_mm_yr < 0.0);
        assert!(est.acceleration_mm_yr2.unwrap() > 1.0);
        assert_eq!(est.trend, Trend::Decelerating);
    }

    // -- projections ----------------------------------------------------------

    #[test]
    fn projections_extend_the_linear_model() {
        let samples: Vec<DisplacementSample> = (0..6)
            .map(|i| {
                let days = i * 60;
                let t = days as f64 / DAYS_PER_YEAR;
                sample(date(2024, 1, 1) + chrono::Duration::days(days), -10.0 * t)
            })
            .collect();
        let est = estimate(&samples).unwrap();

        let t_last = 300.0 / DAYS_PER_YEAR;
        let expect_30 = est.intercept_mm + est.velocity_mm_yr * (t_last + 30.0 / DAYS_PER_YEAR);
        let expect_90 = est.intercept_mm + est.velocity_mm_yr * (t_last + 90.0 / DAYS_PER_YEAR);
        assert!((est.projected_30d_mm - expect_30).abs() < 1e-9);
        assert!((est.projected_90d_mm - expect_90).abs() < 1e-9);
        // A subsiding point keeps subsiding in projection.
        assert!(est.projected_90d_mm < est.projected_30d_mm);
    }

    // -- confidence interval --------------------------------------------------

    #[test]
    fn ci_uses_tabulated_t_for_small_samples() {
        assert!((t_critical_95(1) - 12.706).abs() < 1e-9);
        assert!((t_critical_95(10) - 2.228).abs() < 1e-9);
        assert!((t_critical_95(30) - 2.042).abs() < 1e-9);
        assert!((t_critical_95(31) - 1.96).abs() < 1e-9);
    }

    #[test]
    fn ci_scales_with_standard_error() {
        let noisy: Vec<DisplacementSample> = monthly_dates(6)
            .into_iter()
            .enumerate()
            .map(|(i, d)| sample(d, -2.0 * i as f64 + if i % 2 == 0 { 1.5 } else { -1.5 }))
            .collect();
        let est = estimate(&noisy).unwrap();
        let expected = t_critical_95(est.sample_count - 2) * est.std_error_mm;
        assert!((est.ci95_mm_yr - expected).abs() < 1e-12);
        assert!(est.ci95_mm_yr > 0.0);
    }

    // -- quality tiers --------------------------------------------------------

    #[test]
    fn long_clean_series_with_one_outlier_is_excellent() {
        // 12 measurements, tight residuals, one removed spike: the
        // excellent row of the decision table.
        let est = estimate(&series_with_spike()).unwrap();
        assert_eq!(est.outliers_removed, 1);
        assert!(est.sample_count >= 10);
        assert!(est.r_squared >= 0.9);
        assert!(est.std_error_mm < 2.0);
        assert_eq!(est.data_quality, DataQuality::Excellent);
    }

    #[test]
    fn short_clean_series_is_good() {
        let samples: Vec<DisplacementSample> = monthly_dates(6)
            .into_iter()
            .enumerate()
            .map(|(i, d)| sample(d, -3.0 * i as f64 + if i % 2 == 0 { 0.4 } else { -0.4 }))
            .collect();
        let est = estimate(&samples).unwrap();
        assert!(est.sample_count < 10);
        assert_eq!(est.data_quality, DataQuality::Good);
    }

    #[test]
    fn noise_dominated_series_is_poor() {
        let samples: Vec<DisplacementSample> = monthly_dates(5)
            .into_iter()
            .enumerate()
            .map(|(i, d)| sample(d, if i % 2 == 0 { 8.0 } else { -8.0 }))
            .collect();
        let est = estimate(&samples).unwrap();
        assert_eq!(est.data_quality, DataQuality::Poor);
    }

    #[test]
    fn quality_table_boundaries() {
        assert_eq!(classify_quality(10, 0.9, 1.9, 1), DataQuality::Excellent);
        assert_eq!(classify_quality(10, 0.89, 1.9, 1), DataQuality::Good);
        assert_eq!(classify_quality(5, 0.7, 4.9, 2), DataQuality::Good);
        assert_eq!(classify_quality(4, 0.7, 4.9, 2), DataQuality::Fair);
        assert_eq!(classify_quality(3, 0.5, 9.9, 3), DataQuality::Fair);
        assert_eq!(classify_quality(3, 0.4, 9.9, 3), DataQuality::Poor);
    }

    // -- diagnostics serialization --------------------------------------------

    #[test]
    fn estimate_serializes_with_lowercase_tiers() {
        let samples: Vec<DisplacementSample> = monthly_dates(5)
            .into_iter()
            .enumerate()
            .map(|(i, d)| sample(d, -2.0 * i as f64))
            .collect();
        let est = estimate(&samples).unwrap();
        let json = serde_json::to_value(&est).unwrap();
        assert!(json.get("velocity_mm_yr").is_some());
        let quality = json.get("data_quality").unwrap().as_str().unwrap();
        assert!(["excellent", "good", "fair", "poor"].contains(&quality));
    }
}
