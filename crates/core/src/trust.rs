// Trust scoring: behavioral metrics -> 0..=100 reputation, plus staleness decay

use crate::types::TrustMetrics;
use chrono::{DateTime, Utc};

pub const MAX_TRUST: f64 = 100.0;
pub const MIN_TRUST: f64 = 0.0;

const UPTIME_WEIGHT: f64 = 0.30;
const LATENCY_WEIGHT: f64 = 0.15;
const SUCCESS_WEIGHT: f64 = 0.35;
const QUALITY_WEIGHT: f64 = 0.20;

/// Latency at which the latency component is worth half
const LATENCY_HALF_POINT_MS: f64 = 500.0;

/// Observations (requests plus answered probes) at which confidence is one half
const CONFIDENCE_HALF_POINT: f64 = 50.0;

/// Share of the behavioral score granted with zero observations
const CONFIDENCE_FLOOR: f64 = 0.4;

const BEHAVIOR_POINTS: f64 = 80.0;
const VERIFIED_OWNER_BONUS: f64 = 10.0;
const AUDITED_CODE_BONUS: f64 = 10.0;

/// Multiplier applied once per abuse report
const REPORT_PENALTY_FACTOR: f64 = 0.85;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Stateless trust scoring.
///
/// The behavioral part (uptime, latency, success rate, quality) is scaled by a
/// confidence factor over observed volume, forwarded requests plus answered
/// health probes, so a handful of lucky calls cannot buy a high score. Ownership verification and code audit add fixed bonuses, and
/// each abuse report multiplies the total by [`REPORT_PENALTY_FACTOR`]. The
/// maximum attainable raw score is exactly 100.
pub struct TrustCalculator;

impl TrustCalculator {
    /// Compute a trust score in [0, 100] from metrics
    pub fn calculate(metrics: &TrustMetrics) -> f64 {
        let uptime = percent_component(metrics.uptime);
        let success = percent_component(metrics.success_rate);
        let quality = percent_component(metrics.quality_score);
        let latency = latency_component(metrics.avg_response_time_ms);

        let behavior = UPTIME_WEIGHT * uptime
            + LATENCY_WEIGHT * latency
            + SUCCESS_WEIGHT * success
            + QUALITY_WEIGHT * quality;

        let observations = metrics
            .total_requests
            .saturating_add(metrics.successful_probes) as f64;
        let confidence = observations / (observations + CONFIDENCE_HALF_POINT);
        let volume_factor = CONFIDENCE_FLOOR + (1.0 - CONFIDENCE_FLOOR) * confidence;

        let mut raw = BEHAVIOR_POINTS * behavior * volume_factor;
        if metrics.verified_owner {
            raw += VERIFIED_OWNER_BONUS;
        }
        if metrics.audited_code {
            raw += AUDITED_CODE_BONUS;
        }

        let penalty = REPORT_PENALTY_FACTOR.powi(metrics.report_count.min(i32::MAX as u32) as i32);
        clamp_trust(raw * penalty)
    }

    /// `score * decay_rate ^ days`, identity at zero days
    pub fn apply_decay(score: f64, days_since_last_update: f64, decay_rate: f64) -> f64 {
        let days = if days_since_last_update.is_finite() {
            days_since_last_update.max(0.0)
        } else {
            0.0
        };
        if days == 0.0 {
            return clamp_trust(score);
        }
        clamp_trust(score * decay_rate.powf(days))
    }

    /// Fresh score from metrics, decayed by time since the server was last seen
    pub fn recompute(
        metrics: &TrustMetrics,
        last_seen_at: DateTime<Utc>,
        now: DateTime<Utc>,
        decay_rate: f64,
    ) -> f64 {
        let days = (now - last_seen_at).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY;
        Self::apply_decay(Self::calculate(metrics), days, decay_rate)
    }
}

/// Clamp to [0, 100]; NaN collapses to the floor
pub fn clamp_trust(score: f64) -> f64 {
    if score.is_nan() {
        return MIN_TRUST;
    }
    score.clamp(MIN_TRUST, MAX_TRUST)
}

fn percent_component(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    (value / 100.0).clamp(0.0, 1.0)
}

fn latency_component(avg_ms: f64) -> f64 {
    if avg_ms.is_nan() || avg_ms == f64::INFINITY {
        return 0.0;
    }
    1.0 / (1.0 + avg_ms.max(0.0) / LATENCY_HALF_POINT_MS)
}
