//! Credit attribution over assembled journeys
//!
//! Pure functions: same journey + same model + same config always yields the
//! same result. For non-empty journeys the credit fractions sum to 1.0 within
//! `CREDIT_SUM_TOLERANCE`; normalization runs after every weighting pass so
//! floating-point drift cannot accumulate.

use serde::{Deserialize, Serialize};

use crate::core::config::AttributionConfig;
use crate::core::constants::CREDIT_SUM_TOLERANCE;
use crate::domain::journey::Journey;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Supported attribution weighting models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionModel {
    FirstTouch,
    LastTouch,
    Linear,
    TimeDecay,
    PositionBased,
}

impl AttributionModel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AttributionModel::FirstTouch => "first_touch",
            AttributionModel::LastTouch => "last_touch",
            AttributionModel::Linear => "linear",
            AttributionModel::TimeDecay => "time_decay",
            AttributionModel::PositionBased => "position_based",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "first_touch" => Some(AttributionModel::FirstTouch),
            "last_touch" => Some(AttributionModel::LastTouch),
            "linear" => Some(AttributionModel::Linear),
            "time_decay" => Some(AttributionModel::TimeDecay),
            "position_based" => Some(AttributionModel::PositionBased),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttributionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credit assigned to one touchpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditShare {
    pub touchpoint_id: String,
    pub channel: String,
    pub campaign: Option<String>,
    /// Zero-based position within the assembled journey
    pub position: usize,
    /// Fraction of conversion credit in [0, 1]
    pub fraction: f64,
}

/// Attribution output for one (journey, model) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResult {
    pub lead_id: String,
    pub model: AttributionModel,
    pub credits: Vec<CreditShare>,
}

impl AttributionResult {
    pub fn is_empty(&self) -> bool {
        self.credits.is_empty()
    }

    /// The touchpoint carrying the most credit, earliest position winning ties.
    pub fn primary(&self) -> Option<&CreditShare> {
        self.credits
            .iter()
            .max_by(|a, b| {
                a.fraction
                    .partial_cmp(&b.fraction)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    // On equal fractions prefer the earlier position
                    .then(b.position.cmp(&a.position))
            })
    }

    pub fn fraction_sum(&self) -> f64 {
        self.credits.iter().map(|c| c.fraction).sum()
    }
}

/// Compute attribution for a journey under the given model.
///
/// Empty journey ⇒ empty result (never an error). Single touchpoint ⇒ full
/// credit regardless of model.
pub fn compute(
    journey: &Journey,
    model: AttributionModel,
    config: &AttributionConfig,
) -> AttributionResult {
    let n = journey.len();
    if n == 0 {
        return AttributionResult {
            lead_id: journey.lead_id.clone(),
            model,
            credits: Vec::new(),
        };
    }

    let weights = if n == 1 {
        vec![1.0]
    } else {
        match model {
            AttributionModel::FirstTouch => single_position_weights(n, 0),
            AttributionModel::LastTouch => single_position_weights(n, n - 1),
            AttributionModel::Linear => vec![1.0; n],
            AttributionModel::TimeDecay => time_decay_weights(journey, config),
            AttributionModel::PositionBased => position_based_weights(n, config),
        }
    };

    let credits = normalize(journey, weights);

    AttributionResult {
        lead_id: journey.lead_id.clone(),
        model,
        credits,
    }
}

fn single_position_weights(n: usize, winner: usize) -> Vec<f64> {
    let mut weights = vec![0.0; n];
    weights[winner] = 1.0;
    weights
}

/// Time-decay weighting: `2^(-age_days / half_life)`.
///
/// Ages are measured back from the last touchpoint's timestamp, not the wall
/// clock, so recomputation over the same snapshot is reproducible.
fn time_decay_weights(journey: &Journey, config: &AttributionConfig) -> Vec<f64> {
    let reference = journey
        .last()
        .map(|t| t.occurred_at)
        .unwrap_or_default();

    journey
        .touchpoints
        .iter()
        .map(|t| {
            let age_days = (reference - t.occurred_at).max(0) as f64 / MILLIS_PER_DAY;
            2f64.powf(-age_days / config.time_decay_half_life_days)
        })
        .collect()
}

/// Position-based weighting: fixed shares at the ends, the remainder spread
/// evenly across the middle. Collapses to an even split when there is no
/// middle (n ≤ 2).
fn position_based_weights(n: usize, config: &AttributionConfig) -> Vec<f64> {
    if n <= 2 {
        return vec![1.0 / n as f64; n];
    }

    let first = config.position_first_weight;
    let last = config.position_last_weight;
    let middle_total = (1.0 - first - last).max(0.0);
    let middle_each = middle_total / (n - 2) as f64;

    (0..n)
        .map(|i| {
            if i == 0 {
                first
            } else if i == n - 1 {
                last
            } else {
                middle_each
            }
        })
        .collect()
}

/// Turn raw weights into credit shares summing to exactly 1.0 (± tolerance).
fn normalize(journey: &Journey, weights: Vec<f64>) -> Vec<CreditShare> {
    let total: f64 = weights.iter().sum();
    debug_assert!(total > 0.0, "weight total must be positive for a non-empty journey");

    let credits: Vec<CreditShare> = journey
        .touchpoints
        .iter()
        .zip(weights)
        .enumerate()
        .map(|(position, (touchpoint, weight))| CreditShare {
            touchpoint_id: touchpoint.id.clone(),
            channel: touchpoint.channel.clone(),
            campaign: touchpoint.campaign.clone(),
            position,
            fraction: weight / total,
        })
        .collect();

    let sum: f64 = credits.iter().map(|c| c.fraction).sum();
    if (sum - 1.0).abs() > CREDIT_SUM_TOLERANCE {
        tracing::warn!(
            lead_id = %journey.lead_id,
            sum,
            "Credit fractions drifted outside tolerance after normalization"
        );
    }

    credits
}
