//! Churn scoring decision procedure
//!
//! Business rules run before the classifier and may bypass it:
//! 1. every canonical feature is zero (customer zeroed out as inactive)
//! 2. `DAYS_SINCE_LAST >= 366`
//!
//! Only active customers reach the model.

use crate::artifact::ModelContext;
use crate::errors::Result;
use crate::features::{all_features_zero, feature_value, reindex, FeatureMap};
use crate::temporal::DAYS_SINCE_LAST;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inactivity threshold in days
pub const INACTIVITY_DAYS: i64 = 366;

/// Lower bound (inclusive, in percent) of the MODERADO band
pub const MODERATE_RISK_PERCENT: f64 = 30.0;

/// Lower bound (inclusive, in percent) of the ALTO band
pub const HIGH_RISK_PERCENT: f64 = 60.0;

/// Three-tier bucketing of churn probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Baixo,
    Moderado,
    Alto,
}

impl RiskLevel {
    pub fn from_percentage(percent: f64) -> Self {
        if percent >= HIGH_RISK_PERCENT {
            RiskLevel::Alto
        } else if percent >= MODERATE_RISK_PERCENT {
            RiskLevel::Moderado
        } else {
            RiskLevel::Baixo
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Baixo => "BAIXO",
            RiskLevel::Moderado => "MODERADO",
            RiskLevel::Alto => "ALTO",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the classifier was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    ZeroFeatures,
    LongInactivity,
}

impl BypassReason {
    pub fn message(&self) -> &'static str {
        match self {
            BypassReason::ZeroFeatures => "Cliente inativo (features zeradas por regra de negócio)",
            BypassReason::LongInactivity => "Cliente inativo há mais de 1 ano (regra de negócio)",
        }
    }
}

/// Scoring result returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnAssessment {
    pub percentual_churn: f64,
    pub nivel_risco: RiskLevel,
    pub usou_modelo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivo: Option<String>,
}

impl ChurnAssessment {
    fn bypassed(reason: BypassReason) -> Self {
        Self {
            percentual_churn: 0.0,
            nivel_risco: RiskLevel::Baixo,
            usou_modelo: false,
            motivo: Some(reason.message().to_string()),
        }
    }

    fn scored(percent: f64) -> Self {
        Self {
            percentual_churn: percent,
            nivel_risco: RiskLevel::from_percentage(percent),
            usou_modelo: true,
            motivo: None,
        }
    }
}

/// `DAYS_SINCE_LAST` from the input, truncated, 0 when absent
pub fn days_since_last(input: &FeatureMap) -> i64 {
    feature_value(input, DAYS_SINCE_LAST).trunc() as i64
}

/// Rule that bypasses the classifier for `input`, if any
pub fn bypass_reason(input: &FeatureMap, features: &[String]) -> Option<BypassReason> {
    if all_features_zero(input, features) {
        Some(BypassReason::ZeroFeatures)
    } else if days_since_last(input) >= INACTIVITY_DAYS {
        Some(BypassReason::LongInactivity)
    } else {
        None
    }
}

/// Probability in [0, 1] as a percentage rounded to two decimals
pub fn to_percentage(probability: f64) -> f64 {
    round_to_cents(probability.clamp(0.0, 1.0) * 100.0)
}

/// Round a non-negative value to two decimals, ties to even.
///
/// Works on the exact binary value, so `2.675` (stored just below the tie)
/// rounds down while an exact tie such as `0.125` goes to `0.12`.
fn round_to_cents(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }

    let bits = value.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exponent) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };
    if exponent >= 0 {
        return value;
    }

    let scaled = u128::from(mantissa) * 100;
    let shift = exponent.unsigned_abs();
    let cents = if shift >= 128 {
        0
    } else {
        let quotient = scaled >> shift;
        let remainder = scaled & ((1u128 << shift) - 1);
        let half = 1u128 << (shift - 1);
        if remainder > half || (remainder == half && quotient % 2 == 1) {
            quotient + 1
        } else {
            quotient
        }
    };
    cents as f64 / 100.0
}

/// Score one customer.
///
/// Fails with `ModelUnavailable` before any rule runs when no model is loaded.
pub fn assess(ctx: &ModelContext, input: &FeatureMap) -> Result<ChurnAssessment> {
    let model = ctx.model()?;

    if let Some(reason) = bypass_reason(input, ctx.features()) {
        return Ok(ChurnAssessment::bypassed(reason));
    }

    let vector = reindex(input, ctx.features());
    let percent = to_percentage(model.churn_probability(&vector));
    Ok(ChurnAssessment::scored(percent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_thresholds() {
        assert_eq!(RiskLevel::from_percentage(0.0), RiskLevel::Baixo);
        assert_eq!(RiskLevel::from_percentage(29.99), RiskLevel::Baixo);
        assert_eq!(RiskLevel::from_percentage(30.0), RiskLevel::Moderado);
        assert_eq!(RiskLevel::from_percentage(59.99), RiskLevel::Moderado);
        assert_eq!(RiskLevel::from_percentage(60.0), RiskLevel::Alto);
        assert_eq!(RiskLevel::from_percentage(100.0), RiskLevel::Alto);
    }

    #[test]
    fn test_risk_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&RiskLevel::Moderado).unwrap(), "\"MODERADO\"");
    }

    #[test]
    fn test_to_percentage_rounding() {
        assert_eq!(to_percentage(0.123456), 12.35);
        assert_eq!(to_percentage(1.0), 100.0);
        assert_eq!(to_percentage(0.0), 0.0);
        assert_eq!(to_percentage(1.5), 100.0);
    }

    #[test]
    fn test_cents_rounding_ties_to_even() {
        assert_eq!(round_to_cents(0.125), 0.12);
        assert_eq!(round_to_cents(0.375), 0.38);
        assert_eq!(round_to_cents(12.5), 12.5);
        assert_eq!(round_to_cents(2.675), 2.67);
        assert_eq!(round_to_cents(1.005), 1.0);
        assert_eq!(round_to_cents(12.3456), 12.35);
        assert_eq!(round_to_cents(99.999), 100.0);
    }
}
