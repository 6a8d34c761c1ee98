use serde::Serialize;

use crate::features::HousingFeatures;
use crate::model::Regressor;

/// Model outputs are in units of $100,000.
pub const UNIT_MULTIPLIER: f64 = 100_000.0;

/// One price estimate plus the location it was asked for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Model output before scaling.
    pub raw: f64,
    /// Estimated price in dollars.
    pub price: f64,
    pub formatted: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Prediction {
    pub fn from_raw(raw: f64, features: &HousingFeatures) -> Self {
        let price = raw * UNIT_MULTIPLIER;
        Self {
            raw,
            price,
            formatted: format_currency(price),
            latitude: features.latitude,
            longitude: features.longitude,
        }
    }
}

/// Runs one inference call.
pub fn predict(model: &dyn Regressor, features: &HousingFeatures) -> Prediction {
    Prediction::from_raw(model.predict(features), features)
}

/// Magnitudes at or above this are shown as [`NOT_AVAILABLE`]; no house is
/// worth a quadrillion dollars.
pub const MAX_DISPLAY_AMOUNT: f64 = 1e15;

pub const NOT_AVAILABLE: &str = "n/a";

/// Formats dollars as `$1,234,567.89`; negatives become `-$1,234.50`.
/// Non-finite and out-of-range amounts render as `n/a`.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() || amount.abs() >= MAX_DISPLAY_AMOUNT {
        return NOT_AVAILABLE.to_string();
    }
    let cents = (amount.abs() * 100.0).round() as u128;
    let (whole, frac) = (cents / 100, cents % 100);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, frac)
}
