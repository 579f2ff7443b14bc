//! Unrealized gain of a freshly extracted investment purchase.
//!
//! All amounts are normalized to USD. MXN prices are converted with the
//! USD/MXN rate of the purchase date using exact decimal division.

use crate::core::date::NormalizedDate;
use crate::core::error::PipelineError;
use crate::core::fact::{Currency, ExtractedFact};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GainResult {
    pub purchase_date: NaiveDate,
    pub ticker: String,
    pub asset_name: String,
    pub quantity: Decimal,
    /// Purchase price per unit in USD.
    pub unit_price: Decimal,
    pub acquisition_cost: Decimal,
    pub current_value: Decimal,
    pub unrealized_gain: Decimal,
    /// USD/MXN rate of the purchase date, when one was available.
    pub exchange_rate: Option<Decimal>,
}

/// Computes acquisition cost, current value and unrealized gain for `fact`.
///
/// `current_price` must already be quoted in USD. `usd_mxn_rate` is only
/// required when the fact is in MXN.
pub fn compute_gain(
    fact: &ExtractedFact,
    purchase_date: NormalizedDate,
    current_price: Decimal,
    usd_mxn_rate: Option<Decimal>,
) -> Result<GainResult, PipelineError> {
    let currency: Currency = fact.currency_code.parse()?;

    let unit_price = match currency {
        Currency::Usd => fact.unit_price,
        Currency::Mxn => {
            let rate = usd_mxn_rate
                .filter(|r| !r.is_zero())
                .ok_or(PipelineError::RateUnavailable(purchase_date.date()))?;
            fact.unit_price
                .checked_div(rate)
                .ok_or(PipelineError::RateUnavailable(purchase_date.date()))?
        }
    };

    let acquisition_cost = fact.quantity * unit_price;
    let current_value = fact.quantity * current_price;
    let unrealized_gain = current_value - acquisition_cost;
    debug!(
        ticker = %fact.ticker,
        %currency,
        %acquisition_cost,
        %current_value,
        %unrealized_gain,
        "Computed unrealized gain"
    );

    Ok(GainResult {
        purchase_date: purchase_date.date(),
        ticker: fact.ticker.clone(),
        asset_name: fact.asset_name.clone(),
        quantity: fact.quantity,
        unit_price,
        acquisition_cost,
        current_value,
        unrealized_gain,
        exchange_rate: usd_mxn_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::date::normalize_date;
    use crate::core::fact::FactMap;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn purchase() -> NormalizedDate {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        normalize_date(Some("2025-02-03"), today)
    }

    fn fact(currency: &str, quantity: &str, unit_price: &str) -> ExtractedFact {
        ExtractedFact {
            ticker: "ABC".to_string(),
            asset_name: "ABC Corp".to_string(),
            purchase_date: Some("2025-02-03".to_string()),
            quantity: d(quantity),
            unit_price: d(unit_price),
            currency_code: currency.to_string(),
            extra: FactMap::new(),
        }
    }

    #[test]
    fn test_usd_uses_price_as_is() {
        let gain = compute_gain(&fact("USD", "10", "100.50"), purchase(), d("120"), None).unwrap();
        assert_eq!(gain.unit_price, d("100.50"));
        assert_eq!(gain.acquisition_cost, d("1005.00"));
        assert_eq!(gain.current_value, d("1200"));
        assert_eq!(gain.unrealized_gain, d("195.00"));
        assert_eq!(gain.exchange_rate, None);
        assert_eq!(gain.purchase_date, purchase().date());
    }

    #[test]
    fn test_mxn_is_converted_with_exact_division() {
        let gain = compute_gain(
            &fact("MXN", "4", "200.00"),
            purchase(),
            d("12"),
            Some(d("20")),
        )
        .unwrap();
        assert_eq!(gain.unit_price, d("10"));
        assert_eq!(gain.acquisition_cost, d("40"));
        assert_eq!(gain.current_value, d("48"));
        assert_eq!(gain.unrealized_gain, d("8"));
        assert_eq!(gain.exchange_rate, Some(d("20")));
    }

    #[test]
    fn test_mxn_conversion_does_not_drift() {
        let gain = compute_gain(
            &fact("MXN", "3", "17.1375"),
            purchase(),
            d("1"),
            Some(d("17.1375")),
        )
        .unwrap();
        assert_eq!(gain.unit_price, Decimal::ONE);
        assert_eq!(gain.acquisition_cost, d("3"));
    }

    #[test]
    fn test_mxn_without_rate_fails() {
        let err = compute_gain(&fact("MXN", "1", "100"), purchase(), d("10"), None).unwrap_err();
        assert_eq!(err, PipelineError::RateUnavailable(purchase().date()));

        let err = compute_gain(&fact("MXN", "1", "100"), purchase(), d("10"), Some(Decimal::ZERO))
            .unwrap_err();
        assert_eq!(err.class_name(), "RateUnavailable");
    }

    #[test]
    fn test_lowercase_currency_code_is_accepted() {
        assert!(compute_gain(&fact("usd", "1", "1"), purchase(), d("2"), None).is_ok());
    }

    #[test]
    fn test_unsupported_currency_produces_no_result() {
        for code in ["EUR", "", "PESOS"] {
            let err = compute_gain(&fact(code, "1", "1"), purchase(), d("2"), Some(d("18")))
                .unwrap_err();
            assert_eq!(err.class_name(), "UnsupportedCurrency", "{code}");
        }
    }

    #[test]
    fn test_loss_is_negative() {
        let gain = compute_gain(&fact("USD", "2", "50"), purchase(), d("40"), None).unwrap();
        assert_eq!(gain.unrealized_gain, d("-20"));
    }
}
