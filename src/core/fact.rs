//! Structured facts returned by the document extraction model.

use crate::core::error::PipelineError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::str::FromStr;

/// Raw key/value mapping produced by an extraction call.
pub type FactMap = serde_json::Map<String, Value>;

const TICKER_KEYS: &[&str] = &["ticker", "emisora_ticker"];
const NAME_KEYS: &[&str] = &["asset_name", "nombre_activo"];
const DATE_KEYS: &[&str] = &["purchase_date", "fecha_compra", "fecha"];
const QUANTITY_KEYS: &[&str] = &["quantity", "cantidad_titulos"];
const PRICE_KEYS: &[&str] = &["unit_price", "precio_por_titulo"];
const CURRENCY_KEYS: &[&str] = &["currency", "moneda"];

/// Keys under which receipts and statements report their date.
pub const DATE_FIELD_KEYS: &[&str] = DATE_KEYS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Mxn,
    Usd,
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Currency::Mxn => "MXN",
                Currency::Usd => "USD",
            }
        )
    }
}

impl FromStr for Currency {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MXN" => Ok(Currency::Mxn),
            "USD" => Ok(Currency::Usd),
            _ => Err(PipelineError::UnsupportedCurrency(s.to_string())),
        }
    }
}

/// An investment purchase as read from a statement, before any validation
/// of its date or currency.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFact {
    pub ticker: String,
    pub asset_name: String,
    pub purchase_date: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub currency_code: String,
    pub extra: FactMap,
}

impl ExtractedFact {
    /// Reads an investment fact, accepting both English and Spanish field names.
    pub fn from_map(map: &FactMap) -> Result<Self, PipelineError> {
        let known: Vec<&str> = [
            TICKER_KEYS,
            NAME_KEYS,
            DATE_KEYS,
            QUANTITY_KEYS,
            PRICE_KEYS,
            CURRENCY_KEYS,
        ]
        .concat();
        let extra = map
            .iter()
            .filter(|(k, _)| !known.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(ExtractedFact {
            ticker: required_str(map, TICKER_KEYS)?,
            asset_name: required_str(map, NAME_KEYS)?,
            purchase_date: lookup(map, DATE_KEYS)
                .and_then(Value::as_str)
                .map(str::to_string),
            quantity: required_decimal(map, QUANTITY_KEYS)?,
            unit_price: required_decimal(map, PRICE_KEYS)?,
            currency_code: required_str(map, CURRENCY_KEYS)?,
            extra,
        })
    }
}

/// First non-null value stored under any of `keys`.
fn lookup<'a>(map: &'a FactMap, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find(|v| !v.is_null())
}

fn required_str(map: &FactMap, keys: &[&str]) -> Result<String, PipelineError> {
    lookup(map, keys)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PipelineError::MalformedFact(format!("missing field '{}'", keys[0])))
}

fn required_decimal(map: &FactMap, keys: &[&str]) -> Result<Decimal, PipelineError> {
    let value = lookup(map, keys)
        .ok_or_else(|| PipelineError::MalformedFact(format!("missing field '{}'", keys[0])))?;
    decimal_from_value(value).ok_or_else(|| {
        PipelineError::MalformedFact(format!("field '{}' is not a number: {value}", keys[0]))
    })
}

/// Converts a JSON number or numeric string without passing through `f64`.
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}
