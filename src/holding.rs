//! Canonical holding model and document-schema normalization.
//!
//! The store keeps one JSON document per (owner, ticker) key. Documents
//! written by earlier deployments of the dashboard carry different field
//! names (`coin_id`/`amount`, `symbol`/`amount`/`entry_price`,
//! `ativo`/`qtd`/`p_compra`); `decode_document` folds every shape into
//! the one canonical holding on read, and `to_document` always writes
//! the canonical shape back.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

const TICKER_FIELDS: [&str; 4] = ["ticker", "symbol", "coin_id", "ativo"];
const QUANTITY_FIELDS: [&str; 3] = ["quantity", "amount", "qtd"];
const COST_BASIS_FIELDS: [&str; 3] = ["cost_basis", "entry_price", "p_compra"];
const LAST_UPDATED_FIELDS: [&str; 2] = ["last_updated_ts_utc", "last_updated"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub owner: String,
    pub ticker: String,
    pub quantity: f64,
    pub cost_basis: Option<f64>,
    pub last_updated_ts_utc: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HoldingError {
    #[error("ticker must not be empty")]
    EmptyTicker,
    #[error("ticker '{0}' contains unsupported characters")]
    InvalidTicker(String),
    #[error("owner must not be empty")]
    EmptyOwner,
    #[error("field {field} has invalid value '{value}'")]
    InvalidField { field: &'static str, value: String },
    #[error("holding document is not a JSON object")]
    MalformedDocument,
    #[error("unrecognized holding document: no ticker or quantity field")]
    UnrecognizedDocument,
}

/// Uppercases and trims a raw ticker; every stored ticker goes through
/// this so `btc`, `Btc` and `BTC` address the same document.
pub fn normalize_ticker(raw: &str) -> Result<String, HoldingError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(HoldingError::EmptyTicker);
    }
    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(HoldingError::InvalidTicker(trimmed.to_string()));
    }
    Ok(trimmed.to_ascii_uppercase())
}

impl Holding {
    pub fn new(
        owner: &str,
        ticker: &str,
        quantity: f64,
        cost_basis: Option<f64>,
        last_updated_ts_utc: i64,
    ) -> Result<Self, HoldingError> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(HoldingError::EmptyOwner);
        }

        let ticker = normalize_ticker(ticker)?;
        validate_non_negative("quantity", quantity)?;
        if let Some(cost) = cost_basis {
            validate_non_negative("cost_basis", cost)?;
        }

        Ok(Self {
            owner: owner.to_string(),
            ticker,
            quantity,
            cost_basis,
            last_updated_ts_utc,
        })
    }

    /// Canonical document payload written on every upsert (full replace).
    pub fn to_document(&self) -> Value {
        let mut doc = json!({
            "ticker": self.ticker,
            "quantity": self.quantity,
            "owner": self.owner,
            "last_updated_ts_utc": self.last_updated_ts_utc,
        });
        if let Some(cost) = self.cost_basis {
            doc["cost_basis"] = json!(cost);
        }
        doc
    }
}

/// Normalizes a stored document into a canonical `Holding`.
///
/// `owner` and `fallback_ts_utc` come from the surrounding store row and
/// are used when the document itself does not carry them (legacy shapes
/// never do).
pub fn decode_document(
    owner: &str,
    fallback_ts_utc: i64,
    raw: &str,
) -> Result<Holding, HoldingError> {
    let payload: Value =
        serde_json::from_str(raw).map_err(|_| HoldingError::MalformedDocument)?;
    let map = payload
        .as_object()
        .ok_or(HoldingError::MalformedDocument)?;

    let (_, ticker_value) = first_present(map, &TICKER_FIELDS)
        .ok_or(HoldingError::UnrecognizedDocument)?;
    let ticker_raw = ticker_value
        .as_str()
        .ok_or(HoldingError::UnrecognizedDocument)?;

    let (quantity_field, quantity_value) =
        first_present(map, &QUANTITY_FIELDS).ok_or(HoldingError::UnrecognizedDocument)?;
    let quantity = value_as_f64(quantity_field, quantity_value)?;

    let cost_basis = match first_present(map, &COST_BASIS_FIELDS) {
        Some((field, value)) => Some(value_as_f64(field, value)?),
        None => None,
    };

    let document_owner = map
        .get("owner")
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(owner);

    let last_updated_ts_utc = first_present(map, &LAST_UPDATED_FIELDS)
        .and_then(|(_, value)| value.as_i64())
        .unwrap_or(fallback_ts_utc);

    Holding::new(document_owner, ticker_raw, quantity, cost_basis, last_updated_ts_utc)
}

fn first_present<'a>(
    map: &'a Map<String, Value>,
    fields: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
    fields
        .iter()
        .find_map(|field| map.get(*field).map(|value| (*field, value)))
}

fn value_as_f64(field: &'static str, value: &Value) -> Result<f64, HoldingError> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        // Legacy documents store numbers as strings.
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(number) if number.is_finite() => Ok(number),
        _ => Err(invalid_field(field, value)),
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), HoldingError> {
    if !value.is_finite() || value < 0.0 {
        return Err(HoldingError::InvalidField {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn invalid_field(field: &'static str, value: &Value) -> HoldingError {
    HoldingError::InvalidField {
        field,
        value: value.to_string(),
    }
}
