//! Strict decoding of raw proposer output.
//!
//! Separates records that cannot be read as a proposal at all from records
//! that parse but may still break a business rule.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tradeguard_core::types::TradeProposal;

/// One record of a raw batch after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRecord {
    Proposal(TradeProposal),
    /// Not a JSON object
    Malformed { detail: String },
}

/// Decode a raw batch.
///
/// Accepts an array of records, an object wrapping the array under
/// `decisions`, or a single record object. Anything else decodes as one
/// malformed record.
pub fn decode_batch(raw: &Value) -> Vec<DecodedRecord> {
    match raw {
        Value::Array(records) => records.iter().map(decode_record).collect(),
        Value::Object(map) => match map.get("decisions") {
            Some(Value::Array(records)) => records.iter().map(decode_record).collect(),
            _ => vec![decode_record(raw)],
        },
        other => vec![DecodedRecord::Malformed {
            detail: format!("batch is {}, expected a list of records", json_kind(other)),
        }],
    }
}

/// Decode a single record.
///
/// Fields of the wrong JSON type read as missing.
pub fn decode_record(raw: &Value) -> DecodedRecord {
    let Value::Object(map) = raw else {
        return DecodedRecord::Malformed {
            detail: format!("record is {}, expected an object", json_kind(raw)),
        };
    };

    let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

    DecodedRecord::Proposal(TradeProposal {
        action: text("action"),
        ticker: text("ticker"),
        amount_usd: map.get("amount_usd").and_then(parse_amount),
        reason: text("reason"),
    })
}

/// Read a dollar amount from a JSON number or numeric string.
pub fn parse_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches('$')
                .chars()
                .filter(|c| *c != ',')
                .collect();
            parse_decimal(&cleaned)
        }
        _ => None,
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
