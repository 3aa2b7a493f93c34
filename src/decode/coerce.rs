// src/decode/coerce.rs

use serde_json::Value;
use std::fmt;

/// How a raw CSV cell is turned into a typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Kept verbatim; an empty cell stays an empty string.
    Text,
    /// Empty (or whitespace-only) cells become null.
    NullableText,
    Integer,
    NullableInteger,
    Float,
    NullableFloat,
    /// Only the exact literal `true` decodes to true.
    Bool,
    /// Serialized JSON embedded in the cell.
    Json(JsonFallback),
}

/// Value substituted when an embedded JSON cell is empty or unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonFallback {
    EmptyList,
    EmptyObject,
    Null,
}

impl JsonFallback {
    pub fn value(self) -> Value {
        match self {
            JsonFallback::EmptyList => Value::Array(Vec::new()),
            JsonFallback::EmptyObject => Value::Object(serde_json::Map::new()),
            JsonFallback::Null => Value::Null,
        }
    }

    /// Whether `v` has the shape this fallback stands in for.
    fn accepts(self, v: &Value) -> bool {
        match self {
            JsonFallback::EmptyList => v.is_array(),
            JsonFallback::EmptyObject => v.is_object(),
            JsonFallback::Null => true,
        }
    }
}

/// A single typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Json(Value),
    /// Not-a-number sentinel: a non-nullable numeric cell with no usable value.
    /// Holds the raw text so the row can be reported before it is rejected.
    Invalid(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Null or an empty string.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// JSON form sent to the store. `None` for the invalid sentinel.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Cell::Null => Some(Value::Null),
            Cell::Text(s) => Some(Value::String(s.clone())),
            Cell::Int(i) => Some(Value::from(*i)),
            Cell::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number),
            Cell::Bool(b) => Some(Value::Bool(*b)),
            Cell::Json(v) => Some(v.clone()),
            Cell::Invalid(_) => None,
        }
    }
}

/// Why a cell did not decode cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefectKind {
    /// Non-nullable numeric cell was empty.
    MissingNumber,
    /// Numeric cell held text that is not a finite number.
    BadNumber,
    /// Embedded JSON could not be parsed or had the wrong shape.
    MalformedJson,
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DefectKind::MissingNumber => "missing number",
            DefectKind::BadNumber => "malformed number",
            DefectKind::MalformedJson => "malformed nested data",
        };
        f.write_str(s)
    }
}

/// Apply `rule` to `raw`. A defect never aborts: the returned cell is always
/// usable (a default, null, or the invalid sentinel).
pub fn coerce(raw: &str, rule: Coercion) -> (Cell, Option<DefectKind>) {
    match rule {
        Coercion::Text => (Cell::Text(raw.to_string()), None),
        Coercion::NullableText => {
            if raw.trim().is_empty() {
                (Cell::Null, None)
            } else {
                (Cell::Text(raw.to_string()), None)
            }
        }
        Coercion::Integer => numeric(raw, false, parse_int),
        Coercion::NullableInteger => numeric(raw, true, parse_int),
        Coercion::Float => numeric(raw, false, parse_float),
        Coercion::NullableFloat => numeric(raw, true, parse_float),
        // no trimming, no case folding
        Coercion::Bool => (Cell::Bool(raw == "true"), None),
        Coercion::Json(fallback) => json(raw, fallback),
    }
}

fn numeric(
    raw: &str,
    nullable: bool,
    parse: fn(&str) -> Option<Cell>,
) -> (Cell, Option<DefectKind>) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return if nullable {
            (Cell::Null, None)
        } else {
            (Cell::Invalid(raw.to_string()), Some(DefectKind::MissingNumber))
        };
    }
    match parse(trimmed) {
        Some(cell) => (cell, None),
        None if nullable => (Cell::Null, Some(DefectKind::BadNumber)),
        None => (Cell::Invalid(raw.to_string()), Some(DefectKind::BadNumber)),
    }
}

fn parse_int(s: &str) -> Option<Cell> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Cell::Int(i));
    }
    // exports sometimes render integer columns as "3.0"
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(Cell::Int(f as i64))
    } else {
        None
    }
}

fn parse_float(s: &str) -> Option<Cell> {
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Cell::Float)
}

fn json(raw: &str, fallback: JsonFallback) -> (Cell, Option<DefectKind>) {
    if raw.trim().is_empty() {
        return (Cell::Json(fallback.value()), None);
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(v) if fallback.accepts(&v) => (Cell::Json(v), None),
        _ => (
            Cell::Json(fallback.value()),
            Some(DefectKind::MalformedJson),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bool_only_accepts_exact_true_literal() {
        assert_eq!(coerce("true", Coercion::Bool), (Cell::Bool(true), None));
        for raw in ["False", "false", "TRUE", "True", "1", "", "yes", " true", "true "] {
            assert_eq!(
                coerce(raw, Coercion::Bool),
                (Cell::Bool(false), None),
                "input {:?}",
                raw
            );
        }
    }

    #[test]
    fn empty_numeric_cells() {
        assert_eq!(coerce("", Coercion::NullableInteger), (Cell::Null, None));
        assert_eq!(coerce("  ", Coercion::NullableFloat), (Cell::Null, None));
        assert_eq!(
            coerce("", Coercion::Float),
            (Cell::Invalid(String::new()), Some(DefectKind::MissingNumber))
        );
        assert_eq!(
            coerce("", Coercion::Integer),
            (Cell::Invalid(String::new()), Some(DefectKind::MissingNumber))
        );
    }

    #[test]
    fn malformed_numeric_cells() {
        assert_eq!(
            coerce("abc", Coercion::NullableInteger),
            (Cell::Null, Some(DefectKind::BadNumber))
        );
        assert_eq!(
            coerce("12abc", Coercion::Integer),
            (Cell::Invalid("12abc".into()), Some(DefectKind::BadNumber))
        );
        assert_eq!(
            coerce("NaN", Coercion::Float),
            (Cell::Invalid("NaN".into()), Some(DefectKind::BadNumber))
        );
    }

    #[test]
    fn numeric_parsing() {
        assert_eq!(coerce(" 42 ", Coercion::Integer), (Cell::Int(42), None));
        assert_eq!(coerce("3.0", Coercion::Integer), (Cell::Int(3), None));
        assert_eq!(coerce("12.50", Coercion::Float), (Cell::Float(12.5), None));
        assert!(matches!(
            coerce("3.5", Coercion::Integer),
            (Cell::Invalid(_), Some(DefectKind::BadNumber))
        ));
    }

    #[test]
    fn json_cells_degrade_to_fallback() {
        assert_eq!(
            coerce("not-json", Coercion::Json(JsonFallback::EmptyList)),
            (Cell::Json(json!([])), Some(DefectKind::MalformedJson))
        );
        assert_eq!(
            coerce("", Coercion::Json(JsonFallback::EmptyList)),
            (Cell::Json(json!([])), None)
        );
        assert_eq!(
            coerce(r#"{"qty":1}"#, Coercion::Json(JsonFallback::EmptyList)),
            (Cell::Json(json!([])), Some(DefectKind::MalformedJson))
        );
        assert_eq!(
            coerce(
                r#"[{"product_id":1,"qty":2}]"#,
                Coercion::Json(JsonFallback::EmptyList)
            ),
            (Cell::Json(json!([{"product_id": 1, "qty": 2}])), None)
        );
        assert_eq!(
            coerce(r#"{"mon":"9-18"}"#, Coercion::Json(JsonFallback::EmptyObject)),
            (Cell::Json(json!({"mon": "9-18"})), None)
        );
    }

    #[test]
    fn invalid_sentinel_has_no_json_form() {
        assert_eq!(Cell::Invalid("x".into()).to_json(), None);
        assert_eq!(Cell::Int(7).to_json(), Some(json!(7)));
        assert_eq!(Cell::Null.to_json(), Some(serde_json::Value::Null));
    }
}
