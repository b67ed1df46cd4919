use serde::{Deserialize, Serialize};

/// Tokens providers write in place of a measurement.
pub const MISSING_TOKENS: [&str; 7] = ["", "NA", "N/A", "NaN", "nan", "null", "-"];

/// Numeric sentinels providers write in place of a measurement.
pub const MISSING_SENTINELS: [f64; 2] = [-999.0, -9999.0];

/// A single time series cell as read from a raw file.
/// - `Value(f64)`: an actual measurement in the raw unit
/// - `Missing`: a gap, whatever the provider wrote for it
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum Reading {
    Value(f64),
    Missing,
}

impl Reading {
    /// Parse a raw cell, mapping every known missing marker to `Missing`.
    pub fn parse(raw: &str) -> Reading {
        let s = raw.trim();
        if MISSING_TOKENS.contains(&s) {
            return Reading::Missing;
        }
        match s.parse::<f64>() {
            Ok(v) => Reading::from_f64(v),
            Err(_) => Reading::Missing,
        }
    }

    pub fn from_f64(v: f64) -> Reading {
        if !v.is_finite() || MISSING_SENTINELS.contains(&v) {
            Reading::Missing
        } else {
            Reading::Value(v)
        }
    }

    /// Discharge can't be negative; providers use negative numbers as gaps.
    pub fn non_negative(self) -> Reading {
        match self {
            Reading::Value(v) if v < 0.0 => Reading::Missing,
            other => other,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Reading::Value(v) => Some(*v),
            Reading::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Reading::Missing)
    }
}

impl From<Option<f64>> for Reading {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Reading::Missing, Reading::from_f64)
    }
}

/// A static catchment attribute.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
    Missing,
}

impl AttributeValue {
    /// Numbers stay numbers, known gap markers become `Missing`, anything
    /// else is kept as text.
    pub fn parse(raw: &str) -> AttributeValue {
        let s = raw.trim();
        if MISSING_TOKENS.contains(&s) {
            return AttributeValue::Missing;
        }
        match s.parse::<f64>() {
            Ok(v) => match Reading::from_f64(v) {
                Reading::Value(v) => AttributeValue::Number(v),
                Reading::Missing => AttributeValue::Missing,
            },
            Err(_) => AttributeValue::Text(s.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, AttributeValue::Missing)
    }
}
