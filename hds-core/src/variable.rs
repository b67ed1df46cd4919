use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// What a variable describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Attribute,
    Forcing,
    Streamflow,
}

/// The two kinds of daily time series a region publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Forcing,
    Streamflow,
}

impl From<SeriesKind> for VariableKind {
    fn from(kind: SeriesKind) -> Self {
        match kind {
            SeriesKind::Forcing => VariableKind::Forcing,
            SeriesKind::Streamflow => VariableKind::Streamflow,
        }
    }
}

impl VariableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableKind::Attribute => "attribute",
            VariableKind::Forcing => "forcing",
            VariableKind::Streamflow => "streamflow",
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        VariableKind::from(*self).fmt(f)
    }
}

impl FromStr for VariableKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attribute" | "attr" => Ok(VariableKind::Attribute),
            "forcing" => Ok(VariableKind::Forcing),
            "streamflow" | "flow" => Ok(VariableKind::Streamflow),
            other => Err(format!("unknown variable kind '{}'", other)),
        }
    }
}

/// A canonical variable: one name, one unit, whatever region it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub unit: String,
    pub kind: VariableKind,
}

impl Variable {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, kind: VariableKind) -> Self {
        Variable {
            name: name.into(),
            unit: unit.into(),
            kind,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parsing() {
        assert_eq!("Forcing".parse::<VariableKind>(), Ok(VariableKind::Forcing));
        assert_eq!("attr".parse::<VariableKind>(), Ok(VariableKind::Attribute));
        assert!("weather".parse::<VariableKind>().is_err());
    }

    #[test]
    fn display_shows_unit() {
        let v = Variable::new("precipitation", "mm/day", VariableKind::Forcing);
        assert_eq!(v.to_string(), "precipitation [mm/day]");
    }
}
