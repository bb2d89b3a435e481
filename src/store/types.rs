use crate::analysis::units::ParsedUnit;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::RegistryError;

/// A dotted parameter identifier such as `topology.chi_eff`.
///
/// The first segment is the group the parameter is exported under, the
/// rest is its name within that group. Paths are validated on construction
/// so a typo'd separator or an empty segment never reaches the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParamPath(String);

impl ParamPath {
    pub fn parse(raw: impl Into<String>) -> Result<Self, RegistryError> {
        let raw = raw.into();
        let mut segments = 0;
        for segment in raw.split('.') {
            if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(RegistryError::InvalidPath { path: raw });
            }
            segments += 1;
        }
        if segments < 2 {
            return Err(RegistryError::InvalidPath { path: raw });
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str { &self.0 }

    /// The leading segment (`topology` in `topology.chi_eff`).
    pub fn group(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(g, _)| g)
    }

    /// Everything after the group (`chi_eff` in `topology.chi_eff`).
    pub fn name(&self) -> &str {
        self.0.split_once('.').map_or("", |(_, n)| n)
    }
}

impl fmt::Display for ParamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl TryFrom<String> for ParamPath {
    type Error = RegistryError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(value) }
}

impl TryFrom<&str> for ParamPath {
    type Error = RegistryError;
    fn try_from(value: &str) -> Result<Self, Self::Error> { Self::parse(value) }
}

impl From<ParamPath> for String {
    fn from(path: ParamPath) -> Self { path.0 }
}

impl AsRef<str> for ParamPath {
    fn as_ref(&self) -> &str { &self.0 }
}

/// Represents the physical unit of a parameter.
///
/// Parsable unit strings are stored in canonical form (`s*m` becomes `m*s`,
/// `m^2/m` becomes `m`), so two spellings of the same unit compare equal.
/// Anything the parser rejects is kept verbatim. A blank string stays blank:
/// dimensionless values are spelled `"1"`, and the registry and reference
/// table refuse a missing unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Unit(String);

impl Unit {
    pub fn new(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self(String::new());
        }
        match ParsedUnit::from_str(raw) {
            Ok(parsed) => Self(parsed.to_string()),
            Err(()) => Self(raw.trim().to_string()),
        }
    }

    pub fn dimensionless() -> Self { Self("1".to_string()) }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn is_dimensionless(&self) -> bool { self.0 == "1" }

    pub fn is_missing(&self) -> bool { self.0.is_empty() }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<String> for Unit {
    fn from(raw: String) -> Self { Self::new(&raw) }
}

impl From<&str> for Unit {
    fn from(raw: &str) -> Self { Self::new(raw) }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self { unit.0 }
}

/// How a parameter's value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Follows directly from the geometric construction.
    Geometric,
    /// Computed from other parameters.
    Derived,
    /// Supplied from outside the model (experimental input, convention).
    Input,
    /// Fitted to experimental data.
    Calibrated,
    /// A model prediction awaiting experimental confirmation.
    Predicted,
    /// A declared fallback used because the producing module is absent.
    Stub,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Geometric,
        Category::Derived,
        Category::Input,
        Category::Calibrated,
        Category::Predicted,
        Category::Stub,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Geometric => "GEOMETRIC",
            Category::Derived => "DERIVED",
            Category::Input => "INPUT",
            Category::Calibrated => "CALIBRATED",
            Category::Predicted => "PREDICTED",
            Category::Stub => "STUB",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// The atomic unit of data in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
    Array(Vec<ParamValue>),
}

impl ParamValue {
    /// Numeric view of the value. Integers widen to `f64`; text and arrays have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// True when every float inside the value (recursively) is finite.
    pub fn is_finite(&self) -> bool {
        match self {
            ParamValue::Float(v) => v.is_finite(),
            ParamValue::Int(_) | ParamValue::Text(_) => true,
            ParamValue::Array(items) => items.iter().all(ParamValue::is_finite),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Text(_) => "string",
            ParamValue::Array(_) => "array",
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self { ParamValue::Float(v) }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self { ParamValue::Int(v) }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self { ParamValue::Text(v.to_string()) }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self { ParamValue::Text(v) }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self { ParamValue::Array(v.into_iter().map(ParamValue::Float).collect()) }
}

/// Identifies the simulation module that produced a value.
pub type ModuleId = String;

/// Category and source of a stored value, used for transparency audits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub category: Category,
    pub source: String,
    pub produced_by: Option<ModuleId>,
}

/// A stored parameter: value, unit and provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub path: ParamPath,
    pub value: ParamValue,
    pub unit: Unit,
    pub category: Category,
    pub source: String,
    /// Empty for pre-seeded base inputs.
    pub produced_by: Option<ModuleId>,
    /// Monotonic write counter.
    pub written_at: u64,
}

impl Parameter {
    pub fn provenance(&self) -> Provenance {
        Provenance {
            category: self.category,
            source: self.source.clone(),
            produced_by: self.produced_by.clone(),
        }
    }
}

/// Everything needed to write one parameter, minus the bookkeeping the
/// registry assigns itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamEntry {
    pub value: ParamValue,
    pub unit: Unit,
    pub category: Category,
    pub source: String,
}

impl ParamEntry {
    pub fn new(value: impl Into<ParamValue>, unit: impl Into<Unit>, category: Category, source: impl Into<String>) -> Self {
        Self { value: value.into(), unit: unit.into(), category, source: source.into() }
    }
}
