use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::KinanError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EcCode(String);

impl EcCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// EC number with dots replaced, usable inside SBML-style identifiers.
    pub fn id_fragment(&self) -> String {
        self.0.replace('.', "_")
    }
}

impl fmt::Display for EcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EcCode {
    type Err = KinanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN
            .get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+\.[A-Za-z]?\d+$").expect("valid EC regex"));
        let normalized = value.trim();
        if !pattern.is_match(normalized) {
            return Err(KinanError::InvalidEcCode(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

impl TryFrom<String> for EcCode {
    type Error = KinanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EcCode> for String {
    fn from(value: EcCode) -> Self {
        value.0
    }
}

/// ChEBI identifier, stored as its bare number.
///
/// Accepts `CHEBI_5931`, `CHEBI:5931` and `5931`. Serializes in the
/// underscore form used by the record source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChebiId(String);

impl ChebiId {
    pub fn number(&self) -> &str {
        &self.0
    }

    pub fn curie(&self) -> String {
        format!("CHEBI:{}", self.0)
    }
}

impl fmt::Display for ChebiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CHEBI_{}", self.0)
    }
}

impl FromStr for ChebiId {
    type Err = KinanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let number = trimmed
            .strip_prefix("CHEBI_")
            .or_else(|| trimmed.strip_prefix("CHEBI:"))
            .unwrap_or(trimmed);
        let is_valid = !number.is_empty() && number.chars().all(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(KinanError::InvalidChebiId(value.to_string()));
        }
        Ok(Self(number.to_string()))
    }
}

impl TryFrom<String> for ChebiId {
    type Error = KinanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChebiId> for String {
    fn from(value: ChebiId) -> Self {
        value.to_string()
    }
}

/// Kinetic parameter categories, ordered as they are processed and emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParameterKind {
    #[serde(rename = "KM")]
    Km,
    #[serde(rename = "KI")]
    Ki,
    #[serde(rename = "TN")]
    Tn,
    #[serde(rename = "KKM")]
    Kkm,
    #[serde(rename = "SA")]
    Sa,
}

impl ParameterKind {
    pub const ALL: [ParameterKind; 5] = [
        ParameterKind::Km,
        ParameterKind::Ki,
        ParameterKind::Tn,
        ParameterKind::Kkm,
        ParameterKind::Sa,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParameterKind::Km => "KM",
            ParameterKind::Ki => "KI",
            ParameterKind::Tn => "TN",
            ParameterKind::Kkm => "KKM",
            ParameterKind::Sa => "SA",
        }
    }

    /// Kinds whose entries are only kept when the substrate maps to ChEBI.
    pub fn requires_substrate(self) -> bool {
        matches!(
            self,
            ParameterKind::Km | ParameterKind::Ki | ParameterKind::Tn
        )
    }

    /// kcat/KM has no SBO term.
    pub fn sbo_term(self) -> Option<&'static str> {
        match self {
            ParameterKind::Km => Some("SBO:0000027"),
            ParameterKind::Ki => Some("SBO:0000261"),
            ParameterKind::Tn => Some("SBO:0000025"),
            ParameterKind::Sa => Some("SBO:0000558"),
            ParameterKind::Kkm => None,
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "mM")]
    Millimolar,
    #[serde(rename = "1/s")]
    PerSecond,
    #[serde(rename = "1/mM/s")]
    PerMillimolarPerSecond,
    #[serde(rename = "µmol/min/mg")]
    MicromolePerMinutePerMilligram,
}

impl Unit {
    pub const ALL: [Unit; 4] = [
        Unit::Millimolar,
        Unit::PerSecond,
        Unit::PerMillimolarPerSecond,
        Unit::MicromolePerMinutePerMilligram,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Millimolar => "mM",
            Unit::PerSecond => "1/s",
            Unit::PerMillimolarPerSecond => "1/mM/s",
            Unit::MicromolePerMinutePerMilligram => "µmol/min/mg",
        }
    }

    /// Identifier of the unit definition in the emitted model.
    pub fn model_id(self) -> &'static str {
        match self {
            Unit::Millimolar => "mM",
            Unit::PerSecond => "per_s",
            Unit::PerMillimolarPerSecond => "per_mM_s",
            Unit::MicromolePerMinutePerMilligram => "mumol_per_min_mg",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Unit {
    type Err = KinanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Unit::ALL
            .into_iter()
            .find(|unit| unit.as_str() == trimmed)
            .ok_or_else(|| KinanError::InvalidUnit(value.to_string()))
    }
}
