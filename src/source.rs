//! Record source: the parsed enzyme database, seen as a black box.
//!
//! Records follow the layout of a brendapy JSON dump:
//! `{ "<ec>": { "<protein key>": { ...protein record... } } }`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};

use camino::Utf8Path;
use flate2::read::GzDecoder;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::ParameterKind;
use crate::error::KinanError;

pub trait RecordSource {
    /// All enzyme classification codes, in a stable order.
    fn ec_codes(&self) -> Vec<String>;

    /// Protein records filed under `ec`, in a stable order.
    fn proteins(&self, ec: &str) -> Vec<&SourceProtein>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceProtein {
    pub ec: String,
    pub protein_id: u32,
    #[serde(default)]
    pub organism: String,
    #[serde(default)]
    pub taxonomy: Option<u64>,
    #[serde(default)]
    pub uniprot: Option<String>,
    #[serde(rename = "ST", default)]
    pub tissues: Vec<SourceTissue>,
    #[serde(rename = "KM", default)]
    pub km: Vec<SourceParameter>,
    #[serde(rename = "KI", default)]
    pub ki: Vec<SourceParameter>,
    #[serde(rename = "TN", default)]
    pub tn: Vec<SourceParameter>,
    #[serde(rename = "KKM", default)]
    pub kkm: Vec<SourceParameter>,
    #[serde(rename = "SA", default)]
    pub sa: Vec<SourceParameter>,
    #[serde(default)]
    pub references: BTreeMap<u32, SourceReference>,
}

impl SourceProtein {
    pub fn parameters(&self, kind: ParameterKind) -> &[SourceParameter] {
        match kind {
            ParameterKind::Km => &self.km,
            ParameterKind::Ki => &self.ki,
            ParameterKind::Tn => &self.tn,
            ParameterKind::Kkm => &self.kkm,
            ParameterKind::Sa => &self.sa,
        }
    }

    pub fn pubmed_for(&self, reference: u32) -> Option<&str> {
        self.references
            .get(&reference)
            .and_then(|r| r.pubmed.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceTissue {
    pub data: String,
    #[serde(default)]
    pub bto: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceParameter {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub substrate: Option<String>,
    #[serde(default)]
    pub chebi: Option<String>,
    #[serde(default)]
    pub refs: Vec<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceReference {
    #[serde(default, deserialize_with = "string_or_number")]
    pub pubmed: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

/// Record source backed by a JSON dump, optionally gzip-compressed.
#[derive(Debug, Clone, Default)]
pub struct JsonRecordSource {
    records: BTreeMap<String, BTreeMap<String, SourceProtein>>,
}

impl JsonRecordSource {
    pub fn open(path: &Utf8Path) -> Result<Self, KinanError> {
        let file = File::open(path.as_std_path())
            .map_err(|err| KinanError::SourceRead(format!("{path}: {err}")))?;
        let reader = BufReader::new(file);
        if path.extension() == Some("gz") {
            Self::from_reader(GzDecoder::new(reader))
        } else {
            Self::from_reader(reader)
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, KinanError> {
        let records = serde_json::from_reader(reader)
            .map_err(|err| KinanError::SourceParse(err.to_string()))?;
        Ok(Self { records })
    }

    pub fn from_records(records: BTreeMap<String, BTreeMap<String, SourceProtein>>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.values().map(|proteins| proteins.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSource for JsonRecordSource {
    fn ec_codes(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    fn proteins(&self, ec: &str) -> Vec<&SourceProtein> {
        let mut proteins = self
            .records
            .get(ec)
            .map(|items| items.values().collect::<Vec<_>>())
            .unwrap_or_default();
        proteins.sort_by_key(|protein| protein.protein_id);
        proteins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_brendapy_layout() {
        let raw = r#"{
            "1.1.1.1": {
                "2": {"ec": "1.1.1.1", "protein_id": 2, "organism": "Mus musculus"},
                "10": {
                    "ec": "1.1.1.1",
                    "protein_id": 10,
                    "organism": "Homo sapiens",
                    "taxonomy": 9606,
                    "ST": [{"data": "liver", "bto": "BTO_0000759"}],
                    "KM": [{"value": 0.5, "units": "mM", "substrate": "ethanol",
                            "chebi": "CHEBI_16236", "refs": [1]}],
                    "references": {"1": {"pubmed": 123}}
                }
            }
        }"#;
        let source = JsonRecordSource::from_reader(raw.as_bytes()).unwrap();
        assert_eq!(source.len(), 2);

        let proteins = source.proteins("1.1.1.1");
        assert_eq!(proteins[0].protein_id, 2);
        assert_eq!(proteins[1].protein_id, 10);
        assert_eq!(proteins[1].pubmed_for(1), Some("123"));
        assert_eq!(proteins[1].parameters(ParameterKind::Km).len(), 1);
        assert!(proteins[0].taxonomy.is_none());
        assert!(source.proteins("9.9.9.9").is_empty());
    }
}
