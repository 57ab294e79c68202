//! Mapped dataset: the unit of intermediate persistence between extraction
//! and cross-reference resolution.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::{ChebiId, EcCode, ParameterKind, Unit};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub value: f64,
    pub units: Unit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substrate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chebi: Option<ChebiId>,
    #[serde(default)]
    pub pubmeds: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinRecord {
    pub ec: EcCode,
    pub protein_id: u32,
    pub organism: String,
    pub taxonomy: u64,
    pub tissues: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniprot: Option<String>,
    pub data: BTreeMap<ParameterKind, Vec<ParameterEntry>>,
}

impl ProteinRecord {
    pub fn key(&self) -> String {
        format!("EC{}__PR{}", self.ec.id_fragment(), self.protein_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = (ParameterKind, &ParameterEntry)> {
        self.data
            .iter()
            .flat_map(|(kind, entries)| entries.iter().map(move |entry| (*kind, entry)))
    }
}

/// Protein records keyed by [`ProteinRecord::key`], in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<ProteinRecord>,
    index: HashMap<String, usize>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record; a record with the same key replaces the earlier one
    /// in place.
    pub fn insert(&mut self, record: ProteinRecord) {
        let key = record.key();
        match self.index.get(&key) {
            Some(position) => self.records[*position] = record,
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&ProteinRecord> {
        self.index.get(key).map(|position| &self.records[*position])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProteinRecord> {
        self.records.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.records.iter().map(ProteinRecord::key)
    }

    pub fn parameter_count(&self) -> usize {
        self.records
            .iter()
            .map(|record| record.data.values().map(Vec::len).sum::<usize>())
            .sum()
    }

    /// Distinct chemical identifiers referenced by any entry, sorted.
    pub fn chebi_ids(&self) -> BTreeSet<ChebiId> {
        self.records
            .iter()
            .flat_map(|record| record.entries())
            .filter_map(|(_, entry)| entry.chebi.clone())
            .collect()
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for record in &self.records {
            map.serialize_entry(&record.key(), record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Dataset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DatasetVisitor;

        impl<'de> Visitor<'de> for DatasetVisitor {
            type Value = Dataset;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of protein keys to protein records")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Dataset, A::Error> {
                let mut dataset = Dataset::new();
                while let Some((_key, record)) = access.next_entry::<String, ProteinRecord>()? {
                    dataset.insert(record);
                }
                Ok(dataset)
            }
        }

        deserializer.deserialize_map(DatasetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ec: &str, protein_id: u32) -> ProteinRecord {
        let mut data = BTreeMap::new();
        data.insert(
            ParameterKind::Km,
            vec![ParameterEntry {
                value: 1.5,
                units: Unit::Millimolar,
                substrate: Some("glucose".to_string()),
                chebi: Some("CHEBI_17234".parse().unwrap()),
                pubmeds: vec!["100".to_string()],
            }],
        );
        ProteinRecord {
            ec: ec.parse().unwrap(),
            protein_id,
            organism: "Homo sapiens".to_string(),
            taxonomy: 9606,
            tissues: BTreeSet::new(),
            uniprot: None,
            data,
        }
    }

    #[test]
    fn key_replaces_dots() {
        assert_eq!(record("2.7.1.1", 12).key(), "EC2_7_1_1__PR12");
    }

    #[test]
    fn json_keeps_insertion_order() {
        let mut dataset = Dataset::new();
        dataset.insert(record("2.7.1.1", 9));
        dataset.insert(record("1.1.1.1", 3));

        let json = serde_json::to_string(&dataset).unwrap();
        let first = json.find("EC2_7_1_1__PR9").unwrap();
        let second = json.find("EC1_1_1_1__PR3").unwrap();
        assert!(first < second);

        let back: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back.keys().collect::<Vec<_>>(),
            vec!["EC2_7_1_1__PR9", "EC1_1_1_1__PR3"]
        );
        assert_eq!(back, dataset);
    }

    #[test]
    fn chebi_ids_are_distinct() {
        let mut dataset = Dataset::new();
        dataset.insert(record("2.7.1.1", 1));
        dataset.insert(record("2.7.1.1", 2));
        assert_eq!(dataset.chebi_ids().len(), 1);
        assert_eq!(dataset.parameter_count(), 2);
    }
}
