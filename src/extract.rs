//! Extraction and ontology mapping of kinetic parameters.
//!
//! Walks every protein record of a [`RecordSource`], keeps the parameter
//! entries that are mapped well enough to be annotated, and tallies every raw
//! organism, tissue and substance name that could not be mapped.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dataset::{Dataset, ParameterEntry, ProteinRecord};
use crate::domain::{ChebiId, EcCode, ParameterKind, Unit};
use crate::source::{RecordSource, SourceParameter, SourceProtein};

/// Multiset of raw values that could not be mapped to an ontology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnmappedCounter {
    counts: BTreeMap<String, usize>,
}

impl UnmappedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>) {
        *self.counts.entry(key.into()).or_insert(0) += 1;
    }

    pub fn get(&self, key: &str) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Sum of all occurrences, duplicates included.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Entries by descending count; ties keep key order.
    pub fn most_common(&self) -> Vec<(&str, usize)> {
        let mut items = self
            .counts
            .iter()
            .map(|(key, count)| (key.as_str(), *count))
            .collect::<Vec<_>>();
        items.sort_by(|a, b| b.1.cmp(&a.1));
        items
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnmappedReport {
    pub organisms: UnmappedCounter,
    pub tissues: UnmappedCounter,
    pub substances: UnmappedCounter,
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub dataset: Dataset,
    pub unmapped: UnmappedReport,
    pub proteins_seen: usize,
    pub invalid_records: usize,
}

pub fn extract(source: &dyn RecordSource) -> Extraction {
    let mut extraction = Extraction::default();

    for ec in source.ec_codes() {
        for protein in source.proteins(&ec) {
            extraction.proteins_seen += 1;
            if let Some(record) = map_protein(protein, &mut extraction) {
                extraction.dataset.insert(record);
            }
        }
    }

    info!(
        proteins = extraction.proteins_seen,
        retained = extraction.dataset.len(),
        parameters = extraction.dataset.parameter_count(),
        "extraction finished"
    );
    extraction
}

/// Counters see every record, including ones dropped below for an invalid
/// EC code or missing taxonomy.
fn map_protein(protein: &SourceProtein, extraction: &mut Extraction) -> Option<ProteinRecord> {
    let unmapped = &mut extraction.unmapped;

    if protein.taxonomy.is_none() {
        unmapped.organisms.add(protein.organism.as_str());
    }

    let mut tissues = BTreeSet::new();
    for tissue in &protein.tissues {
        match tissue.bto.as_deref() {
            Some(bto) => {
                tissues.insert(bto.to_string());
            }
            None => unmapped.tissues.add(tissue.data.as_str()),
        }
    }

    let mut data = BTreeMap::new();
    for kind in ParameterKind::ALL {
        let items = protein.parameters(kind);
        if items.is_empty() {
            continue;
        }
        let mapped = if kind.requires_substrate() {
            mapped_substances(items, &mut unmapped.substances)
        } else {
            items.iter().collect()
        };
        let entries = mapped
            .into_iter()
            .filter_map(|item| to_entry(protein, kind, item))
            .collect::<Vec<_>>();
        if !entries.is_empty() {
            data.insert(kind, entries);
        }
    }

    let ec = match protein.ec.parse::<EcCode>() {
        Ok(ec) => ec,
        Err(err) => {
            warn!(protein_id = protein.protein_id, "skipping record: {err}");
            extraction.invalid_records += 1;
            return None;
        }
    };
    let taxonomy = protein.taxonomy?;
    if data.is_empty() {
        return None;
    }

    Some(ProteinRecord {
        ec,
        protein_id: protein.protein_id,
        organism: protein.organism.clone(),
        taxonomy,
        tissues,
        uniprot: protein.uniprot.clone(),
        data,
    })
}

/// Keeps entries whose substrate carries a ChEBI id; substrates without one
/// are counted. Entries without any substrate are dropped.
fn mapped_substances<'a>(
    items: &'a [SourceParameter],
    substances: &mut UnmappedCounter,
) -> Vec<&'a SourceParameter> {
    let mut mapped = Vec::new();
    for item in items {
        let Some(substrate) = item.substrate.as_deref() else {
            continue;
        };
        if item.chebi.is_some() {
            mapped.push(item);
        } else {
            substances.add(substrate);
        }
    }
    mapped
}

fn to_entry(
    protein: &SourceProtein,
    kind: ParameterKind,
    item: &SourceParameter,
) -> Option<ParameterEntry> {
    let value = item.value?;
    let units = match item.units.as_deref().map(str::parse::<Unit>) {
        Some(Ok(unit)) => unit,
        Some(Err(err)) => {
            debug!(protein_id = protein.protein_id, %kind, "dropping entry: {err}");
            return None;
        }
        None => {
            debug!(protein_id = protein.protein_id, %kind, "dropping entry without unit");
            return None;
        }
    };
    let chebi = match item.chebi.as_deref().map(str::parse::<ChebiId>) {
        Some(Ok(id)) => Some(id),
        Some(Err(err)) => {
            debug!(protein_id = protein.protein_id, %kind, "dropping entry: {err}");
            return None;
        }
        None => None,
    };
    let pubmeds = item
        .refs
        .iter()
        .filter_map(|reference| protein.pubmed_for(*reference))
        .map(str::to_string)
        .collect();

    Some(ParameterEntry {
        value,
        units,
        substrate: item.substrate.clone(),
        chebi,
        pubmeds,
    })
}
