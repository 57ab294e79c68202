//! Merges the mapped dataset with resolved cross-references into annotated
//! parameters ready for emission.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::{Dataset, ParameterEntry, ProteinRecord};
use crate::domain::{ChebiId, ParameterKind, Unit};
use crate::xref::{ChemicalCrossReference, CrossReferenceMap};

/// Collections never written to the model.
const EXCLUDED_COLLECTIONS: [&str; 2] = ["bindingdb", "pdb"];

/// Biological qualifiers used by the model annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Qualifier {
    #[serde(rename = "BQB_IS")]
    Is,
    #[serde(rename = "BQB_IS_DESCRIBED_BY")]
    IsDescribedBy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub qualifier: Qualifier,
    pub collection: String,
    pub term: String,
}

impl Annotation {
    pub fn is(collection: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            qualifier: Qualifier::Is,
            collection: collection.into(),
            term: term.into(),
        }
    }

    pub fn described_by(collection: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            qualifier: Qualifier::IsDescribedBy,
            collection: collection.into(),
            term: term.into(),
        }
    }

    /// identifiers.org style `collection/term`.
    pub fn resource(&self) -> String {
        format!("{}/{}", self.collection, self.term)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedParameter {
    pub id: String,
    pub name: String,
    pub kind: ParameterKind,
    pub value: f64,
    pub units: Unit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sbo_term: Option<String>,
    pub annotations: Vec<Annotation>,
}

/// Walks records in dataset order and kinds in [`ParameterKind`] order,
/// numbering parameters `PB000001`, `PB000002`, ...
pub fn merge(dataset: &Dataset, xrefs: &CrossReferenceMap) -> Vec<AnnotatedParameter> {
    let mut parameters = Vec::with_capacity(dataset.parameter_count());
    let mut counter = 1usize;

    for record in dataset.iter() {
        let key = record.key();
        let shared = protein_annotations(record);
        for (kind, entry) in record.entries() {
            let mut annotations = shared.clone();
            if let Some(sbo) = kind.sbo_term() {
                annotations.push(Annotation::is("sbo", sbo));
            }
            for pubmed in &entry.pubmeds {
                annotations.push(Annotation::described_by("pubmed", pubmed.as_str()));
            }
            if let Some(chebi) = &entry.chebi {
                annotations.extend(chemical_annotations(chebi, xrefs.get(chebi.number())));
            }

            parameters.push(AnnotatedParameter {
                id: format!("PB{counter:06}"),
                name: parameter_name(kind, &key, record, entry),
                kind,
                value: entry.value,
                units: entry.units,
                sbo_term: kind.sbo_term().map(str::to_string),
                annotations,
            });
            counter += 1;
        }
    }

    debug!(parameters = parameters.len(), "merged annotations");
    parameters
}

fn parameter_name(
    kind: ParameterKind,
    key: &str,
    record: &ProteinRecord,
    entry: &ParameterEntry,
) -> String {
    match &entry.substrate {
        Some(substrate) => format!("{kind} {key} {} ({substrate})", record.organism),
        None => format!("{kind} {key} {}", record.organism),
    }
}

/// Annotations shared by every parameter of one protein.
pub fn protein_annotations(record: &ProteinRecord) -> Vec<Annotation> {
    let mut annotations = vec![
        Annotation::is("brenda", record.ec.as_str()),
        Annotation::is("ec-code", record.ec.as_str()),
        Annotation::is("taxonomy", record.taxonomy.to_string()),
    ];
    if let Some(uniprot) = &record.uniprot {
        annotations.push(Annotation::is("uniprot", uniprot.as_str()));
    }
    for tissue in &record.tissues {
        annotations.push(Annotation::is("bto", tissue.replace('_', ":")));
    }
    annotations
}

/// Foreign ids of the cross-reference record followed by its InChIKey and
/// ChEBI synonyms, or a single ChEBI annotation when the record is missing or
/// has nothing emittable.
pub fn chemical_annotations(
    chebi: &ChebiId,
    record: Option<&ChemicalCrossReference>,
) -> Vec<Annotation> {
    let emittable = record
        .map(|record| {
            record
                .collections
                .iter()
                .filter_map(|(collection, ids)| {
                    emitted_collection(collection).map(|collection| (collection, ids))
                })
                .flat_map(|(collection, ids)| {
                    ids.iter().map(move |id| Annotation::is(collection, id.as_str()))
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let Some(record) = record.filter(|_| !emittable.is_empty()) else {
        return vec![Annotation::is("chebi", chebi.curie())];
    };

    let own = chebi.curie();
    let mut annotations = emittable;
    if let Some(inchikey) = &record.inchikey {
        annotations.push(Annotation::is("inchikey", inchikey.as_str()));
    }
    annotations.extend(
        record
            .chebi
            .iter()
            .filter(|id| **id != own)
            .map(|id| Annotation::is("chebi", id.as_str())),
    );
    annotations
}

fn emitted_collection(collection: &str) -> Option<&str> {
    if EXCLUDED_COLLECTIONS.contains(&collection) {
        return None;
    }
    Some(match collection {
        "brenda" => "brenda.ligand",
        "metabolights" => "metabolights.compound",
        other => other,
    })
}
