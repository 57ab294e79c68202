//! Chemical cross-reference resolution.
//!
//! Every ChEBI id in the dataset is turned into InChI → InChIKey → UniChem
//! synonyms, filtered through the source allow-list and cached per id, so a
//! rerun only touches ids that were never resolved.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::ChebiId;
use crate::error::KinanError;
use crate::inchikey::{InchiKey, inchi_to_inchikey};
use crate::notation::{ResolverTables, SourceAllowList};
use crate::store::Store;
use crate::unichem::{LookupOutcome, SourceCompound, UniChemClient};

/// Aggregate map keyed by ChEBI number.
pub type CrossReferenceMap = BTreeMap<String, ChemicalCrossReference>;

/// Resolved cross-references of one ChEBI id.
///
/// `chebi` always contains the id itself in `CHEBI:<n>` form; any ChEBI
/// synonyms reported by UniChem are merged into it. Every other accepted
/// source lands in `collections`, keyed by identifiers.org collection name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChemicalCrossReference {
    #[serde(default)]
    pub chebi: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inchi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inchikey: Option<InchiKey>,
    #[serde(flatten)]
    pub collections: BTreeMap<String, BTreeSet<String>>,
}

impl ChemicalCrossReference {
    pub fn new(chebi: &ChebiId) -> Self {
        Self {
            chebi: BTreeSet::from([chebi.curie()]),
            ..Self::default()
        }
    }

    pub fn insert(&mut self, collection: &str, id: impl Into<String>) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.into());
    }

    /// Number of foreign ids across all collections.
    pub fn collection_id_count(&self) -> usize {
        self.collections.values().map(BTreeSet::len).sum()
    }

    /// Applies one UniChem synonym. Returns whether it was kept.
    pub fn accept(&mut self, sources: &SourceAllowList, compound: &SourceCompound) -> bool {
        let Some(collection) = sources.collection(&compound.src_id) else {
            return false;
        };
        let id = compound.src_compound_id.trim();
        if id.is_empty() {
            return false;
        }
        match collection {
            "kegg" => match id.chars().next() {
                Some('C') => self.insert("kegg.compound", id),
                Some('G') => self.insert("kegg.glycan", id),
                _ => {
                    debug!(id, "dropping KEGG id outside compound and glycan");
                    return false;
                }
            },
            "chebi" => match id.parse::<ChebiId>() {
                Ok(synonym) => {
                    self.chebi.insert(synonym.curie());
                }
                Err(err) => {
                    debug!("dropping ChEBI synonym: {err}");
                    return false;
                }
            },
            other => self.insert(other, id),
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Ignore cached records and query again.
    pub force: bool,
}

/// What happened to a single id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Cached,
    Resolved,
    NotFound,
    MissingNotation,
    InvalidNotation,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveStats {
    pub total: usize,
    pub cached: usize,
    pub resolved: usize,
    pub not_found: usize,
    pub missing_notation: usize,
    pub invalid_notation: usize,
    pub failed: usize,
}

impl ResolveStats {
    fn record(&mut self, resolution: Resolution) {
        self.total += 1;
        match resolution {
            Resolution::Cached => self.cached += 1,
            Resolution::Resolved => self.resolved += 1,
            Resolution::NotFound => self.not_found += 1,
            Resolution::MissingNotation => self.missing_notation += 1,
            Resolution::InvalidNotation => self.invalid_notation += 1,
            Resolution::Failed => self.failed += 1,
        }
    }

    /// Ids that went to the network on this run.
    pub fn queried(&self) -> usize {
        self.resolved + self.not_found + self.failed
    }
}

pub struct CrossReferenceResolver<'a, C: UniChemClient> {
    client: &'a C,
    tables: &'a ResolverTables,
    store: &'a Store,
}

impl<'a, C: UniChemClient> CrossReferenceResolver<'a, C> {
    pub fn new(client: &'a C, tables: &'a ResolverTables, store: &'a Store) -> Self {
        Self {
            client,
            tables,
            store,
        }
    }

    /// Resolves every id in ascending order and returns the aggregate map.
    /// Ids whose lookup failed at the transport level are left out of the
    /// map and out of the cache. Ids without an InChI are kept in the map as
    /// bare records but never cached.
    pub fn resolve_all(
        &self,
        ids: &BTreeSet<ChebiId>,
        options: ResolveOptions,
        sink: &dyn ProgressSink,
    ) -> Result<(CrossReferenceMap, ResolveStats), KinanError> {
        self.store.ensure_cache_root()?;
        let start = Instant::now();
        let mut mapping = CrossReferenceMap::new();
        let mut stats = ResolveStats::default();

        for (position, chebi) in ids.iter().enumerate() {
            let (record, resolution) = self.resolve_one(chebi, options)?;
            stats.record(resolution);
            if let Some(record) = record {
                mapping.insert(chebi.number().to_string(), record);
            }
            if resolution != Resolution::Cached {
                sink.event(ProgressEvent {
                    message: format!(
                        "phase=Resolve; {} {}/{} {:?}",
                        chebi,
                        position + 1,
                        ids.len(),
                        resolution
                    ),
                    elapsed: Some(start.elapsed()),
                });
            }
        }

        info!(
            total = stats.total,
            cached = stats.cached,
            resolved = stats.resolved,
            failed = stats.failed,
            "cross-reference resolution finished"
        );
        Ok((mapping, stats))
    }

    pub fn resolve_one(
        &self,
        chebi: &ChebiId,
        options: ResolveOptions,
    ) -> Result<(Option<ChemicalCrossReference>, Resolution), KinanError> {
        if !options.force {
            match self.store.read_xref(chebi) {
                Ok(Some(record))
                    if record.inchi.is_none() && self.tables.notations.inchi(chebi).is_some() =>
                {
                    debug!(%chebi, "cache entry predates the notation table; resolving again");
                }
                Ok(Some(record)) => return Ok((Some(record), Resolution::Cached)),
                Ok(None) => {}
                Err(KinanError::Serialization(message)) => {
                    warn!(%chebi, "ignoring unreadable cache entry: {message}");
                }
                Err(err) => return Err(err),
            }
        }

        let mut record = ChemicalCrossReference::new(chebi);
        let Some(inchi) = self.tables.notations.inchi(chebi) else {
            // Not cached: a later run with a fuller notation table must query it.
            warn!(%chebi, "no InChI available");
            return Ok((Some(record), Resolution::MissingNotation));
        };
        record.inchi = Some(inchi.to_string());

        let inchikey = match inchi_to_inchikey(inchi) {
            Ok(key) => key,
            Err(err) => {
                error!(%chebi, "InChIKey derivation failed: {err}");
                self.store.write_xref(chebi, &record)?;
                return Ok((Some(record), Resolution::InvalidNotation));
            }
        };
        record.inchikey = Some(inchikey.clone());

        let resolution = match self.client.lookup(&inchikey) {
            Ok(LookupOutcome::Found(compounds)) => {
                let accepted = compounds
                    .iter()
                    .filter(|compound| record.accept(&self.tables.sources, compound))
                    .count();
                debug!(%chebi, %inchikey, received = compounds.len(), accepted, "UniChem synonyms");
                Resolution::Resolved
            }
            Ok(LookupOutcome::NotFound(message)) => {
                info!(%chebi, %inchikey, "no UniChem synonyms: {message}");
                Resolution::NotFound
            }
            Err(err) => {
                error!(%chebi, %inchikey, "UniChem lookup failed: {err}");
                return Ok((None, Resolution::Failed));
            }
        };

        self.store.write_xref(chebi, &record)?;
        Ok((Some(record), resolution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compound(src_id: &str, id: &str) -> SourceCompound {
        SourceCompound {
            src_id: src_id.to_string(),
            src_compound_id: id.to_string(),
        }
    }

    #[test]
    fn kegg_ids_split_by_prefix() {
        let sources = SourceAllowList::default();
        let mut record = ChemicalCrossReference::new(&"5931".parse().unwrap());

        assert!(record.accept(&sources, &compound("6", "C00031")));
        assert!(record.accept(&sources, &compound("6", "G10505")));
        assert!(!record.accept(&sources, &compound("6", "D00009")));

        assert_eq!(record.collections["kegg.compound"], BTreeSet::from(["C00031".to_string()]));
        assert_eq!(record.collections["kegg.glycan"], BTreeSet::from(["G10505".to_string()]));
        assert!(!record.collections.contains_key("kegg"));
    }

    #[test]
    fn chebi_synonyms_join_the_id_set() {
        let sources = SourceAllowList::default();
        let mut record = ChemicalCrossReference::new(&"5931".parse().unwrap());

        assert!(record.accept(&sources, &compound("7", "4167")));
        assert!(record.accept(&sources, &compound("7", "5931")));

        assert_eq!(
            record.chebi,
            BTreeSet::from(["CHEBI:4167".to_string(), "CHEBI:5931".to_string()])
        );
        assert!(record.collections.is_empty());
    }

    #[test]
    fn unknown_sources_are_ignored_and_ids_accumulate() {
        let sources = SourceAllowList::default();
        let mut record = ChemicalCrossReference::new(&"5931".parse().unwrap());

        assert!(!record.accept(&sources, &compound("1", "CHEMBL1")));
        assert!(record.accept(&sources, &compound("22", "5793")));
        assert!(record.accept(&sources, &compound("22", "107526")));
        assert!(record.accept(&sources, &compound("21", "SID1")));
        assert!(record.accept(&sources, &compound("5", "SID2")));

        assert_eq!(record.collections["pubchem.compound"].len(), 2);
        assert_eq!(record.collections["pubchem.substance"].len(), 2);
        assert_eq!(record.collection_id_count(), 4);
    }

    #[test]
    fn record_json_is_flat() {
        let mut record = ChemicalCrossReference::new(&"5931".parse().unwrap());
        record.insert("hmdb", "HMDB0000122");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["chebi"][0], "CHEBI:5931");
        assert_eq!(json["hmdb"][0], "HMDB0000122");
        assert!(json.get("inchi").is_none());

        let back: ChemicalCrossReference = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
