use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

use camino::Utf8Path;
use tracing::debug;

use crate::domain::ChebiId;
use crate::error::KinanError;

/// ChEBI → InChI lookup loaded from a two-column TSV with a `CHEBI_ID` header.
#[derive(Debug, Clone, Default)]
pub struct NotationTable {
    inchi: HashMap<ChebiId, String>,
}

impl NotationTable {
    pub fn load(path: &Utf8Path) -> Result<Self, KinanError> {
        let file = File::open(path.as_std_path())
            .map_err(|err| KinanError::NotationTable(format!("{path}: {err}")))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, KinanError> {
        let mut inchi = HashMap::new();
        for (number, line) in BufReader::new(reader).lines().enumerate() {
            let line = line.map_err(|err| KinanError::NotationTable(err.to_string()))?;
            let mut tokens = line.split('\t').map(str::trim);
            let (Some(id), Some(notation)) = (tokens.next(), tokens.next()) else {
                continue;
            };
            if id == "CHEBI_ID" || notation.is_empty() {
                continue;
            }
            match id.parse::<ChebiId>() {
                Ok(chebi) => {
                    inchi.insert(chebi, notation.to_string());
                }
                Err(err) => debug!(line = number + 1, "skipping notation row: {err}"),
            }
        }
        Ok(Self { inchi })
    }

    pub fn inchi(&self, chebi: &ChebiId) -> Option<&str> {
        self.inchi.get(chebi).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.inchi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inchi.is_empty()
    }
}

impl FromIterator<(ChebiId, String)> for NotationTable {
    fn from_iter<I: IntoIterator<Item = (ChebiId, String)>>(iter: I) -> Self {
        Self {
            inchi: iter.into_iter().collect(),
        }
    }
}

/// UniChem source ids accepted as cross-references, with the identifiers.org
/// collection each one maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAllowList {
    collections: BTreeMap<String, String>,
}

impl SourceAllowList {
    pub fn new(collections: BTreeMap<String, String>) -> Self {
        Self { collections }
    }

    pub fn collection(&self, src_id: &str) -> Option<&str> {
        self.collections.get(src_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

impl Default for SourceAllowList {
    fn default() -> Self {
        Self::new(default_source_collections())
    }
}

pub fn default_source_collections() -> BTreeMap<String, String> {
    [
        ("2", "drugbank"),
        ("3", "pdb"),
        ("5", "pubchem.substance"),
        // KEGG LIGAND ids are split into compound and glycan during resolution.
        ("6", "kegg"),
        ("7", "chebi"),
        ("9", "zinc"),
        ("17", "pharmgkb.drug"),
        ("18", "hmdb"),
        ("21", "pubchem.substance"),
        ("22", "pubchem.compound"),
        ("25", "lincs.smallmolecule"),
        ("27", "vmhmetabolite"),
        ("31", "bindingdb"),
        ("32", "comptox"),
        ("33", "lipidmaps"),
        ("36", "metabolights"),
        ("37", "brenda.ligand"),
        ("38", "rhea"),
        ("41", "swisslipid"),
    ]
    .into_iter()
    .map(|(src, collection)| (src.to_string(), collection.to_string()))
    .collect()
}

/// Read-only lookup state handed to the cross-reference resolver.
#[derive(Debug, Clone, Default)]
pub struct ResolverTables {
    pub notations: NotationTable,
    pub sources: SourceAllowList,
}

impl ResolverTables {
    pub fn new(notations: NotationTable, sources: SourceAllowList) -> Self {
        Self { notations, sources }
    }

    /// Resolution without a notation table would turn every chemical into a
    /// bare record, so a missing path is an error.
    pub fn load(notations: Option<&Utf8Path>, sources: SourceAllowList) -> Result<Self, KinanError> {
        let path = notations.ok_or(KinanError::MissingNotations)?;
        Ok(Self::new(NotationTable::load(path)?, sources))
    }
}
