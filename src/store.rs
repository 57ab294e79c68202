use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::Builder;

use crate::dataset::Dataset;
use crate::domain::ChebiId;
use crate::error::KinanError;
use crate::extract::{UnmappedCounter, UnmappedReport};
use crate::xref::{ChemicalCrossReference, CrossReferenceMap};

pub const PARAMETERS_FILE: &str = "brenda_parameters.json";
pub const XREF_MAPPING_FILE: &str = "unichem_mapping.json";
pub const MODEL_FILE: &str = "brenda_parameters.model.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmappedKind {
    Organisms,
    Tissues,
    Substances,
}

impl UnmappedKind {
    pub const ALL: [UnmappedKind; 3] = [
        UnmappedKind::Organisms,
        UnmappedKind::Tissues,
        UnmappedKind::Substances,
    ];

    fn file_name(self) -> &'static str {
        match self {
            UnmappedKind::Organisms => "unmapped_organisms.txt",
            UnmappedKind::Tissues => "unmapped_tissues.txt",
            UnmappedKind::Substances => "unmapped_substances.txt",
        }
    }
}

/// On-disk layout of one pipeline run: checkpoints and reports under the
/// results root, per-compound cross-references under the cache root.
#[derive(Debug, Clone)]
pub struct Store {
    results_root: Utf8PathBuf,
    cache_root: Utf8PathBuf,
}

impl Store {
    pub fn new(results_root: impl Into<Utf8PathBuf>) -> Self {
        let results_root = results_root.into();
        let cache_root = results_root.join("unichem");
        Self {
            results_root,
            cache_root,
        }
    }

    pub fn new_with_paths(results_root: Utf8PathBuf, cache_root: Utf8PathBuf) -> Self {
        Self {
            results_root,
            cache_root,
        }
    }

    pub fn results_root(&self) -> &Utf8Path {
        &self.results_root
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    pub fn parameters_path(&self) -> Utf8PathBuf {
        self.results_root.join(PARAMETERS_FILE)
    }

    pub fn unmapped_path(&self, kind: UnmappedKind) -> Utf8PathBuf {
        self.results_root.join(kind.file_name())
    }

    pub fn xref_path(&self, chebi: &ChebiId) -> Utf8PathBuf {
        self.cache_root.join(format!("{}.json", chebi.number()))
    }

    pub fn xref_mapping_path(&self) -> Utf8PathBuf {
        self.results_root.join(XREF_MAPPING_FILE)
    }

    pub fn model_path(&self) -> Utf8PathBuf {
        self.results_root.join(MODEL_FILE)
    }

    pub fn ensure_results_root(&self) -> Result<(), KinanError> {
        fs::create_dir_all(self.results_root.as_std_path())
            .map_err(|err| KinanError::Filesystem(format!("{}: {err}", self.results_root)))
    }

    pub fn ensure_cache_root(&self) -> Result<(), KinanError> {
        fs::create_dir_all(self.cache_root.as_std_path())
            .map_err(|err| KinanError::Filesystem(format!("{}: {err}", self.cache_root)))
    }

    pub fn write_dataset(&self, dataset: &Dataset) -> Result<Utf8PathBuf, KinanError> {
        let path = self.parameters_path();
        Self::write_json(&path, dataset)?;
        Ok(path)
    }

    pub fn read_dataset(&self, stage: &str) -> Result<Dataset, KinanError> {
        let path = self.parameters_path();
        Self::require(stage, &path)?;
        Self::read_json(&path)
    }

    /// Writes the three unmapped-entry reports and returns their paths.
    pub fn write_unmapped(&self, report: &UnmappedReport) -> Result<Vec<Utf8PathBuf>, KinanError> {
        let mut paths = Vec::with_capacity(UnmappedKind::ALL.len());
        for kind in UnmappedKind::ALL {
            let counter = match kind {
                UnmappedKind::Organisms => &report.organisms,
                UnmappedKind::Tissues => &report.tissues,
                UnmappedKind::Substances => &report.substances,
            };
            let path = self.unmapped_path(kind);
            Self::write_bytes_atomic(&path, format_counter(counter).as_bytes())?;
            paths.push(path);
        }
        Ok(paths)
    }

    pub fn xref_exists(&self, chebi: &ChebiId) -> bool {
        self.xref_path(chebi).as_std_path().exists()
    }

    pub fn read_xref(&self, chebi: &ChebiId) -> Result<Option<ChemicalCrossReference>, KinanError> {
        let path = self.xref_path(chebi);
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        Self::read_json(&path).map(Some)
    }

    pub fn write_xref(
        &self,
        chebi: &ChebiId,
        record: &ChemicalCrossReference,
    ) -> Result<(), KinanError> {
        Self::write_json(&self.xref_path(chebi), record)
    }

    pub fn write_xref_mapping(&self, mapping: &CrossReferenceMap) -> Result<Utf8PathBuf, KinanError> {
        let path = self.xref_mapping_path();
        Self::write_json(&path, mapping)?;
        Ok(path)
    }

    pub fn read_xref_mapping(&self, stage: &str) -> Result<CrossReferenceMap, KinanError> {
        let path = self.xref_mapping_path();
        Self::require(stage, &path)?;
        Self::read_json(&path)
    }

    fn require(stage: &str, path: &Utf8Path) -> Result<(), KinanError> {
        if path.as_std_path().exists() {
            return Ok(());
        }
        Err(KinanError::MissingCheckpoint {
            stage: stage.to_string(),
            path: path.to_string(),
        })
    }

    pub fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, KinanError> {
        let content = fs::read(path.as_std_path())
            .map_err(|err| KinanError::Filesystem(format!("{path}: {err}")))?;
        serde_json::from_slice(&content)
            .map_err(|err| KinanError::Serialization(format!("{path}: {err}")))
    }

    pub fn write_json<T: Serialize + ?Sized>(path: &Utf8Path, value: &T) -> Result<(), KinanError> {
        let mut content = serde_json::to_vec_pretty(value)
            .map_err(|err| KinanError::Serialization(err.to_string()))?;
        content.push(b'\n');
        Self::write_bytes_atomic(path, &content)
    }

    /// Writes through a temp file in the target directory, then renames it
    /// over `path`.
    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), KinanError> {
        let parent = path
            .parent()
            .ok_or_else(|| KinanError::Filesystem(format!("invalid destination path {path}")))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| KinanError::Filesystem(format!("{parent}: {err}")))?;
        let mut temp = Builder::new()
            .prefix(".kinan-write")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| KinanError::Filesystem(format!("{parent}: {err}")))?;
        temp.write_all(content)
            .map_err(|err| KinanError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| KinanError::Filesystem(format!("{path}: {err}")))?;
        Ok(())
    }
}

/// One `"<count> : <key>"` line per entry, most frequent first.
pub fn format_counter(counter: &UnmappedCounter) -> String {
    let mut out = String::new();
    for (key, count) in counter.most_common() {
        let _ = writeln!(out, "{count} : {key}");
    }
    out
}
