use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KinanError {
    #[error("invalid EC number: {0}")]
    InvalidEcCode(String),

    #[error("invalid ChEBI identifier: {0}")]
    InvalidChebiId(String),

    #[error("unit not in allow-list: {0}")]
    InvalidUnit(String),

    #[error("invalid InChI: {0}")]
    InvalidInchi(String),

    #[error("invalid InChIKey: {0}")]
    InvalidInchiKey(String),

    #[error("missing config file kinan.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read record source: {0}")]
    SourceRead(String),

    #[error("failed to parse record source: {0}")]
    SourceParse(String),

    #[error("failed to load notation table: {0}")]
    NotationTable(String),

    #[error("no notation table configured")]
    #[diagnostic(help("pass --notations or set `notations` in kinan.json"))]
    MissingNotations,

    #[error("{stage} stage requires {path}; run the previous stage first")]
    #[diagnostic(help("stages run in order: extract, resolve, emit"))]
    MissingCheckpoint { stage: String, path: String },

    #[error("UniChem request failed: {0}")]
    UniChemHttp(String),

    #[error("UniChem returned status {status}: {message}")]
    UniChemStatus { status: u16, message: String },

    #[error("unexpected UniChem payload: {0}")]
    UniChemPayload(String),

    #[error("{failed} UniChem lookups failed")]
    #[diagnostic(help("failed ids are not cached; rerun resolve to retry them"))]
    IncompleteResolution { failed: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl KinanError {
    /// Prefixes storage errors with the pipeline stage they happened in.
    pub fn in_stage(self, stage: &str) -> Self {
        match self {
            Self::Filesystem(message) => Self::Filesystem(format!("{stage} stage: {message}")),
            Self::Serialization(message) => {
                Self::Serialization(format!("{stage} stage: {message}"))
            }
            other => other,
        }
    }
}
