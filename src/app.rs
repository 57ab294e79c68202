use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::error::KinanError;
use crate::extract::extract;
use crate::merge::merge;
use crate::model::{ModelWriter, ParameterModel};
use crate::notation::ResolverTables;
use crate::source::RecordSource;
use crate::store::Store;
use crate::unichem::UniChemClient;
use crate::xref::{CrossReferenceResolver, ResolveOptions, ResolveStats};

#[derive(Debug, Clone, Serialize)]
pub struct ExtractResult {
    pub proteins_seen: usize,
    pub invalid_records: usize,
    pub records: usize,
    pub parameters: usize,
    pub unmapped_organisms: usize,
    pub unmapped_tissues: usize,
    pub unmapped_substances: usize,
    pub dataset_path: String,
    pub report_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResult {
    pub chemicals: usize,
    #[serde(flatten)]
    pub stats: ResolveStats,
    pub mapping_path: String,
}

impl ResolveResult {
    /// Fails when any lookup hit a transport error; those ids are missing
    /// from the mapping until resolve runs again.
    pub fn ensure_complete(&self) -> Result<(), KinanError> {
        match self.stats.failed {
            0 => Ok(()),
            failed => Err(KinanError::IncompleteResolution { failed }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmitResult {
    pub parameters: usize,
    pub model_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub extract: ExtractResult,
    pub resolve: ResolveResult,
    pub emit: EmitResult,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// The three pipeline stages over one results directory. Each stage reads the
/// checkpoint of the previous one, so they can also run in separate
/// invocations.
pub struct App<C: UniChemClient, W: ModelWriter> {
    store: Store,
    client: C,
    writer: W,
}

impl<C: UniChemClient, W: ModelWriter> App<C, W> {
    pub fn new(store: Store, client: C, writer: W) -> Self {
        Self {
            store,
            client,
            writer,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn extract(
        &self,
        source: &dyn RecordSource,
        sink: &dyn ProgressSink,
    ) -> Result<ExtractResult, KinanError> {
        self.extract_inner(source, sink)
            .map_err(|err| err.in_stage("extract"))
    }

    fn extract_inner(
        &self,
        source: &dyn RecordSource,
        sink: &dyn ProgressSink,
    ) -> Result<ExtractResult, KinanError> {
        let start = Instant::now();
        sink.event(ProgressEvent {
            message: "phase=Extract; mapping records".to_string(),
            elapsed: None,
        });
        self.store.ensure_results_root()?;

        let extraction = extract(source);
        let dataset_path = self.store.write_dataset(&extraction.dataset)?;
        let report_paths = self.store.write_unmapped(&extraction.unmapped)?;

        sink.event(ProgressEvent {
            message: format!(
                "phase=Store; {} records written to {dataset_path}",
                extraction.dataset.len()
            ),
            elapsed: Some(start.elapsed()),
        });

        let unmapped = &extraction.unmapped;
        Ok(ExtractResult {
            proteins_seen: extraction.proteins_seen,
            invalid_records: extraction.invalid_records,
            records: extraction.dataset.len(),
            parameters: extraction.dataset.parameter_count(),
            unmapped_organisms: unmapped.organisms.total(),
            unmapped_tissues: unmapped.tissues.total(),
            unmapped_substances: unmapped.substances.total(),
            dataset_path: dataset_path.to_string(),
            report_paths: report_paths.iter().map(ToString::to_string).collect(),
        })
    }

    pub fn resolve(
        &self,
        tables: &ResolverTables,
        options: ResolveOptions,
        sink: &dyn ProgressSink,
    ) -> Result<ResolveResult, KinanError> {
        self.resolve_inner(tables, options, sink)
            .map_err(|err| err.in_stage("resolve"))
    }

    fn resolve_inner(
        &self,
        tables: &ResolverTables,
        options: ResolveOptions,
        sink: &dyn ProgressSink,
    ) -> Result<ResolveResult, KinanError> {
        let start = Instant::now();
        let dataset = self.store.read_dataset("resolve")?;
        let chemicals = dataset.chebi_ids();
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; {} chemical identifiers", chemicals.len()),
            elapsed: None,
        });

        let resolver = CrossReferenceResolver::new(&self.client, tables, &self.store);
        let (mapping, stats) = resolver.resolve_all(&chemicals, options, sink)?;
        let mapping_path = self.store.write_xref_mapping(&mapping)?;

        sink.event(ProgressEvent {
            message: format!(
                "phase=Store; {} cross-references written to {mapping_path}",
                mapping.len()
            ),
            elapsed: Some(start.elapsed()),
        });
        Ok(ResolveResult {
            chemicals: chemicals.len(),
            stats,
            mapping_path: mapping_path.to_string(),
        })
    }

    pub fn emit(&self, sink: &dyn ProgressSink) -> Result<EmitResult, KinanError> {
        self.emit_inner(sink).map_err(|err| err.in_stage("emit"))
    }

    fn emit_inner(&self, sink: &dyn ProgressSink) -> Result<EmitResult, KinanError> {
        let start = Instant::now();
        let dataset = self.store.read_dataset("emit")?;
        let mapping = self.store.read_xref_mapping("emit")?;
        sink.event(ProgressEvent {
            message: format!("phase=Emit; annotating {} records", dataset.len()),
            elapsed: None,
        });

        let model = ParameterModel::new(merge(&dataset, &mapping));
        let model_path = self.store.model_path();
        self.writer.write(&model, &model_path)?;
        info!(parameters = model.parameters.len(), path = %model_path, "model written");

        sink.event(ProgressEvent {
            message: format!("phase=Store; model written to {model_path}"),
            elapsed: Some(start.elapsed()),
        });
        Ok(EmitResult {
            parameters: model.parameters.len(),
            model_path: model_path.to_string(),
        })
    }

    pub fn run(
        &self,
        source: &dyn RecordSource,
        tables: &ResolverTables,
        options: ResolveOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, KinanError> {
        let extract = self.extract(source, sink)?;
        let resolve = self.resolve(tables, options, sink)?;
        let emit = self.emit(sink)?;
        Ok(RunResult {
            extract,
            resolve,
            emit,
        })
    }
}
