use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use kinan::app::App;
use kinan::error::KinanError;
use kinan::inchikey::InchiKey;
use kinan::merge::Qualifier;
use kinan::model::{JsonModelWriter, ParameterModel};
use kinan::notation::{NotationTable, ResolverTables, SourceAllowList};
use kinan::output::JsonOutput;
use kinan::source::JsonRecordSource;
use kinan::store::{Store, UnmappedKind};
use kinan::unichem::{LookupOutcome, SourceCompound, UniChemClient};
use kinan::xref::{ChemicalCrossReference, CrossReferenceMap, ResolveOptions};

const ETHANOL_KEY: &str = "LFQSCWFLJHTTHZ-UHFFFAOYSA-N";

#[derive(Default)]
struct MockUniChem {
    calls: Mutex<usize>,
    offline: bool,
}

impl MockUniChem {
    fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

fn compound(src_id: &str, id: &str) -> SourceCompound {
    SourceCompound {
        src_id: src_id.to_string(),
        src_compound_id: id.to_string(),
    }
}

impl UniChemClient for MockUniChem {
    fn lookup(&self, inchikey: &InchiKey) -> Result<LookupOutcome, KinanError> {
        *self.calls.lock().unwrap() += 1;
        if self.offline {
            return Err(KinanError::UniChemHttp("connection refused".to_string()));
        }
        if inchikey.as_str() == ETHANOL_KEY {
            return Ok(LookupOutcome::Found(vec![
                compound("22", "702"),
                compound("7", "16236"),
                compound("7", "42377"),
                compound("6", "C00469"),
                compound("6", "D00068"),
                compound("31", "50000000"),
                compound("1", "CHEMBL545"),
            ]));
        }
        Ok(LookupOutcome::NotFound(format!(
            "The query InChIkey '{inchikey}' is not present in UniChem."
        )))
    }
}

fn fixture(name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn source() -> JsonRecordSource {
    JsonRecordSource::open(&fixture("brenda_sample.json")).unwrap()
}

fn tables() -> ResolverTables {
    let notations = NotationTable::load(&fixture("chebi_inchi.tsv")).unwrap();
    ResolverTables::new(notations, SourceAllowList::default())
}

fn store(root: &Utf8Path) -> Store {
    Store::new(root.join("results"))
}

fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

#[test]
fn extract_writes_dataset_and_reports() {
    let (_temp, root) = temp_root();
    let app = App::new(store(&root), MockUniChem::default(), JsonModelWriter);

    let result = app.extract(&source(), &JsonOutput).unwrap();
    assert_eq!(result.proteins_seen, 5);
    assert_eq!(result.invalid_records, 1);
    assert_eq!(result.records, 3);
    assert_eq!(result.parameters, 6);

    let dataset = app.store().read_dataset("test").unwrap();
    assert_eq!(
        dataset.keys().collect::<Vec<_>>(),
        vec!["EC1_1_1_1__PR1", "EC2_7_1_1__PR5", "EC2_7_1_1__PR6"]
    );
    let human = dataset.get("EC1_1_1_1__PR1").unwrap();
    assert_eq!(human.tissues.iter().collect::<Vec<_>>(), vec!["BTO_0000759"]);
    assert_eq!(human.uniprot.as_deref(), Some("P07327"));

    let organisms =
        std::fs::read_to_string(app.store().unmapped_path(UnmappedKind::Organisms)).unwrap();
    assert_eq!(organisms, "1 : Unknownia obscura\n");
    let tissues = std::fs::read_to_string(app.store().unmapped_path(UnmappedKind::Tissues)).unwrap();
    assert_eq!(tissues, "1 : mystery tissue\n");
    let substances =
        std::fs::read_to_string(app.store().unmapped_path(UnmappedKind::Substances)).unwrap();
    assert_eq!(substances, "1 : unknown alcohol\n");
}

#[test]
fn resolve_caches_every_resolvable_chemical() {
    let (_temp, root) = temp_root();
    let app = App::new(store(&root), MockUniChem::default(), JsonModelWriter);
    app.extract(&source(), &JsonOutput).unwrap();

    let result = app
        .resolve(&tables(), ResolveOptions::default(), &JsonOutput)
        .unwrap();
    assert_eq!(result.chemicals, 3);
    assert_eq!(result.stats.resolved, 1);
    assert_eq!(result.stats.not_found, 1);
    assert_eq!(result.stats.missing_notation, 1);
    assert_eq!(app.client().calls(), 2);

    let ethanol = app
        .store()
        .read_xref(&"CHEBI_16236".parse().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(ethanol.inchikey.as_ref().map(InchiKey::as_str), Some(ETHANOL_KEY));
    assert_eq!(
        ethanol.chebi.iter().collect::<Vec<_>>(),
        vec!["CHEBI:16236", "CHEBI:42377"]
    );
    assert!(ethanol.collections["kegg.compound"].contains("C00469"));
    assert!(!ethanol.collections.contains_key("kegg.drug"));
    assert!(!ethanol.collections.contains_key("kegg"));
    assert!(ethanol.collections["bindingdb"].contains("50000000"));

    assert!(!app.store().xref_exists(&"CHEBI_4167".parse().unwrap()));

    let mapping: CrossReferenceMap = app.store().read_xref_mapping("test").unwrap();
    assert_eq!(
        mapping.keys().collect::<Vec<_>>(),
        vec!["15377", "16236", "4167"]
    );
    let glucose = &mapping["4167"];
    assert!(glucose.inchi.is_none());
    assert!(glucose.collections.is_empty());
}

#[test]
fn resolve_without_notations_does_not_poison_the_cache() {
    let (_temp, root) = temp_root();
    let bare = App::new(store(&root), MockUniChem::default(), JsonModelWriter);
    bare.extract(&source(), &JsonOutput).unwrap();
    let result = bare
        .resolve(&ResolverTables::default(), ResolveOptions::default(), &JsonOutput)
        .unwrap();
    assert_eq!(result.stats.missing_notation, 3);
    assert_eq!(bare.client().calls(), 0);
    assert!(!bare.store().xref_exists(&"CHEBI_16236".parse().unwrap()));

    let full = App::new(store(&root), MockUniChem::default(), JsonModelWriter);
    let result = full
        .resolve(&tables(), ResolveOptions::default(), &JsonOutput)
        .unwrap();
    assert_eq!(full.client().calls(), 2);
    assert_eq!(result.stats.cached, 0);
    assert_eq!(result.stats.resolved, 1);
    let mapping = full.store().read_xref_mapping("test").unwrap();
    assert!(mapping["16236"].collections["kegg.compound"].contains("C00469"));
}

#[test]
fn bare_cache_entries_are_resolved_once_an_inchi_is_known() {
    let (_temp, root) = temp_root();
    let app = App::new(store(&root), MockUniChem::default(), JsonModelWriter);
    app.extract(&source(), &JsonOutput).unwrap();
    app.store().ensure_cache_root().unwrap();
    let ethanol = "CHEBI_16236".parse().unwrap();
    app.store()
        .write_xref(&ethanol, &ChemicalCrossReference::new(&ethanol))
        .unwrap();

    let result = app
        .resolve(&tables(), ResolveOptions::default(), &JsonOutput)
        .unwrap();
    assert_eq!(result.stats.cached, 0);
    assert_eq!(result.stats.resolved, 1);
    let cached = app.store().read_xref(&ethanol).unwrap().unwrap();
    assert_eq!(cached.inchikey.as_ref().map(InchiKey::as_str), Some(ETHANOL_KEY));
}

#[test]
fn second_resolve_uses_the_cache_only() {
    let (_temp, root) = temp_root();
    let first = App::new(store(&root), MockUniChem::default(), JsonModelWriter);
    first.run(&source(), &tables(), ResolveOptions::default(), &JsonOutput).unwrap();
    let mapping_path = first.store().xref_mapping_path();
    let before = std::fs::read_to_string(&mapping_path).unwrap();

    let second = App::new(store(&root), MockUniChem::default(), JsonModelWriter);
    let result = second
        .resolve(&tables(), ResolveOptions::default(), &JsonOutput)
        .unwrap();
    assert_eq!(second.client().calls(), 0);
    assert_eq!(result.stats.cached, 2);
    assert_eq!(result.stats.missing_notation, 1);
    assert_eq!(std::fs::read_to_string(&mapping_path).unwrap(), before);

    let forced = App::new(store(&root), MockUniChem::default(), JsonModelWriter);
    forced
        .resolve(&tables(), ResolveOptions { force: true }, &JsonOutput)
        .unwrap();
    assert_eq!(forced.client().calls(), 2);
    assert_eq!(std::fs::read_to_string(&mapping_path).unwrap(), before);
}

#[test]
fn transport_failures_are_not_cached() {
    let (_temp, root) = temp_root();
    let offline = App::new(store(&root), MockUniChem::offline(), JsonModelWriter);
    offline.extract(&source(), &JsonOutput).unwrap();

    let result = offline
        .resolve(&tables(), ResolveOptions::default(), &JsonOutput)
        .unwrap();
    assert_eq!(result.stats.failed, 2);
    assert_eq!(result.stats.missing_notation, 1);
    assert!(!offline.store().xref_exists(&"CHEBI_16236".parse().unwrap()));
    let mapping = offline.store().read_xref_mapping("test").unwrap();
    assert_eq!(mapping.keys().collect::<Vec<_>>(), vec!["4167"]);
    let err = result.ensure_complete().unwrap_err();
    assert_matches!(err, KinanError::IncompleteResolution { failed: 2 });

    let online = App::new(store(&root), MockUniChem::default(), JsonModelWriter);
    let result = online
        .resolve(&tables(), ResolveOptions::default(), &JsonOutput)
        .unwrap();
    assert_eq!(online.client().calls(), 2);
    assert_eq!(result.stats.cached, 0);
    assert_eq!(result.stats.missing_notation, 1);
    assert_eq!(result.stats.resolved, 1);
    assert_eq!(result.stats.not_found, 1);
    result.ensure_complete().unwrap();
}

#[test]
fn emitted_model_carries_every_parameter() {
    let (_temp, root) = temp_root();
    let app = App::new(store(&root), MockUniChem::default(), JsonModelWriter);
    let result = app
        .run(&source(), &tables(), ResolveOptions::default(), &JsonOutput)
        .unwrap();
    assert_eq!(result.emit.parameters, 6);

    let model: ParameterModel = Store::read_json(&app.store().model_path()).unwrap();
    let ids = model.parameters.iter().map(|p| p.id.as_str()).collect::<Vec<_>>();
    assert_eq!(
        ids,
        vec!["PB000001", "PB000002", "PB000003", "PB000004", "PB000005", "PB000006"]
    );
    let names = model.parameters.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            "KM EC1_1_1_1__PR1 Homo sapiens (ethanol)",
            "TN EC1_1_1_1__PR1 Homo sapiens (ethanol)",
            "KM EC2_7_1_1__PR5 Saccharomyces cerevisiae (D-glucose)",
            "KKM EC2_7_1_1__PR5 Saccharomyces cerevisiae (D-glucose)",
            "SA EC2_7_1_1__PR5 Saccharomyces cerevisiae",
            "KI EC2_7_1_1__PR6 Bos taurus (water)",
        ]
    );

    let ethanol_km = &model.parameters[0];
    let resources = ethanol_km
        .annotations
        .iter()
        .map(|annotation| annotation.resource())
        .collect::<Vec<_>>();
    assert_eq!(
        resources,
        vec![
            "brenda/1.1.1.1",
            "ec-code/1.1.1.1",
            "taxonomy/9606",
            "uniprot/P07327",
            "bto/BTO:0000759",
            "sbo/SBO:0000027",
            "pubmed/1234",
            "kegg.compound/C00469",
            "pubchem.compound/702",
            "inchikey/LFQSCWFLJHTTHZ-UHFFFAOYSA-N",
            "chebi/CHEBI:42377",
        ]
    );
    let pubmed = ethanol_km
        .annotations
        .iter()
        .find(|annotation| annotation.collection == "pubmed")
        .unwrap();
    assert_eq!(pubmed.qualifier, Qualifier::IsDescribedBy);

    let turnover = &model.parameters[1];
    assert_eq!(
        turnover
            .annotations
            .iter()
            .filter(|annotation| annotation.collection == "pubmed")
            .count(),
        2
    );

    let glucose_km = &model.parameters[2];
    assert_eq!(
        glucose_km.annotations.last().unwrap().resource(),
        "chebi/CHEBI:4167"
    );

    let kcat_km = &model.parameters[3];
    assert!(kcat_km.sbo_term.is_none());
    assert_eq!(kcat_km.units.as_str(), "1/mM/s");

    let water_ki = &model.parameters[5];
    assert_eq!(water_ki.sbo_term.as_deref(), Some("SBO:0000261"));
    assert_eq!(water_ki.annotations.last().unwrap().resource(), "chebi/CHEBI:15377");
}

#[test]
fn stages_require_previous_checkpoints() {
    let (_temp, root) = temp_root();
    let app = App::new(store(&root), MockUniChem::default(), JsonModelWriter);

    let err = app
        .resolve(&tables(), ResolveOptions::default(), &JsonOutput)
        .unwrap_err();
    assert_matches!(err, KinanError::MissingCheckpoint { ref stage, .. } if stage == "resolve");

    app.extract(&source(), &JsonOutput).unwrap();
    let err = app.emit(&JsonOutput).unwrap_err();
    assert_matches!(err, KinanError::MissingCheckpoint { ref path, .. } if path.ends_with("unichem_mapping.json"));
    assert_eq!(app.client().calls(), 0);
}

#[test]
fn filesystem_errors_name_the_stage() {
    let (_temp, root) = temp_root();
    std::fs::write(root.join("results"), "not a directory").unwrap();
    let app = App::new(store(&root), MockUniChem::default(), JsonModelWriter);

    let err = app.extract(&source(), &JsonOutput).unwrap_err();
    assert_matches!(err, KinanError::Filesystem(ref message) if message.starts_with("extract stage: "));
    assert!(err.to_string().contains("results"));
}

#[test]
fn gzip_source_is_read_transparently() {
    use std::io::Write;

    let (_temp, root) = temp_root();
    let raw = std::fs::read(fixture("brenda_sample.json")).unwrap();
    let path = root.join("brenda.json.gz");
    let file = std::fs::File::create(&path).unwrap();
    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    encoder.write_all(&raw).unwrap();
    encoder.finish().unwrap();

    let source = JsonRecordSource::open(&path).unwrap();
    assert_eq!(source.len(), 5);
}
