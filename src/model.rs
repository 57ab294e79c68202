use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::domain::Unit;
use crate::error::KinanError;
use crate::merge::AnnotatedParameter;
use crate::store::Store;

pub const MODEL_ID: &str = "brenda_parameters";
pub const MODEL_VERSION: u32 = 2;

const MODEL_NOTES: &str = "Parsed and annotated kinetic parameters of the BRENDA enzyme \
database. Organisms are annotated to NCBI Taxonomy, tissues to the BRENDA Tissue \
Ontology, compounds to ChEBI and its UniChem cross-references, parameter kinds to SBO \
and literature to PubMed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseUnitKind {
    Mole,
    Litre,
    Second,
    Gram,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseUnit {
    pub kind: BaseUnitKind,
    pub exponent: i32,
    pub scale: i32,
    pub multiplier: f64,
}

impl BaseUnit {
    fn new(kind: BaseUnitKind, exponent: i32, scale: i32, multiplier: f64) -> Self {
        Self {
            kind,
            exponent,
            scale,
            multiplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDefinition {
    pub id: String,
    pub name: String,
    pub base_units: Vec<BaseUnit>,
}

impl UnitDefinition {
    pub fn for_unit(unit: Unit) -> Self {
        use BaseUnitKind::*;
        let base_units = match unit {
            Unit::Millimolar => vec![BaseUnit::new(Mole, 1, -3, 1.0), BaseUnit::new(Litre, -1, 0, 1.0)],
            Unit::PerSecond => vec![BaseUnit::new(Second, -1, 0, 1.0)],
            Unit::PerMillimolarPerSecond => vec![
                BaseUnit::new(Mole, -1, -3, 1.0),
                BaseUnit::new(Litre, 1, 0, 1.0),
                BaseUnit::new(Second, -1, 0, 1.0),
            ],
            Unit::MicromolePerMinutePerMilligram => vec![
                BaseUnit::new(Mole, 1, -6, 1.0),
                BaseUnit::new(Gram, -1, -3, 1.0),
                BaseUnit::new(Second, -1, 0, 60.0),
            ],
        };
        Self {
            id: unit.model_id().to_string(),
            name: unit.as_str().to_string(),
            base_units,
        }
    }
}

/// The emitted artifact: every annotated parameter plus the unit definitions
/// they refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterModel {
    pub id: String,
    pub version: u32,
    pub created_at: String,
    pub notes: String,
    pub units: Vec<UnitDefinition>,
    pub parameters: Vec<AnnotatedParameter>,
}

impl ParameterModel {
    pub fn new(parameters: Vec<AnnotatedParameter>) -> Self {
        Self {
            id: MODEL_ID.to_string(),
            version: MODEL_VERSION,
            created_at: chrono::Utc::now().to_rfc3339(),
            notes: MODEL_NOTES.to_string(),
            units: Unit::ALL.into_iter().map(UnitDefinition::for_unit).collect(),
            parameters,
        }
    }

    pub fn unit(&self, id: &str) -> Option<&UnitDefinition> {
        self.units.iter().find(|unit| unit.id == id)
    }
}

pub trait ModelWriter {
    fn write(&self, model: &ParameterModel, path: &Utf8Path) -> Result<(), KinanError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonModelWriter;

impl ModelWriter for JsonModelWriter {
    fn write(&self, model: &ParameterModel, path: &Utf8Path) -> Result<(), KinanError> {
        Store::write_json(path, model)
    }
}
