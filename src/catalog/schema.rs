//! Schema mapping for hierarchical (HDF5) uploads
//!
//! The scan endpoint lists every dataset in the file plus the server's guess
//! at which dataset backs each halo field. The guess can be incomplete, so
//! [`detect_schema`] re-runs the same path heuristics client-side to fill the
//! gaps, and [`SchemaMapping::validate`] refuses to ingest without the
//! required fields.
//!
//! Heuristic, per field:
//! 1. `pos` candidates are 2D datasets with a dimension of 3
//! 2. other candidates are 1D (or Nx1) datasets whose path matches a keyword
//! 3. candidates are scored: shorter basenames win, exact/partial keyword
//!    matches add points, `id` candidates that look like parent links lose

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub path: String,
    pub shape: Vec<u64>,
}

impl DatasetInfo {
    fn ndim(&self) -> usize {
        self.shape.len()
    }

    fn basename(&self) -> String {
        let lower = self.path.to_lowercase();
        lower.rsplit('/').next().unwrap_or_default().to_string()
    }
}

/// Dataset path backing each halo field
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SchemaMapping {
    pub id: Option<String>,
    pub mass: Option<String>,
    pub pos: Option<String>,
    #[serde(default)]
    pub radius: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl SchemaMapping {
    /// `id`, `mass` and `pos` must be mapped before ingest
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [("id", &self.id), ("mass", &self.mass), ("pos", &self.pos)]
            .into_iter()
            .filter(|(_, v)| v.as_deref().map_or(true, str::is_empty))
            .map(|(name, _)| name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ViewerError::Validation(format!(
                "schema mapping missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Fill unset fields from `other`
    pub fn merged_with(mut self, other: SchemaMapping) -> Self {
        self.id = self.id.or(other.id);
        self.mass = self.mass.or(other.mass);
        self.pos = self.pos.or(other.pos);
        self.radius = self.radius.or(other.radius);
        self.parent_id = self.parent_id.or(other.parent_id);
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScanResponse {
    pub datasets: Vec<DatasetInfo>,
    #[serde(default)]
    pub schema: SchemaMapping,
}

impl ScanResponse {
    /// Server schema with any gaps filled by the local heuristic
    pub fn resolved_schema(&self) -> SchemaMapping {
        self.schema.clone().merged_with(detect_schema(&self.datasets))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Field {
    Id,
    Mass,
    Pos,
    Radius,
    ParentId,
}

const FIELDS: [Field; 5] = [Field::Mass, Field::Pos, Field::Id, Field::ParentId, Field::Radius];

fn keywords(field: Field) -> &'static [&'static str] {
    match field {
        Field::Mass => &["mass", "mvir", "m200", "weight"],
        Field::Pos => &["pos", "coord", "xyz", "location"],
        Field::Id => &["id", "index", "number", "track"],
        Field::ParentId => &["parent", "host", "group"],
        Field::Radius => &["rad", "r200", "rvir", "size"],
    }
}

fn score(field: Field, ds: &DatasetInfo) -> f64 {
    let path = ds.path.to_lowercase();
    let base = ds.basename();
    let mut score = -(base.chars().count() as f64) * 0.5;

    match field {
        Field::Id => {
            if path.contains("parent") || path.contains("host") || path.contains("group") {
                score -= 50.0;
            }
            if base == "id" {
                score += 20.0;
            } else if base.contains("id") {
                score += 10.0;
            } else if base.contains("index") {
                score += 5.0;
            }
        }
        Field::ParentId => {
            if base.contains("parent") {
                score += 20.0;
            } else if base.contains("host") {
                score += 10.0;
            } else if base.contains("group") {
                score += 5.0;
            }
        }
        Field::Mass => {
            if base == "mass" {
                score += 20.0;
            } else if base.contains("mass") {
                score += 10.0;
            }
        }
        Field::Pos => {
            if base.contains("coord") {
                score += 15.0;
            } else if base.contains("pos") {
                score += 10.0;
            }
        }
        Field::Radius => {
            if base.contains("radius") {
                score += 20.0;
            } else if base.contains("r200") {
                score += 15.0;
            } else if base.contains("vir") {
                score += 10.0;
            }
        }
    }
    score
}

/// Guess a mapping from dataset paths and shapes alone
pub fn detect_schema(datasets: &[DatasetInfo]) -> SchemaMapping {
    let mut candidates: Vec<(Field, &DatasetInfo)> = Vec::new();

    for ds in datasets {
        let shape = &ds.shape;
        if ds.ndim() == 2 && (shape[1] == 3 || shape[0] == 3) {
            candidates.push((Field::Pos, ds));
            continue;
        }

        let column_like = ds.ndim() == 1 || (ds.ndim() == 2 && (shape[1] == 1 || shape[0] == 1));
        if !column_like {
            continue;
        }
        let path = ds.path.to_lowercase();
        for field in FIELDS {
            if field == Field::Pos {
                continue;
            }
            if keywords(field).iter().any(|k| path.contains(k)) {
                candidates.push((field, ds));
            }
        }
    }

    let best = |field: Field| -> Option<String> {
        let mut best: Option<(f64, &DatasetInfo)> = None;
        for (f, ds) in &candidates {
            if *f != field {
                continue;
            }
            let s = score(field, ds);
            // strict comparison keeps the first of equally scored datasets
            if best.map_or(true, |(b, _)| s > b) {
                best = Some((s, *ds));
            }
        }
        best.map(|(_, ds)| ds.path.clone())
    };

    SchemaMapping {
        id: best(Field::Id),
        mass: best(Field::Mass),
        pos: best(Field::Pos),
        radius: best(Field::Radius),
        parent_id: best(Field::ParentId),
    }
}
