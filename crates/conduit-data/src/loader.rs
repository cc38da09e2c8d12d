//! Loading pipeline: reads transporter data files and resolves them into
//! core [`TransporterDef`]s.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers, plus [`load_transporters`] which ties them
//! together.

use crate::schema::{RouteGroupData, TransporterData};
use conduit_core::geometry::{Side, SideMask};
use conduit_core::id::TransporterType;
use conduit_core::ingest::{RouteGroup, TransporterDef};
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Base name of the transporter definitions file.
pub const TRANSPORTERS_FILE: &str = "transporters";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: &'static str, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A side name did not match any block face.
    #[error("unknown side '{side}' in transporter '{transporter}' ({file})")]
    UnknownSide {
        file: PathBuf,
        transporter: String,
        side: String,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A transporter defines no route groups and would never join a network.
    #[error("transporter '{name}' in {file} has no route groups")]
    EmptyRouteGroups { file: PathBuf, name: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Definition files
// ===========================================================================

/// Encodings a definitions file may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Extension for each format, in lookup order.
const EXTENSIONS: [(&str, Format); 3] = [
    ("ron", Format::Ron),
    ("toml", Format::Toml),
    ("json", Format::Json),
];

/// The encoding of a definitions file, from its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    EXTENSIONS
        .iter()
        .find(|(known, _)| Some(*known) == ext)
        .map(|&(_, format)| format)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

/// The definitions file `base_name` in `dir`, whichever encoding it uses.
///
/// A definition set lives in exactly one file: finding both
/// `transporters.ron` and `transporters.json` is an error rather than a
/// silent preference.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut present = EXTENSIONS
        .iter()
        .map(|(ext, _)| dir.join(format!("{base_name}.{ext}")))
        .filter(|candidate| candidate.exists());
    let first = present.next();
    match (first, present.next()) {
        (Some(a), Some(b)) => Err(DataLoadError::ConflictingFormats { a, b }),
        (first, _) => Ok(first),
    }
}

/// [`find_data_file`] for a set the registry cannot start without.
pub fn require_data_file(dir: &Path, base_name: &'static str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name,
        dir: dir.to_path_buf(),
    })
}

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read the entries of a definitions file.
///
/// RON and JSON files hold a bare list. TOML has no top-level arrays, so the
/// list sits under `toml_key` (`[[transporters]]` tables).
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let mut table: toml::Table = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            table
                .remove(toml_key)
                .ok_or_else(|| parse_error(path, format!("no `{toml_key}` entries")))?
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Resolution
// ===========================================================================

/// Resolved transporter definitions, addressable by name.
#[derive(Debug, Clone, Default)]
pub struct TransporterCatalog {
    defs: Vec<TransporterDef>,
    by_name: HashMap<String, usize>,
}

impl TransporterCatalog {
    pub fn get(&self, name: &str) -> Option<&TransporterDef> {
        self.by_name.get(name).map(|&i| &self.defs[i])
    }

    /// Definitions in file order.
    pub fn iter(&self) -> impl Iterator<Item = &TransporterDef> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Every transporter type a definition refers to. Each needs a handler
    /// registered before its blocks can be placed.
    pub fn transporter_types(&self) -> BTreeSet<TransporterType> {
        self.defs.iter().map(|d| d.transporter.clone()).collect()
    }
}

/// Resolve a list of side names into a mask.
pub fn resolve_sides(names: &[String], transporter: &str, file: &Path) -> Result<SideMask, DataLoadError> {
    names.iter().try_fold(SideMask::NONE, |mask, name| {
        Side::from_name(&name.to_ascii_lowercase())
            .map(|side| mask.with(side))
            .ok_or_else(|| DataLoadError::UnknownSide {
                file: file.to_path_buf(),
                transporter: transporter.to_string(),
                side: name.clone(),
            })
    })
}

fn resolve_group(group: &RouteGroupData, transporter: &str, file: &Path) -> Result<RouteGroup, DataLoadError> {
    Ok(RouteGroup {
        inputs: resolve_sides(&group.inputs, transporter, file)?,
        outputs: resolve_sides(&group.outputs, transporter, file)?,
    })
}

/// Resolve raw entries read from `file` into a catalog.
pub fn resolve_transporters(
    entries: Vec<TransporterData>,
    file: &Path,
) -> Result<TransporterCatalog, DataLoadError> {
    let mut catalog = TransporterCatalog::default();

    for entry in entries {
        if catalog.by_name.contains_key(&entry.name) {
            return Err(DataLoadError::DuplicateName {
                file: file.to_path_buf(),
                name: entry.name,
            });
        }
        if entry.route_groups.is_empty() {
            return Err(DataLoadError::EmptyRouteGroups {
                file: file.to_path_buf(),
                name: entry.name,
            });
        }
        let route_groups = entry
            .route_groups
            .iter()
            .map(|group| resolve_group(group, &entry.name, file))
            .collect::<Result<Vec<_>, _>>()?;

        catalog.by_name.insert(entry.name.clone(), catalog.defs.len());
        catalog.defs.push(TransporterDef {
            name: entry.name,
            transporter: TransporterType::new(entry.transporter_type),
            route_groups,
        });
    }

    Ok(catalog)
}

/// Load `transporters.{ron,toml,json}` from `dir`.
pub fn load_transporters(dir: &Path) -> Result<TransporterCatalog, DataLoadError> {
    let path = require_data_file(dir, TRANSPORTERS_FILE)?;
    let entries: Vec<TransporterData> = deserialize_list(&path, TRANSPORTERS_FILE)?;
    resolve_transporters(entries, &path)
}

// ===========================================================================
// Tests
// ===========================================================================
