//! Resolution pipeline: reads data files, resolves cross-references, builds
//! the catalog and the engine config.
//!
//! Every file is optional. Content starts from the built-in catalog and each
//! file present overrides its part: equipment specs field by field, perks
//! per faction, and the tech tree, dilemmas, headlines and flavor lines
//! wholesale.

use crate::schema::*;
use hashforge_core::catalog::StaticCatalog;
use hashforge_core::config::EngineConfig;
use hashforge_core::equipment::EquipmentTable;
use hashforge_core::faction::PerkTable;
use hashforge_core::id::{NarrativeId, TechId};
use hashforge_core::market::Headline;
use hashforge_core::narrative::{DilemmaOption, NarrativeEvent};
use hashforge_tech_tree::{TechNode, TechTree, TechTreeError};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Base names of the files the loader looks for.
pub const ENGINE: &str = "engine";
pub const EQUIPMENT: &str = "equipment";
pub const TECH_TREE: &str = "tech_tree";
pub const NARRATIVE: &str = "narrative";
pub const HEADLINES: &str = "headlines";
pub const FLAVOR: &str = "flavor";
pub const FACTIONS: &str = "factions";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A value parsed but is out of range.
    #[error("invalid value in {file}: {detail}")]
    Invalid { file: PathBuf, detail: String },

    /// The tech tree rejected a node.
    #[error("tech tree error in {file}: {source}")]
    Tech {
        file: PathBuf,
        #[source]
        source: TechTreeError,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn invalid(file: &Path, detail: impl Into<String>) -> DataLoadError {
    DataLoadError::Invalid {
        file: file.to_path_buf(),
        detail: detail.into(),
    }
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name.
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, e: impl std::fmt::Display) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    }
}

/// Read a file and deserialize it according to its format.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list from a file. TOML has no top-level arrays, so TOML
/// files hold the list under `toml_key`; RON and JSON hold it directly.
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
            let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
                .clone();
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Return a `DuplicateName` error if `name` is already in the map.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Pipeline
// ===========================================================================

/// Everything a data directory configures.
#[derive(Debug, Clone)]
pub struct GameData {
    pub config: EngineConfig,
    pub catalog: StaticCatalog,
}

/// Load the engine config and the catalog from `dir`.
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("data directory {} not found", dir.display()),
        )
        .into());
    }
    let config = match find_data_file(dir, ENGINE)? {
        Some(path) => {
            info!(file = %path.display(), "loading engine config");
            deserialize_file(&path)?
        }
        None => EngineConfig::default(),
    };
    let catalog = load_catalog(dir)?;
    Ok(GameData { config, catalog })
}

/// Build a catalog from the built-in content and whatever files `dir` holds.
pub fn load_catalog(dir: &Path) -> Result<StaticCatalog, DataLoadError> {
    let mut catalog = StaticCatalog::builtin();

    if let Some(path) = find_data_file(dir, EQUIPMENT)? {
        let rows: Vec<EquipmentData> = deserialize_list(&path, EQUIPMENT)?;
        info!(file = %path.display(), count = rows.len(), "loading equipment overrides");
        apply_equipment(&mut catalog.equipment, rows, &path)?;
    }
    if let Some(path) = find_data_file(dir, TECH_TREE)? {
        let rows: Vec<TechData> = deserialize_list(&path, TECH_TREE)?;
        info!(file = %path.display(), count = rows.len(), "loading tech tree");
        catalog.tech_tree = build_tech_tree(rows, &path)?;
    }
    if let Some(path) = find_data_file(dir, NARRATIVE)? {
        let rows: Vec<NarrativeData> = deserialize_list(&path, NARRATIVE)?;
        info!(file = %path.display(), count = rows.len(), "loading narrative events");
        catalog.events = build_events(rows, &path)?;
    }
    if let Some(path) = find_data_file(dir, HEADLINES)? {
        let rows: Vec<HeadlineData> = deserialize_list(&path, HEADLINES)?;
        info!(file = %path.display(), count = rows.len(), "loading headlines");
        catalog.headlines = build_headlines(rows, &path)?;
    }
    if let Some(path) = find_data_file(dir, FLAVOR)? {
        let rows: Vec<FlavorData> = deserialize_list(&path, FLAVOR)?;
        info!(file = %path.display(), count = rows.len(), "loading flavor lines");
        catalog.flavor = build_flavor(rows, &path)?;
    }
    if let Some(path) = find_data_file(dir, FACTIONS)? {
        let rows: Vec<FactionData> = deserialize_list(&path, FACTIONS)?;
        info!(file = %path.display(), count = rows.len(), "loading faction perks");
        apply_factions(&mut catalog.perks, rows, &path)?;
    }

    Ok(catalog)
}

// ===========================================================================
// Resolution
// ===========================================================================

fn apply_equipment(
    table: &mut EquipmentTable,
    rows: Vec<EquipmentData>,
    path: &Path,
) -> Result<(), DataLoadError> {
    let mut seen: HashMap<String, ()> = HashMap::new();
    for row in rows {
        let key = format!("{:?}", row.equipment);
        check_duplicate(&seen, &key, path)?;
        seen.insert(key, ());

        let spec = &mut table[row.equipment];
        if let Some(name) = row.name {
            spec.name = name;
        }
        let fields = [
            (&mut spec.hash_rate, row.hash_rate),
            (&mut spec.power_kw, row.power_kw),
            (&mut spec.heat, row.heat),
            (&mut spec.grid_kw, row.grid_kw),
            (&mut spec.thermal_buffer, row.thermal_buffer),
            (&mut spec.efficiency_bonus, row.efficiency_bonus),
            (&mut spec.base_cost, row.base_cost),
            (&mut spec.cost_growth, row.cost_growth),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                *field = value;
            }
        }
        if let Some(is_generator) = row.is_generator {
            spec.is_generator = is_generator;
        }

        if !(spec.base_cost > 0.0) {
            return Err(invalid(path, format!("{:?}: base_cost must be positive", row.equipment)));
        }
        if !(spec.cost_growth >= 1.0) {
            return Err(invalid(path, format!("{:?}: cost_growth must be at least 1", row.equipment)));
        }
        if !(0.0..1.0).contains(&spec.efficiency_bonus) {
            return Err(invalid(path, format!("{:?}: efficiency_bonus must be in [0, 1)", row.equipment)));
        }
        debug!(equipment = ?row.equipment, "equipment spec overridden");
    }
    Ok(())
}

fn build_tech_tree(rows: Vec<TechData>, path: &Path) -> Result<TechTree, DataLoadError> {
    let mut tree = TechTree::new();
    let mut ids: HashMap<String, TechId> = HashMap::new();

    for (i, row) in rows.into_iter().enumerate() {
        check_duplicate(&ids, &row.name, path)?;
        if !(row.cost >= 0.0) {
            return Err(invalid(path, format!("{}: cost must not be negative", row.name)));
        }
        // Only earlier nodes are in `ids`, so forward references fail here.
        let prerequisites = row
            .prerequisites
            .iter()
            .map(|name| resolve_name(&ids, name, path, "tech").copied())
            .collect::<Result<Vec<_>, _>>()?;

        let id = TechId(i as u32 + 1);
        tree.register(TechNode {
            id,
            name: row.name.clone(),
            prerequisites,
            cost: row.cost,
            prestige_multiplier: row.prestige_multiplier,
            production_bonus: row.production_bonus,
            security_bonus: row.security_bonus,
        })
        .map_err(|source| DataLoadError::Tech {
            file: path.to_path_buf(),
            source,
        })?;
        ids.insert(row.name, id);
    }
    Ok(tree)
}

fn build_events(rows: Vec<NarrativeData>, path: &Path) -> Result<Vec<NarrativeEvent>, DataLoadError> {
    let mut seen: HashMap<String, ()> = HashMap::new();
    let mut events = Vec::with_capacity(rows.len());

    for row in rows {
        let key = row.id.to_string();
        check_duplicate(&seen, &key, path)?;
        seen.insert(key, ());

        if row.options.is_empty() {
            return Err(invalid(path, format!("event {} has no options", row.id)));
        }
        if row.max_stage.is_some_and(|max| max < row.min_stage) {
            return Err(invalid(path, format!("event {} has max_stage below min_stage", row.id)));
        }
        events.push(NarrativeEvent {
            id: NarrativeId(row.id),
            title: row.title,
            body: row.body,
            min_stage: row.min_stage,
            max_stage: row.max_stage,
            one_time: row.one_time,
            requires_faction: row.requires_faction,
            options: row
                .options
                .into_iter()
                .map(|o| DilemmaOption {
                    label: o.label,
                    effects: o.effects,
                })
                .collect(),
        });
    }
    Ok(events)
}

fn build_headlines(rows: Vec<HeadlineData>, path: &Path) -> Result<Vec<Headline>, DataLoadError> {
    rows.into_iter()
        .map(|row| {
            if !(row.sell_multiplier > 0.0 && row.production_multiplier > 0.0) {
                return Err(invalid(path, format!("'{}': multipliers must be positive", row.text)));
            }
            Ok(Headline::new(&row.text, row.sell_multiplier, row.production_multiplier))
        })
        .collect()
}

fn build_flavor(rows: Vec<FlavorData>, path: &Path) -> Result<BTreeMap<u32, Vec<String>>, DataLoadError> {
    let mut seen: HashMap<String, ()> = HashMap::new();
    let mut flavor = BTreeMap::new();
    for row in rows {
        let key = row.stage.to_string();
        check_duplicate(&seen, &key, path)?;
        seen.insert(key, ());
        flavor.insert(row.stage, row.lines);
    }
    Ok(flavor)
}

fn apply_factions(perks: &mut PerkTable, rows: Vec<FactionData>, path: &Path) -> Result<(), DataLoadError> {
    let mut seen: HashMap<String, ()> = HashMap::new();
    for row in rows {
        let key = format!("{:?}", row.faction);
        check_duplicate(&seen, &key, path)?;
        seen.insert(key, ());

        if !(0.0..=1.0).contains(&row.perks.breaker_save_chance) {
            return Err(invalid(path, format!("{:?}: breaker_save_chance must be in [0, 1]", row.faction)));
        }
        perks.set(row.faction, row.perks);
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
