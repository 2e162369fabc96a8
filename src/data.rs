//! Input tables: tagged records joined with the domain taxonomy

use crate::config::TestingType;
use csv::StringRecord;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tagjudge_core::{Error, PoiRecord, Result, Sample, Tag};
use tracing::info;

pub const TAXONOMY_COLUMNS: [&str; 2] = ["Tag Parent", "Tag Name"];

pub const INPUT_COLUMNS: [&str; 9] = [
    "name",
    "type",
    "description",
    "review0",
    "review1",
    "review2",
    "tag_name",
    "source",
    "mobi_id",
];

pub fn input_path(data_dir: &Path, testing_type: TestingType) -> PathBuf {
    data_dir.join(format!("{}_tag_eval.csv", testing_type.as_str()))
}

pub fn taxonomy_path(data_dir: &Path, testing_type: TestingType) -> PathBuf {
    data_dir.join(format!("Mobi Taxonomy v2 - {} Taxonomy.csv", testing_type.as_str()))
}

/// Column positions by name, failing on the first required column that is absent.
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn require(headers: &StringRecord, required: &[&str], file: &Path) -> Result<Self> {
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect();
        if let Some(missing) = required.iter().find(|c| !index.contains_key(**c)) {
            return Err(Error::missing_column(file.display().to_string(), *missing));
        }
        Ok(Self { index })
    }

    /// Cell text, with empty cells read as absent.
    fn get<'r>(&self, row: &'r StringRecord, column: &str) -> Option<&'r str> {
        self.index
            .get(column)
            .and_then(|&i| row.get(i))
            .filter(|v| !v.trim().is_empty())
    }

    fn owned(&self, row: &StringRecord, column: &str) -> Option<String> {
        self.get(row, column).map(str::to_string)
    }
}

/// `tag name -> parent` from the taxonomy table. First occurrence wins.
pub fn load_taxonomy(path: &Path) -> Result<HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns = Columns::require(reader.headers()?, &TAXONOMY_COLUMNS, path)?;

    let mut parents = HashMap::new();
    for row in reader.records() {
        let row = row?;
        let (Some(name), Some(parent)) = (
            columns.get(&row, "Tag Name"),
            columns.get(&row, "Tag Parent"),
        ) else {
            continue;
        };
        parents
            .entry(name.to_string())
            .or_insert_with(|| parent.to_string());
    }
    info!("Loaded {} taxonomy tags from {}", parents.len(), path.display());
    Ok(parents)
}

/// Read the tagged-records table.
pub fn load_input(path: &Path) -> Result<Vec<(PoiRecord, String)>> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns = Columns::require(reader.headers()?, &INPUT_COLUMNS, path)?;

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record = PoiRecord {
            name: columns.owned(&row, "name").unwrap_or_default(),
            poi_type: columns.owned(&row, "type"),
            mobi_id: columns.owned(&row, "mobi_id"),
            source: columns.owned(&row, "source"),
            description: columns.owned(&row, "description"),
            reviews: [
                columns.owned(&row, "review0"),
                columns.owned(&row, "review1"),
                columns.owned(&row, "review2"),
            ],
        };
        let tag_name = columns.owned(&row, "tag_name").unwrap_or_default();
        rows.push((record, tag_name));
    }
    Ok(rows)
}

/// Left-join rows with the taxonomy, drop repeated `(name, source, mobi_id)`
/// keeping the first, then keep only `test_keys` tags when given.
pub fn build_samples(
    rows: Vec<(PoiRecord, String)>,
    taxonomy: &HashMap<String, String>,
    test_keys: Option<&[String]>,
) -> Vec<Sample> {
    let mut seen = HashSet::new();
    let mut samples = Vec::with_capacity(rows.len());
    for (record, tag_name) in rows {
        let key = (record.name.clone(), record.source.clone(), record.mobi_id.clone());
        if !seen.insert(key) {
            continue;
        }
        if let Some(keys) = test_keys {
            if !keys.iter().any(|k| *k == tag_name) {
                continue;
            }
        }
        let tag = Tag {
            parent: taxonomy.get(&tag_name).cloned(),
            name: tag_name,
        };
        samples.push(Sample { record, tag });
    }
    samples
}

/// Load, join and filter everything for one domain.
pub fn load_samples(
    data_dir: &Path,
    testing_type: TestingType,
    test_keys: Option<&[String]>,
) -> Result<Vec<Sample>> {
    let taxonomy = load_taxonomy(&taxonomy_path(data_dir, testing_type))?;
    let input = input_path(data_dir, testing_type);
    let rows = load_input(&input)?;
    let total = rows.len();
    let samples = build_samples(rows, &taxonomy, test_keys);
    info!(
        "Loaded {} rows from {}, {} samples after dedup{}",
        total,
        input.display(),
        samples.len(),
        if test_keys.is_some() { " and test-key filter" } else { "" }
    );
    Ok(samples)
}
