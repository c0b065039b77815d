//! Location dataset parsing.
//!
//! Four JSON layouts are accepted:
//!
//! 1. an object keyed by county name, whose values are either an array of
//!    sub-county names or an object mapping sub-county name to ward names
//! 2. `{ "counties": [...], "subcounties": [...], "station": [...] }`
//! 3. `{ "tables": [{ "name": ..., "data": [...] }] }`
//! 4. a top-level array of `{ "name", "type", "data" }` table descriptors,
//!    of which only `"type": "table"` entries are read
//!
//! Layouts 2-4 use the row fields `county_id`, `county_name`, `subcounty_id`,
//! `constituency_name` (or `subcounty_name`), `station_id` and `ward`.
//! Ids may be strings or numbers.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::normalize::normalize_display_name;
use crate::error::{Error, Result};

macro_rules! location_id {
    ($name:ident, $what:literal) => {
        #[doc = concat!("Identifier of a ", $what, ".")]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a ", $what, " id.")]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

location_id!(CountyId, "county");
location_id!(SubCountyId, "sub-county");
location_id!(WardId, "ward");

/// A county.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct County {
    /// County id.
    pub id: CountyId,
    /// Name as it appears in the dataset.
    pub raw_name: String,
    /// Normalized display name.
    pub display_name: String,
}

/// A sub-county. Each sub-county doubles as its constituency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCounty {
    /// Sub-county id.
    pub id: SubCountyId,
    /// Parent county.
    pub county_id: CountyId,
    /// Name as it appears in the dataset.
    pub raw_name: String,
    /// Normalized display name.
    pub display_name: String,
}

/// A ward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ward {
    /// Ward id.
    pub id: WardId,
    /// Parent sub-county.
    pub sub_county_id: SubCountyId,
    /// Name as it appears in the dataset.
    pub raw_name: String,
    /// Normalized display name.
    pub display_name: String,
}

/// Validated, immutable location table.
///
/// Every sub-county references a known county, every ward references a
/// known sub-county, and no two siblings share a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationDataset {
    counties: Vec<County>,
    sub_counties: Vec<SubCounty>,
    wards: Vec<Ward>,
    is_fallback: bool,
}

impl LocationDataset {
    /// Parse a dataset from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON, matches none of the accepted
    /// layouts, or contains no usable county.
    pub fn from_json(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)?;
        Self::from_value(root)
    }

    /// Build a dataset from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// See [`LocationDataset::from_json`].
    pub fn from_value(root: Value) -> Result<Self> {
        let rows = Rows::extract(root)?;
        Self::from_rows(rows)
    }

    pub(crate) fn fallback(counties: Vec<County>) -> Self {
        Self {
            counties,
            sub_counties: Vec::new(),
            wards: Vec::new(),
            is_fallback: true,
        }
    }

    /// All counties, in dataset order.
    #[must_use]
    pub fn counties(&self) -> &[County] {
        &self.counties
    }

    /// All sub-counties, in dataset order.
    #[must_use]
    pub fn sub_counties(&self) -> &[SubCounty] {
        &self.sub_counties
    }

    /// All wards, in dataset order.
    #[must_use]
    pub fn wards(&self) -> &[Ward] {
        &self.wards
    }

    /// Whether this is the static county-only list.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.is_fallback
    }

    fn from_rows(rows: Rows) -> Result<Self> {
        let mut counties = Vec::new();
        let mut county_ids = HashSet::new();
        let mut county_names = HashSet::new();
        for row in rows.counties {
            let id = row.county_id.into_string();
            let display_name = normalize_display_name(&row.county_name);
            if id.is_empty() || display_name.is_empty() {
                debug!(county_id = %id, "Skipping county without id or name");
                continue;
            }
            if !county_ids.insert(id.clone()) {
                warn!(county_id = %id, "Skipping duplicate county id");
                continue;
            }
            if !county_names.insert(display_name.to_lowercase()) {
                warn!(county_id = %id, name = %display_name, "Skipping duplicate county name");
                continue;
            }
            counties.push(County {
                id: CountyId(id),
                raw_name: row.county_name,
                display_name,
            });
        }

        if counties.is_empty() {
            return Err(Error::location_load("dataset contains no counties"));
        }

        let mut sub_counties = Vec::new();
        let mut sub_county_ids = HashSet::new();
        let mut sub_county_names: HashMap<String, HashSet<String>> = HashMap::new();
        for row in rows.sub_counties {
            let county_id = row.county_id.into_string();
            let id = row.subcounty_id.into_string();
            let raw_name = row
                .constituency_name
                .or(row.subcounty_name)
                .unwrap_or_default();
            let display_name = normalize_display_name(&raw_name);
            if id.is_empty() || display_name.is_empty() {
                debug!(subcounty_id = %id, "Skipping sub-county without id or name");
                continue;
            }
            if !county_ids.contains(&county_id) {
                warn!(subcounty_id = %id, county_id = %county_id, "Skipping sub-county with unknown county");
                continue;
            }
            if !sub_county_ids.insert(id.clone()) {
                warn!(subcounty_id = %id, "Skipping duplicate sub-county id");
                continue;
            }
            if !sub_county_names
                .entry(county_id.clone())
                .or_default()
                .insert(display_name.to_lowercase())
            {
                warn!(subcounty_id = %id, name = %display_name, "Skipping duplicate sub-county name");
                continue;
            }
            sub_counties.push(SubCounty {
                id: SubCountyId(id),
                county_id: CountyId(county_id),
                raw_name,
                display_name,
            });
        }

        let mut wards = Vec::new();
        let mut ward_ids = HashSet::new();
        let mut ward_names: HashMap<String, HashSet<String>> = HashMap::new();
        for row in rows.wards {
            let sub_county_id = row.subcounty_id.map(RawId::into_string).unwrap_or_default();
            let raw_name = row.ward.unwrap_or_default();
            if sub_county_id.is_empty() || sub_county_id == "0" || raw_name.trim().is_empty() {
                continue;
            }
            let id = row.station_id.into_string();
            if id.is_empty() {
                debug!(name = %raw_name, "Skipping ward without id");
                continue;
            }
            if !sub_county_ids.contains(&sub_county_id) {
                warn!(ward_id = %id, subcounty_id = %sub_county_id, "Skipping ward with unknown sub-county");
                continue;
            }
            if !ward_ids.insert(id.clone()) {
                warn!(ward_id = %id, "Skipping duplicate ward id");
                continue;
            }
            let display_name = normalize_display_name(&raw_name);
            if !ward_names
                .entry(sub_county_id.clone())
                .or_default()
                .insert(display_name.to_lowercase())
            {
                warn!(ward_id = %id, name = %display_name, "Skipping duplicate ward name");
                continue;
            }
            wards.push(Ward {
                id: WardId(id),
                sub_county_id: SubCountyId(sub_county_id),
                raw_name,
                display_name,
            });
        }

        debug!(
            counties = counties.len(),
            sub_counties = sub_counties.len(),
            wards = wards.len(),
            "Processed location dataset"
        );

        Ok(Self {
            counties,
            sub_counties,
            wards,
            is_fallback: false,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CountyRow {
    county_id: RawId,
    county_name: String,
}

#[derive(Debug, Deserialize)]
struct SubCountyRow {
    county_id: RawId,
    subcounty_id: RawId,
    #[serde(default)]
    constituency_name: Option<String>,
    #[serde(default)]
    subcounty_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WardRow {
    #[serde(default)]
    subcounty_id: Option<RawId>,
    station_id: RawId,
    #[serde(default)]
    ward: Option<String>,
}

#[derive(Debug, Default)]
struct Rows {
    counties: Vec<CountyRow>,
    sub_counties: Vec<SubCountyRow>,
    wards: Vec<WardRow>,
}

impl Rows {
    fn extract(root: Value) -> Result<Self> {
        match root {
            Value::Array(items) => Ok(Self::from_tables(items, true)),
            Value::Object(mut map) => {
                if let Some(Value::Array(tables)) = map.remove("tables") {
                    return Ok(Self::from_tables(tables, false));
                }
                let is_split = ["counties", "subcounties", "station"]
                    .iter()
                    .all(|key| map.get(*key).is_some_and(Value::is_array));
                if is_split {
                    let mut rows = Self::default();
                    rows.push_table("counties", take_array(&mut map, "counties"));
                    rows.push_table("subcounties", take_array(&mut map, "subcounties"));
                    rows.push_table("station", take_array(&mut map, "station"));
                    return Ok(rows);
                }
                Self::from_keyed(map)
            }
            _ => Err(Error::location_load(
                "dataset root must be an object or an array",
            )),
        }
    }

    fn from_tables(tables: Vec<Value>, require_table_type: bool) -> Self {
        let mut rows = Self::default();
        for table in tables {
            let Value::Object(mut table) = table else {
                continue;
            };
            if require_table_type && table.get("type").and_then(Value::as_str) != Some("table") {
                continue;
            }
            let Some(name) = table.get("name").and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            let data = take_array(&mut table, "data");
            rows.push_table(&name, data);
        }
        rows
    }

    fn push_table(&mut self, name: &str, data: Vec<Value>) {
        match name {
            "counties" => self.counties.extend(parse_rows(name, data)),
            "subcounties" => self.sub_counties.extend(parse_rows(name, data)),
            "station" => self.wards.extend(parse_rows(name, data)),
            other => debug!(table = %other, "Ignoring unknown location table"),
        }
    }

    fn from_keyed(map: Map<String, Value>) -> Result<Self> {
        let mut rows = Self::default();
        let mut sub_county_seq = 0usize;
        let mut ward_seq = 0usize;

        for (county_index, (county_name, children)) in map.into_iter().enumerate() {
            let county_id = format!("{:03}", county_index + 1);
            rows.counties.push(CountyRow {
                county_id: RawId::Text(county_id.clone()),
                county_name: county_name.clone(),
            });

            let sub_counties: Vec<(String, Vec<Value>)> = match children {
                Value::Array(names) => names
                    .into_iter()
                    .map(|name| (name, Vec::new()))
                    .map(|(name, wards)| Ok((expect_name(&county_name, name)?, wards)))
                    .collect::<Result<_>>()?,
                Value::Object(subs) => subs
                    .into_iter()
                    .map(|(name, wards)| match wards {
                        Value::Array(wards) => Ok((name, wards)),
                        _ => Err(Error::location_load(format!(
                            "wards of {county_name} / {name} must be an array"
                        ))),
                    })
                    .collect::<Result<_>>()?,
                _ => {
                    return Err(Error::location_load(format!(
                        "unsupported value for county {county_name}"
                    )))
                }
            };

            for (sub_county_name, wards) in sub_counties {
                sub_county_seq += 1;
                let sub_county_id = format!("{sub_county_seq:03}");
                rows.sub_counties.push(SubCountyRow {
                    county_id: RawId::Text(county_id.clone()),
                    subcounty_id: RawId::Text(sub_county_id.clone()),
                    constituency_name: Some(sub_county_name),
                    subcounty_name: None,
                });
                for ward in wards {
                    ward_seq += 1;
                    rows.wards.push(WardRow {
                        subcounty_id: Some(RawId::Text(sub_county_id.clone())),
                        station_id: RawId::Text(format!("{ward_seq:04}")),
                        ward: Some(expect_name(&county_name, ward)?),
                    });
                }
            }
        }

        Ok(rows)
    }
}

fn take_array(map: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match map.remove(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn parse_rows<T: for<'de> Deserialize<'de>>(table: &str, data: Vec<Value>) -> Vec<T> {
    data.into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(table = %table, error = %e, "Skipping malformed location row");
                None
            }
        })
        .collect()
}

fn expect_name(county: &str, value: Value) -> Result<String> {
    match value {
        Value::String(name) => Ok(name),
        other => Err(Error::location_load(format!(
            "expected a name under county {county}, found {other}"
        ))),
    }
}

/// Where the location dataset is read from.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Human-readable description used in logs.
    fn describe(&self) -> String;

    /// Fetch the raw dataset text.
    async fn fetch(&self) -> Result<String>;
}

/// Reads the dataset from a JSON file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Create a source for the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DatasetSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::location_load(format!("cannot read {}: {e}", self.path.display()))
        })
    }
}

/// Serves a dataset held in memory.
#[derive(Debug, Clone)]
pub struct StaticSource {
    body: String,
}

impl StaticSource {
    /// Create a source returning `body`.
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

#[async_trait]
impl DatasetSource for StaticSource {
    fn describe(&self) -> String {
        "inline dataset".to_string()
    }

    async fn fetch(&self) -> Result<String> {
        Ok(self.body.clone())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Split layout with a county that has no sub-counties.
    pub const SPLIT: &str = r#"{
        "counties": [
            {"county_id": "027", "county_name": "UASIN GISHU"},
            {"county_id": "028", "county_name": "ELGEYO/MARAKWET"},
            {"county_id": 47, "county_name": "NAIROBI"}
        ],
        "subcounties": [
            {"county_id": "027", "subcounty_id": "141", "constituency_name": "SOY"},
            {"county_id": "027", "subcounty_id": "142", "constituency_name": "AINABKOI"},
            {"county_id": "028", "subcounty_id": "148", "constituency_name": "KEIYO NORTH"}
        ],
        "station": [
            {"subcounty_id": "141", "station_id": "701", "ward": "ZIWA"},
            {"subcounty_id": "141", "station_id": "702", "ward": "kipsomba"},
            {"subcounty_id": "141", "station_id": "703", "ward": "SOY"},
            {"subcounty_id": "142", "station_id": "710", "ward": "KAPSOYA"},
            {"subcounty_id": "0", "station_id": "999", "ward": "NOWHERE"},
            {"subcounty_id": "148", "station_id": "720", "ward": "  "}
        ]
    }"#;
}

#[cfg(test)]
mod tests {
    use super::fixtures::SPLIT;
    use super::*;

    #[test]
    fn test_parse_split_layout() {
        let dataset = LocationDataset::from_json(SPLIT).unwrap();

        assert!(!dataset.is_fallback());
        assert_eq!(dataset.counties().len(), 3);
        assert_eq!(dataset.sub_counties().len(), 3);
        assert_eq!(dataset.wards().len(), 4);

        let nairobi = &dataset.counties()[2];
        assert_eq!(nairobi.id.as_str(), "47");
        assert_eq!(nairobi.display_name, "Nairobi");
        assert_eq!(dataset.counties()[1].display_name, "Elgeyo / Marakwet");
    }

    #[test]
    fn test_parse_skips_placeholder_and_blank_wards() {
        let dataset = LocationDataset::from_json(SPLIT).unwrap();
        assert!(dataset.wards().iter().all(|w| w.id.as_str() != "999"));
        assert!(dataset.wards().iter().all(|w| w.id.as_str() != "720"));
    }

    #[test]
    fn test_parse_tables_layout() {
        let json = r#"{"tables": [
            {"name": "counties", "data": [{"county_id": "1", "county_name": "MOMBASA"}]},
            {"name": "subcounties", "data": [{"county_id": "1", "subcounty_id": "1", "subcounty_name": "CHANGAMWE"}]},
            {"name": "station", "data": [{"subcounty_id": "1", "station_id": "1", "ward": "PORT REITZ"}]}
        ]}"#;
        let dataset = LocationDataset::from_json(json).unwrap();

        assert_eq!(dataset.counties()[0].display_name, "Mombasa");
        assert_eq!(dataset.sub_counties()[0].display_name, "Changamwe");
        assert_eq!(dataset.wards()[0].display_name, "Port Reitz");
    }

    #[test]
    fn test_parse_descriptor_array_layout() {
        let json = r#"[
            {"type": "header", "version": "5.0"},
            {"type": "database", "name": "locations"},
            {"type": "table", "name": "counties", "data": [{"county_id": "2", "county_name": "KWALE"}]},
            {"type": "table", "name": "subcounties", "data": [{"county_id": "2", "subcounty_id": 5, "constituency_name": "MSAMBWENI"}]},
            {"type": "table", "name": "station", "data": [{"subcounty_id": 5, "station_id": 9, "ward": "GOMBATO BONGWE"}]}
        ]"#;
        let dataset = LocationDataset::from_json(json).unwrap();

        assert_eq!(dataset.counties().len(), 1);
        assert_eq!(dataset.sub_counties()[0].id.as_str(), "5");
        assert_eq!(dataset.wards()[0].sub_county_id.as_str(), "5");
    }

    #[test]
    fn test_parse_keyed_layout() {
        let json = r#"{
            "KISUMU": {"KISUMU EAST": ["KAJULU", "KOLWA EAST"], "NYANDO": []},
            "LAMU": ["LAMU EAST", "LAMU WEST"]
        }"#;
        let dataset = LocationDataset::from_json(json).unwrap();

        assert_eq!(dataset.counties().len(), 2);
        assert_eq!(dataset.sub_counties().len(), 4);
        assert_eq!(dataset.wards().len(), 2);

        let kisumu = &dataset.counties()[0];
        assert_eq!(kisumu.id.as_str(), "001");
        assert_eq!(kisumu.display_name, "Kisumu");
        assert!(dataset
            .sub_counties()
            .iter()
            .filter(|s| s.county_id == kisumu.id)
            .any(|s| s.display_name == "Kisumu East"));
    }

    #[test]
    fn test_parse_keyed_layout_rejects_bad_values() {
        assert!(LocationDataset::from_json(r#"{"KISUMU": 3}"#).is_err());
        assert!(LocationDataset::from_json(r#"{"KISUMU": [1, 2]}"#).is_err());
    }

    #[test]
    fn test_orphans_are_dropped() {
        let json = r#"{
            "counties": [{"county_id": "1", "county_name": "A"}],
            "subcounties": [
                {"county_id": "1", "subcounty_id": "10", "constituency_name": "B"},
                {"county_id": "9", "subcounty_id": "11", "constituency_name": "ORPHAN"}
            ],
            "station": [
                {"subcounty_id": "10", "station_id": "100", "ward": "C"},
                {"subcounty_id": "11", "station_id": "101", "ward": "LOST"}
            ]
        }"#;
        let dataset = LocationDataset::from_json(json).unwrap();

        assert_eq!(dataset.sub_counties().len(), 1);
        assert_eq!(dataset.wards().len(), 1);
        assert_eq!(dataset.wards()[0].raw_name, "C");
    }

    #[test]
    fn test_duplicate_sibling_names_are_dropped() {
        let json = r#"{
            "counties": [{"county_id": "1", "county_name": "A"}, {"county_id": "2", "county_name": "B"}],
            "subcounties": [
                {"county_id": "1", "subcounty_id": "10", "constituency_name": "SAME"},
                {"county_id": "1", "subcounty_id": "11", "constituency_name": "same"},
                {"county_id": "2", "subcounty_id": "12", "constituency_name": "SAME"}
            ],
            "station": []
        }"#;
        let dataset = LocationDataset::from_json(json).unwrap();

        let ids: Vec<_> = dataset.sub_counties().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["10", "12"]);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let json = r#"{
            "counties": [{"county_id": "1", "county_name": "A"}, {"county_id": "2"}],
            "subcounties": [],
            "station": []
        }"#;
        let dataset = LocationDataset::from_json(json).unwrap();
        assert_eq!(dataset.counties().len(), 1);
    }

    #[test]
    fn test_rejects_unusable_documents() {
        assert!(LocationDataset::from_json("not json").is_err());
        assert!(LocationDataset::from_json("42").is_err());
        assert!(LocationDataset::from_json("[]").is_err());
        assert!(LocationDataset::from_json(r#"{"tables": []}"#).is_err());
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticSource::new(SPLIT);
        assert_eq!(source.fetch().await.unwrap(), SPLIT);
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = FileSource::new("/nonexistent/kenyan_locations.json");
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, Error::LocationLoad { .. }));
    }
}
