//! Parent/child lookups over a loaded dataset, and the single-shot loader.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::cascade::LocationSelection;
use super::dataset::{
    County, CountyId, DatasetSource, LocationDataset, SubCounty, SubCountyId, Ward, WardId,
};
use super::fallback::fallback_dataset;
use super::normalize::display_order;
use crate::error::{Error, Result};
use crate::fields::percent;

/// Where the active dataset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// The full dataset loaded successfully.
    Complete,
    /// The static county list.
    Fallback,
}

impl DataSource {
    /// Value stored in record metadata.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Fallback => "fallback",
        }
    }
}

/// Sorted, indexed view over a [`LocationDataset`].
#[derive(Debug, Clone)]
pub struct LocationHierarchy {
    dataset: LocationDataset,
    counties: Vec<usize>,
    sub_counties_by_county: HashMap<CountyId, Vec<usize>>,
    wards_by_sub_county: HashMap<SubCountyId, Vec<usize>>,
}

impl LocationHierarchy {
    /// Index a dataset. Children are sorted by display name,
    /// case-insensitively.
    #[must_use]
    pub fn new(dataset: LocationDataset) -> Self {
        let mut counties: Vec<usize> = (0..dataset.counties().len()).collect();
        counties.sort_by(|&a, &b| {
            let (a, b) = (&dataset.counties()[a], &dataset.counties()[b]);
            display_order(&a.display_name, &a.raw_name, &b.display_name, &b.raw_name)
        });

        let mut sub_counties_by_county: HashMap<CountyId, Vec<usize>> = HashMap::new();
        for (index, sub_county) in dataset.sub_counties().iter().enumerate() {
            sub_counties_by_county
                .entry(sub_county.county_id.clone())
                .or_default()
                .push(index);
        }
        for children in sub_counties_by_county.values_mut() {
            children.sort_by(|&a, &b| {
                let (a, b) = (&dataset.sub_counties()[a], &dataset.sub_counties()[b]);
                display_order(&a.display_name, &a.raw_name, &b.display_name, &b.raw_name)
            });
        }

        let mut wards_by_sub_county: HashMap<SubCountyId, Vec<usize>> = HashMap::new();
        for (index, ward) in dataset.wards().iter().enumerate() {
            wards_by_sub_county
                .entry(ward.sub_county_id.clone())
                .or_default()
                .push(index);
        }
        for children in wards_by_sub_county.values_mut() {
            children.sort_by(|&a, &b| {
                let (a, b) = (&dataset.wards()[a], &dataset.wards()[b]);
                display_order(&a.display_name, &a.raw_name, &b.display_name, &b.raw_name)
            });
        }

        Self {
            dataset,
            counties,
            sub_counties_by_county,
            wards_by_sub_county,
        }
    }

    /// Hierarchy over the static county list.
    #[must_use]
    pub fn fallback() -> Self {
        Self::new(fallback_dataset())
    }

    /// Fetch and parse a dataset, degrading to the fallback list on any
    /// failure (I/O, malformed structure, timeout). Never fails.
    pub async fn load(source: &dyn DatasetSource, timeout: Duration) -> Self {
        match Self::try_load(source, timeout).await {
            Ok(hierarchy) => {
                info!(
                    source = %source.describe(),
                    counties = hierarchy.dataset.counties().len(),
                    sub_counties = hierarchy.dataset.sub_counties().len(),
                    wards = hierarchy.dataset.wards().len(),
                    "Location data loaded"
                );
                hierarchy
            }
            Err(e) => {
                warn!(source = %source.describe(), error = %e, "Using fallback county list");
                Self::fallback()
            }
        }
    }

    async fn try_load(source: &dyn DatasetSource, timeout: Duration) -> Result<Self> {
        let text = tokio::time::timeout(timeout, source.fetch())
            .await
            .map_err(|_| Error::Timeout {
                operation: format!("loading location data from {}", source.describe()),
            })??;
        let dataset = LocationDataset::from_json(&text)?;
        Ok(Self::new(dataset))
    }

    /// The underlying dataset.
    #[must_use]
    pub fn dataset(&self) -> &LocationDataset {
        &self.dataset
    }

    /// Whether this is the static county-only list.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.dataset.is_fallback()
    }

    /// Where the data came from.
    #[must_use]
    pub fn source(&self) -> DataSource {
        if self.is_fallback() {
            DataSource::Fallback
        } else {
            DataSource::Complete
        }
    }

    /// All counties, sorted by display name.
    #[must_use]
    pub fn counties(&self) -> Vec<&County> {
        self.counties
            .iter()
            .map(|&i| &self.dataset.counties()[i])
            .collect()
    }

    /// Look up a county.
    #[must_use]
    pub fn county(&self, id: &CountyId) -> Option<&County> {
        self.dataset.counties().iter().find(|c| &c.id == id)
    }

    /// Look up a sub-county.
    #[must_use]
    pub fn sub_county(&self, id: &SubCountyId) -> Option<&SubCounty> {
        self.dataset.sub_counties().iter().find(|s| &s.id == id)
    }

    /// Look up a ward.
    #[must_use]
    pub fn ward(&self, id: &WardId) -> Option<&Ward> {
        self.dataset.wards().iter().find(|w| &w.id == id)
    }

    /// Sub-counties of a county, sorted. Empty in fallback mode, for unknown
    /// counties and for counties without children.
    #[must_use]
    pub fn children_of_county(&self, id: &CountyId) -> Vec<&SubCounty> {
        self.sub_counties_by_county
            .get(id)
            .map(|children| {
                children
                    .iter()
                    .map(|&i| &self.dataset.sub_counties()[i])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Wards of a sub-county, sorted.
    #[must_use]
    pub fn children_of_sub_county(&self, id: &SubCountyId) -> Vec<&Ward> {
        self.wards_by_sub_county
            .get(id)
            .map(|children| children.iter().map(|&i| &self.dataset.wards()[i]).collect())
            .unwrap_or_default()
    }

    /// Share of the four location levels that are selected, as a rounded
    /// percentage.
    #[must_use]
    pub fn completeness(selection: &LocationSelection) -> u32 {
        percent(selection.populated_levels(), 4)
    }
}

/// Loads the location hierarchy at most once and hands out shared copies.
pub struct LocationLoader {
    source: Box<dyn DatasetSource>,
    timeout: Duration,
    cell: OnceCell<Arc<LocationHierarchy>>,
}

impl std::fmt::Debug for LocationLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationLoader")
            .field("source", &self.source.describe())
            .field("timeout", &self.timeout)
            .field("loaded", &self.cell.initialized())
            .finish()
    }
}

impl LocationLoader {
    /// Create a loader over `source`.
    pub fn new(source: impl DatasetSource + 'static, timeout: Duration) -> Self {
        Self {
            source: Box::new(source),
            timeout,
            cell: OnceCell::new(),
        }
    }

    /// The hierarchy, loading it on first call. Concurrent first callers
    /// share a single fetch.
    pub async fn get(&self) -> Arc<LocationHierarchy> {
        self.cell
            .get_or_init(|| async {
                Arc::new(LocationHierarchy::load(self.source.as_ref(), self.timeout).await)
            })
            .await
            .clone()
    }

    /// Whether the hierarchy has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}
