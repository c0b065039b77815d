//! Kenyan administrative locations: dataset loading, lookups and the
//! dependent dropdown cascade.

pub mod cascade;
pub mod dataset;
pub mod fallback;
pub mod hierarchy;
pub mod normalize;

pub use cascade::{
    CascadeLevel, DropdownOption, DropdownState, LocationCascade, LocationSelection,
    PendingPopulation, Population, SelectedConstituency, SelectedCounty, SelectedSubCounty,
    SelectedWard,
};
pub use dataset::{
    County, CountyId, DatasetSource, FileSource, LocationDataset, StaticSource, SubCounty,
    SubCountyId, Ward, WardId,
};
pub use fallback::FALLBACK_COUNTIES;
pub use hierarchy::{DataSource, LocationHierarchy, LocationLoader};
pub use normalize::normalize_display_name;
