//! County → sub-county → constituency → ward dropdown cascade.
//!
//! Selecting a level synchronously resets every level below it, then hands
//! back a [`PendingPopulation`]. The caller resolves it into a
//! [`Population`] (possibly later) and applies it. Every selection bumps a
//! generation counter, and populations from older generations are dropped,
//! so a slow repopulation can never overwrite a newer choice.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::dataset::{CountyId, SubCountyId, WardId};
use super::hierarchy::LocationHierarchy;

const SELECT_COUNTY_FIRST: &str = "Select county first";
const SELECT_SUB_COUNTY_FIRST: &str = "Select sub-county first";
const SELECT_CONSTITUENCY_FIRST: &str = "Select constituency first";
const SUB_COUNTY_DATA_UNAVAILABLE: &str = "County selected - subcounty data unavailable";
const NO_SUB_COUNTIES: &str = "No subcounties found for this county";
const NO_WARDS: &str = "No wards found for this constituency";

/// The selected county.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedCounty {
    /// County id.
    pub id: CountyId,
    /// Dataset name.
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Whether the county came from the static list.
    pub is_fallback: bool,
}

/// The selected sub-county.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedSubCounty {
    /// Sub-county id.
    pub id: SubCountyId,
    /// Dataset name.
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Parent county.
    pub county_id: CountyId,
}

/// The constituency, derived from the sub-county.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedConstituency {
    /// Constituency id; equal to the sub-county id.
    pub id: SubCountyId,
    /// Dataset name.
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Parent sub-county.
    #[serde(rename = "subcountyId")]
    pub sub_county_id: SubCountyId,
}

/// The selected ward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedWard {
    /// Ward id.
    pub id: WardId,
    /// Dataset name.
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Parent constituency.
    pub constituency_id: SubCountyId,
}

/// Current location selection. A child level is never set without its
/// parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSelection {
    /// Selected county.
    pub county: Option<SelectedCounty>,
    /// Selected sub-county.
    pub sub_county: Option<SelectedSubCounty>,
    /// Derived constituency.
    pub constituency: Option<SelectedConstituency>,
    /// Selected ward.
    pub ward: Option<SelectedWard>,
}

impl LocationSelection {
    /// Number of selected levels, 0 to 4.
    #[must_use]
    pub fn populated_levels(&self) -> usize {
        usize::from(self.county.is_some())
            + usize::from(self.sub_county.is_some())
            + usize::from(self.constituency.is_some())
            + usize::from(self.ward.is_some())
    }

    /// Whether a county is selected.
    #[must_use]
    pub fn has_county(&self) -> bool {
        self.county.is_some()
    }
}

/// One entry of a dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropdownOption {
    /// Submitted value (the id).
    pub value: String,
    /// Shown label (the display name).
    pub label: String,
}

/// Presentation state of a dependent dropdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropdownState {
    /// Parent not chosen; the placeholder asks for it.
    Disabled(&'static str),
    /// Waiting for a population to be applied.
    Loading,
    /// Parent chosen but no children can be offered.
    Unavailable(&'static str),
    /// Options to choose from.
    Ready(Vec<DropdownOption>),
}

impl DropdownState {
    /// Whether the dropdown accepts a choice.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Available options, empty unless ready.
    #[must_use]
    pub fn options(&self) -> &[DropdownOption] {
        match self {
            Self::Ready(options) => options,
            _ => &[],
        }
    }

    fn offers(&self, value: &str) -> bool {
        self.options().iter().any(|o| o.value == value)
    }
}

/// A dependent level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeLevel {
    /// Sub-counties of the selected county.
    SubCounty,
    /// Wards of the selected sub-county.
    Ward,
}

/// A repopulation request produced by a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPopulation {
    generation: u64,
    level: CascadeLevel,
    parent: String,
}

impl PendingPopulation {
    /// The level to populate.
    #[must_use]
    pub fn level(&self) -> CascadeLevel {
        self.level
    }

    /// Resolve the options for this request.
    #[must_use]
    pub fn resolve(&self, hierarchy: &LocationHierarchy) -> Population {
        let options = match self.level {
            CascadeLevel::SubCounty => hierarchy
                .children_of_county(&CountyId::from(self.parent.as_str()))
                .into_iter()
                .map(|s| DropdownOption {
                    value: s.id.to_string(),
                    label: s.display_name.clone(),
                })
                .collect(),
            CascadeLevel::Ward => hierarchy
                .children_of_sub_county(&SubCountyId::from(self.parent.as_str()))
                .into_iter()
                .map(|w| DropdownOption {
                    value: w.id.to_string(),
                    label: w.display_name.clone(),
                })
                .collect(),
        };
        Population {
            generation: self.generation,
            level: self.level,
            options,
        }
    }
}

/// Resolved options for a level, tagged with the generation that asked for
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Population {
    generation: u64,
    level: CascadeLevel,
    options: Vec<DropdownOption>,
}

/// Selection state and dependent dropdowns for one form.
#[derive(Debug, Clone)]
pub struct LocationCascade {
    hierarchy: Arc<LocationHierarchy>,
    selection: LocationSelection,
    sub_counties: DropdownState,
    constituencies: DropdownState,
    wards: DropdownState,
    generation: u64,
}

impl LocationCascade {
    /// Start with nothing selected.
    #[must_use]
    pub fn new(hierarchy: Arc<LocationHierarchy>) -> Self {
        Self {
            hierarchy,
            selection: LocationSelection::default(),
            sub_counties: DropdownState::Disabled(SELECT_COUNTY_FIRST),
            constituencies: DropdownState::Disabled(SELECT_SUB_COUNTY_FIRST),
            wards: DropdownState::Disabled(SELECT_CONSTITUENCY_FIRST),
            generation: 0,
        }
    }

    /// The hierarchy the cascade resolves against.
    #[must_use]
    pub fn hierarchy(&self) -> &Arc<LocationHierarchy> {
        &self.hierarchy
    }

    /// The current selection.
    #[must_use]
    pub fn selection(&self) -> &LocationSelection {
        &self.selection
    }

    /// County dropdown options, sorted.
    #[must_use]
    pub fn county_options(&self) -> Vec<DropdownOption> {
        self.hierarchy
            .counties()
            .into_iter()
            .map(|c| DropdownOption {
                value: c.id.to_string(),
                label: c.display_name.clone(),
            })
            .collect()
    }

    /// Sub-county dropdown state.
    #[must_use]
    pub fn sub_county_state(&self) -> &DropdownState {
        &self.sub_counties
    }

    /// Constituency dropdown state.
    #[must_use]
    pub fn constituency_state(&self) -> &DropdownState {
        &self.constituencies
    }

    /// Ward dropdown state.
    #[must_use]
    pub fn ward_state(&self) -> &DropdownState {
        &self.wards
    }

    /// Current generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Choose a county, or clear it with `None`.
    ///
    /// All lower levels are reset first. Returns the sub-county population
    /// to resolve, or `None` when there is nothing to populate (no county,
    /// unknown county, or fallback data).
    pub fn select_county(&mut self, id: Option<&CountyId>) -> Option<PendingPopulation> {
        self.generation += 1;
        self.reset_below_county();
        self.selection.county = None;

        let id = id?;
        let Some(county) = self.hierarchy.county(id) else {
            debug!(county_id = %id, "Ignoring unknown county");
            return None;
        };
        self.selection.county = Some(SelectedCounty {
            id: county.id.clone(),
            name: county.raw_name.clone(),
            display_name: county.display_name.clone(),
            is_fallback: self.hierarchy.is_fallback(),
        });

        if self.hierarchy.is_fallback() {
            self.sub_counties = DropdownState::Unavailable(SUB_COUNTY_DATA_UNAVAILABLE);
            return None;
        }

        self.sub_counties = DropdownState::Loading;
        trace!(county_id = %id, generation = self.generation, "Populating sub-counties");
        Some(PendingPopulation {
            generation: self.generation,
            level: CascadeLevel::SubCounty,
            parent: id.to_string(),
        })
    }

    /// Choose a sub-county, or clear it with `None`.
    ///
    /// The constituency is set to the sub-county automatically. Returns the
    /// ward population to resolve. A sub-county the current dropdown does
    /// not offer is ignored.
    pub fn select_sub_county(&mut self, id: Option<&SubCountyId>) -> Option<PendingPopulation> {
        let Some(id) = id else {
            self.clear_sub_county();
            return None;
        };
        if !self.sub_counties.offers(id.as_str()) {
            debug!(subcounty_id = %id, "Ignoring sub-county not offered by the dropdown");
            return None;
        }
        let sub_county = self.hierarchy.sub_county(id)?.clone();

        self.generation += 1;
        self.reset_below_sub_county();

        self.selection.sub_county = Some(SelectedSubCounty {
            id: sub_county.id.clone(),
            name: sub_county.raw_name.clone(),
            display_name: sub_county.display_name.clone(),
            county_id: sub_county.county_id.clone(),
        });
        self.selection.constituency = Some(SelectedConstituency {
            id: sub_county.id.clone(),
            name: sub_county.raw_name.clone(),
            display_name: sub_county.display_name.clone(),
            sub_county_id: sub_county.id.clone(),
        });
        self.constituencies = DropdownState::Ready(vec![DropdownOption {
            value: sub_county.id.to_string(),
            label: sub_county.display_name.clone(),
        }]);

        self.wards = DropdownState::Loading;
        trace!(subcounty_id = %id, generation = self.generation, "Populating wards");
        Some(PendingPopulation {
            generation: self.generation,
            level: CascadeLevel::Ward,
            parent: id.to_string(),
        })
    }

    /// Clear the sub-county and everything below it.
    pub fn clear_sub_county(&mut self) {
        self.generation += 1;
        self.reset_below_sub_county();
    }

    /// Choose a ward, or clear it with `None`. Returns whether the
    /// selection changed to the requested ward.
    pub fn select_ward(&mut self, id: Option<&WardId>) -> bool {
        let Some(id) = id else {
            self.selection.ward = None;
            return true;
        };
        if !self.wards.offers(id.as_str()) {
            debug!(ward_id = %id, "Ignoring ward not offered by the dropdown");
            return false;
        }
        let (Some(ward), Some(constituency)) =
            (self.hierarchy.ward(id), self.selection.constituency.as_ref())
        else {
            return false;
        };
        self.selection.ward = Some(SelectedWard {
            id: ward.id.clone(),
            name: ward.raw_name.clone(),
            display_name: ward.display_name.clone(),
            constituency_id: constituency.id.clone(),
        });
        true
    }

    /// Apply a resolved population. Returns `false` and changes nothing
    /// when a newer selection has been made since it was requested.
    pub fn apply(&mut self, population: Population) -> bool {
        if population.generation != self.generation {
            debug!(
                requested = population.generation,
                current = self.generation,
                "Discarding stale location population"
            );
            return false;
        }

        let state = if population.options.is_empty() {
            DropdownState::Unavailable(match population.level {
                CascadeLevel::SubCounty => NO_SUB_COUNTIES,
                CascadeLevel::Ward => NO_WARDS,
            })
        } else {
            DropdownState::Ready(population.options)
        };
        match population.level {
            CascadeLevel::SubCounty => self.sub_counties = state,
            CascadeLevel::Ward => self.wards = state,
        }
        true
    }

    /// Select a county and populate its sub-counties in one step.
    pub fn choose_county(&mut self, id: Option<&CountyId>) {
        if let Some(pending) = self.select_county(id) {
            let population = pending.resolve(&self.hierarchy);
            self.apply(population);
        }
    }

    /// Select a sub-county and populate its wards in one step.
    pub fn choose_sub_county(&mut self, id: Option<&SubCountyId>) {
        if let Some(pending) = self.select_sub_county(id) {
            let population = pending.resolve(&self.hierarchy);
            self.apply(population);
        }
    }

    /// Rebuild a selection level by level, as when restoring a draft.
    /// Levels that are no longer valid are dropped along with everything
    /// below them.
    pub fn replay(
        &mut self,
        county: Option<&CountyId>,
        sub_county: Option<&SubCountyId>,
        ward: Option<&WardId>,
    ) -> &LocationSelection {
        self.choose_county(county);
        if self.selection.county.is_some() && sub_county.is_some() {
            self.choose_sub_county(sub_county);
            if self.selection.sub_county.is_some() && ward.is_some() {
                self.select_ward(ward);
            }
        }
        &self.selection
    }

    /// Clear every level.
    pub fn reset(&mut self) {
        self.select_county(None);
    }

    fn reset_below_county(&mut self) {
        self.selection.sub_county = None;
        self.sub_counties = DropdownState::Disabled(SELECT_COUNTY_FIRST);
        self.reset_below_sub_county();
    }

    fn reset_below_sub_county(&mut self) {
        self.selection.sub_county = None;
        self.selection.constituency = None;
        self.selection.ward = None;
        self.constituencies = DropdownState::Disabled(SELECT_SUB_COUNTY_FIRST);
        self.wards = DropdownState::Disabled(SELECT_CONSTITUENCY_FIRST);
    }
}

#[cfg(test)]
mod tests {
    use super::super::dataset::fixtures::SPLIT;
    use super::super::dataset::LocationDataset;
    use super::*;

    fn cascade() -> LocationCascade {
        let dataset = LocationDataset::from_json(SPLIT).unwrap();
        LocationCascade::new(Arc::new(LocationHierarchy::new(dataset)))
    }

    fn county(id: &str) -> CountyId {
        CountyId::from(id)
    }

    fn sub_county(id: &str) -> SubCountyId {
        SubCountyId::from(id)
    }

    #[test]
    fn test_initial_state() {
        let c = cascade();
        assert_eq!(c.selection().populated_levels(), 0);
        assert_eq!(c.sub_county_state(), &DropdownState::Disabled(SELECT_COUNTY_FIRST));
        assert_eq!(c.ward_state(), &DropdownState::Disabled(SELECT_CONSTITUENCY_FIRST));
        assert_eq!(c.county_options().len(), 3);
    }

    #[test]
    fn test_select_county_populates_sub_counties() {
        let mut c = cascade();
        let pending = c.select_county(Some(&county("027"))).unwrap();
        assert_eq!(c.sub_county_state(), &DropdownState::Loading);
        assert_eq!(pending.level(), CascadeLevel::SubCounty);

        let population = pending.resolve(c.hierarchy());
        assert!(c.apply(population));

        let labels: Vec<_> = c
            .sub_county_state()
            .options()
            .iter()
            .map(|o| o.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Ainabkoi", "Soy"]);
        assert_eq!(c.selection().county.as_ref().unwrap().display_name, "Uasin Gishu");
    }

    #[test]
    fn test_county_without_children_is_unavailable() {
        let mut c = cascade();
        c.choose_county(Some(&county("47")));

        assert_eq!(c.sub_county_state(), &DropdownState::Unavailable(NO_SUB_COUNTIES));
        assert!(!c.sub_county_state().is_enabled());
        assert!(c.selection().has_county());
    }

    #[test]
    fn test_reselecting_county_clears_descendants() {
        let mut c = cascade();
        c.choose_county(Some(&county("027")));
        c.choose_sub_county(Some(&sub_county("141")));
        assert!(c.select_ward(Some(&WardId::from("702"))));
        assert_eq!(c.selection().populated_levels(), 4);

        c.choose_county(Some(&county("028")));

        assert!(c.selection().sub_county.is_none());
        assert!(c.selection().constituency.is_none());
        assert!(c.selection().ward.is_none());
        assert_eq!(c.ward_state(), &DropdownState::Disabled(SELECT_CONSTITUENCY_FIRST));
    }

    #[test]
    fn test_sub_county_sets_constituency() {
        let mut c = cascade();
        c.choose_county(Some(&county("027")));
        c.choose_sub_county(Some(&sub_county("142")));

        let constituency = c.selection().constituency.as_ref().unwrap();
        assert_eq!(constituency.id.as_str(), "142");
        assert_eq!(constituency.display_name, "Ainabkoi");
        assert_eq!(c.constituency_state().options().len(), 1);
        assert_eq!(c.ward_state().options()[0].label, "Kapsoya");
    }

    #[test]
    fn test_clearing_sub_county_resets_lower_levels() {
        let mut c = cascade();
        c.choose_county(Some(&county("027")));
        c.choose_sub_county(Some(&sub_county("141")));
        let before = c.generation();

        c.choose_sub_county(None);

        let selection = c.selection();
        assert!(selection.county.is_some());
        assert!(selection.sub_county.is_none());
        assert!(selection.constituency.is_none());
        assert!(selection.ward.is_none());
        assert!(!c.ward_state().is_enabled());
        assert!(c.generation() > before);
    }

    #[test]
    fn test_sub_county_without_wards_is_unavailable() {
        let mut c = cascade();
        c.choose_county(Some(&county("028")));
        c.choose_sub_county(Some(&sub_county("148")));
        assert_eq!(c.ward_state(), &DropdownState::Unavailable(NO_WARDS));
    }

    #[test]
    fn test_sub_county_of_other_county_is_ignored() {
        let mut c = cascade();
        c.choose_county(Some(&county("027")));
        assert!(c.select_sub_county(Some(&sub_county("148"))).is_none());
        assert!(c.selection().sub_county.is_none());
    }

    #[test]
    fn test_stale_population_is_discarded() {
        let mut c = cascade();
        let first = c.select_county(Some(&county("027"))).unwrap();
        let second = c.select_county(Some(&county("028"))).unwrap();

        let stale = first.resolve(c.hierarchy());
        assert!(!c.apply(stale));
        assert_eq!(c.sub_county_state(), &DropdownState::Loading);

        let fresh = second.resolve(c.hierarchy());
        assert!(c.apply(fresh));
        let labels: Vec<_> = c
            .sub_county_state()
            .options()
            .iter()
            .map(|o| o.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Keiyo North"]);
    }

    #[test]
    fn test_stale_ward_population_after_county_change() {
        let mut c = cascade();
        c.choose_county(Some(&county("027")));
        let wards = c.select_sub_county(Some(&sub_county("141"))).unwrap();
        c.choose_county(Some(&county("027")));

        assert!(!c.apply(wards.resolve(c.hierarchy())));
        assert_eq!(c.ward_state(), &DropdownState::Disabled(SELECT_CONSTITUENCY_FIRST));
    }

    #[test]
    fn test_select_then_select_other_clears_sub_county() {
        for (a, b) in [("027", "028"), ("028", "027"), ("027", "47"), ("027", "027")] {
            let mut c = cascade();
            c.choose_county(Some(&county(a)));
            if let Some(first) = c.sub_county_state().options().first().cloned() {
                c.choose_sub_county(Some(&sub_county(&first.value)));
            }
            c.choose_county(Some(&county(b)));
            assert!(c.selection().sub_county.is_none(), "{a} -> {b}");
        }
    }

    #[test]
    fn test_fallback_county_marks_sub_county_unavailable() {
        let mut c = LocationCascade::new(Arc::new(LocationHierarchy::fallback()));
        assert!(c.select_county(Some(&county("001"))).is_none());

        let selected = c.selection().county.as_ref().unwrap();
        assert!(selected.is_fallback);
        assert_eq!(selected.display_name, "Baringo");
        assert_eq!(
            c.sub_county_state(),
            &DropdownState::Unavailable(SUB_COUNTY_DATA_UNAVAILABLE)
        );
    }

    #[test]
    fn test_unknown_county_clears_selection() {
        let mut c = cascade();
        c.choose_county(Some(&county("027")));
        c.choose_county(Some(&county("999")));
        assert!(!c.selection().has_county());
    }

    #[test]
    fn test_select_ward_requires_offered_ward() {
        let mut c = cascade();
        c.choose_county(Some(&county("027")));
        c.choose_sub_county(Some(&sub_county("141")));
        assert!(!c.select_ward(Some(&WardId::from("710"))));
        assert!(c.select_ward(Some(&WardId::from("701"))));
        assert_eq!(
            c.selection().ward.as_ref().unwrap().constituency_id.as_str(),
            "141"
        );
        assert!(c.select_ward(None));
        assert!(c.selection().ward.is_none());
    }

    #[test]
    fn test_replay_drops_invalid_levels() {
        let mut c = cascade();
        let selection = c
            .replay(
                Some(&county("027")),
                Some(&sub_county("148")),
                Some(&WardId::from("720")),
            )
            .clone();
        assert!(selection.county.is_some());
        assert!(selection.sub_county.is_none());
        assert!(selection.ward.is_none());

        let selection = c
            .replay(
                Some(&county("027")),
                Some(&sub_county("141")),
                Some(&WardId::from("703")),
            )
            .clone();
        assert_eq!(selection.populated_levels(), 4);
    }

    #[test]
    fn test_selection_serializes_camel_case() {
        let mut c = cascade();
        c.choose_county(Some(&county("027")));
        c.choose_sub_county(Some(&sub_county("141")));
        let json = serde_json::to_value(c.selection()).unwrap();

        assert_eq!(json["county"]["displayName"], "Uasin Gishu");
        assert_eq!(json["county"]["isFallback"], false);
        assert_eq!(json["subCounty"]["countyId"], "027");
        assert_eq!(json["constituency"]["subcountyId"], "141");
        assert!(json["ward"].is_null());
    }
}
