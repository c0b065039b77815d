//! Static county list used when the dataset cannot be loaded.

use super::dataset::{County, CountyId, LocationDataset};

/// The 47 counties of Kenya, in the order their fallback ids are assigned.
pub const FALLBACK_COUNTIES: [&str; 47] = [
    "Baringo",
    "Bomet",
    "Bungoma",
    "Busia",
    "Elgeyo-Marakwet",
    "Embu",
    "Garissa",
    "Homa Bay",
    "Isiolo",
    "Kajiado",
    "Kakamega",
    "Kericho",
    "Kiambu",
    "Kilifi",
    "Kirinyaga",
    "Kisii",
    "Kisumu",
    "Kitui",
    "Kwale",
    "Laikipia",
    "Lamu",
    "Machakos",
    "Makueni",
    "Mandera",
    "Marsabit",
    "Meru",
    "Migori",
    "Mombasa",
    "Murang'a",
    "Nairobi",
    "Nakuru",
    "Nandi",
    "Narok",
    "Nyamira",
    "Nyandarua",
    "Nyeri",
    "Samburu",
    "Siaya",
    "Taita-Taveta",
    "Tana River",
    "Tharaka-Nithi",
    "Trans Nzoia",
    "Turkana",
    "Uasin Gishu",
    "Vihiga",
    "Wajir",
    "West Pokot",
];

/// Build the fallback dataset: counties only, ids `001`..`047`, names kept
/// exactly as listed.
#[must_use]
pub fn fallback_dataset() -> LocationDataset {
    let counties = FALLBACK_COUNTIES
        .iter()
        .enumerate()
        .map(|(index, name)| County {
            id: CountyId::new(format!("{:03}", index + 1)),
            raw_name: (*name).to_string(),
            display_name: (*name).to_string(),
        })
        .collect();

    LocationDataset::fallback(counties)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_has_47_counties() {
        let dataset = fallback_dataset();
        assert!(dataset.is_fallback());
        assert_eq!(dataset.counties().len(), 47);
        assert!(dataset.sub_counties().is_empty());
        assert!(dataset.wards().is_empty());
    }

    #[test]
    fn test_fallback_ids_are_padded() {
        let dataset = fallback_dataset();
        let first = &dataset.counties()[0];
        assert_eq!(first.id.as_str(), "001");
        assert_eq!(first.display_name, "Baringo");

        let last = dataset
            .counties()
            .iter()
            .find(|c| c.id.as_str() == "047")
            .unwrap();
        assert_eq!(last.display_name, "West Pokot");
    }

    #[test]
    fn test_fallback_keeps_hyphenated_names() {
        let dataset = fallback_dataset();
        assert!(dataset
            .counties()
            .iter()
            .any(|c| c.display_name == "Elgeyo-Marakwet"));
    }
}
