//! Typed field registry for the registration and media release forms.
//!
//! Every input the forms carry has a [`FieldId`]. The string identifiers are
//! the ones used in draft snapshots and field JSON files, so they stay stable
//! across releases.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of input a field is rendered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Free text (including phone and id numbers).
    Text,
    /// A dropdown or single-choice group.
    Select,
    /// An ISO `YYYY-MM-DD` date.
    Date,
    /// A numeric input.
    Number,
    /// A checkbox.
    Checkbox,
}

/// Which of the two forms a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    /// Student personal details.
    Student,
    /// Media release consent.
    Media,
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Student => write!(f, "student"),
            Self::Media => write!(f, "media"),
        }
    }
}

macro_rules! field_registry {
    ($( $variant:ident => $id:literal, $label:literal, $kind:ident, $form:ident; )*) => {
        /// Identifier of a single form field.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum FieldId {
            $(
                #[doc = $label]
                $variant,
            )*
        }

        impl FieldId {
            /// Every field, in form order.
            pub const ALL: &'static [FieldId] = &[$(FieldId::$variant,)*];

            /// The stable string identifier.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(FieldId::$variant => $id,)*
                }
            }

            /// The human-readable label.
            #[must_use]
            pub fn label(self) -> &'static str {
                match self {
                    $(FieldId::$variant => $label,)*
                }
            }

            /// The input kind.
            #[must_use]
            pub fn kind(self) -> FieldKind {
                match self {
                    $(FieldId::$variant => FieldKind::$kind,)*
                }
            }

            /// The form the field belongs to.
            #[must_use]
            pub fn form(self) -> FormKind {
                match self {
                    $(FieldId::$variant => FormKind::$form,)*
                }
            }
        }
    };
}

field_registry! {
    // Personal information
    FullName => "fullName", "Full Name", Text, Student;
    AdmissionNumber => "admissionNumber", "University Admission Number", Text, Student;
    PhoneNumber => "phoneNumber", "Phone Number", Text, Student;
    NationalId => "nationalId", "National ID Number", Text, Student;
    PassportNo => "passportNo", "Passport Number", Text, Student;
    BirthCertNo => "birthCertNo", "Birth Certificate Number", Text, Student;
    Religion => "religion", "Religion", Text, Student;
    Nationality => "nationality", "Nationality", Text, Student;
    Gender => "gender", "Gender", Select, Student;
    EthnicBackground => "ethnicBackground", "Ethnic Background", Text, Student;
    DateOfBirth => "dateOfBirth", "Date of Birth", Date, Student;
    PlaceOfBirth => "placeOfBirth", "Place of Birth", Text, Student;
    // Location
    PermanentResidence => "permanentResidence", "Permanent Residence", Text, Student;
    Location => "location", "Location", Text, Student;
    County => "county", "County", Select, Student;
    SubCounty => "subCounty", "Sub County", Select, Student;
    Constituency => "constituency", "Constituency", Select, Student;
    Ward => "ward", "Ward", Select, Student;
    ChiefName => "chiefName", "Chief's Name", Text, Student;
    Division => "division", "Division", Text, Student;
    NearestTown => "nearestTown", "Nearest Town", Text, Student;
    NearestPolice => "nearestPolice", "Nearest Police Station", Text, Student;
    HomeAddress => "homeAddress", "Home Address", Text, Student;
    // Marital status
    MaritalStatus => "maritalStatus", "Marital Status", Select, Student;
    SpouseDetails => "spouseDetails", "Spouse Details", Text, Student;
    SpouseOccupation => "spouseOccupation", "Spouse Occupation", Text, Student;
    NumberOfChildren => "numberOfChildren", "Number of Children", Number, Student;
    // Father
    FatherName => "fatherName", "Father's Name", Text, Student;
    FatherStatus => "fatherStatus", "Father's Status", Select, Student;
    FatherPhone => "fatherPhone", "Father's Phone", Text, Student;
    FatherIdNo => "fatherIdNo", "Father's ID Number", Text, Student;
    FatherOccupation => "fatherOccupation", "Father's Occupation", Text, Student;
    FatherDob => "fatherDob", "Father's Date of Birth", Date, Student;
    // Mother
    MotherName => "motherName", "Mother's Name", Text, Student;
    MotherStatus => "motherStatus", "Mother's Status", Select, Student;
    MotherPhone => "motherPhone", "Mother's Phone", Text, Student;
    MotherIdNo => "motherIdNo", "Mother's ID Number", Text, Student;
    MotherOccupation => "motherOccupation", "Mother's Occupation", Text, Student;
    MotherDob => "motherDob", "Mother's Date of Birth", Date, Student;
    // Siblings
    Sibling1 => "sibling1", "Sibling 1", Text, Student;
    Sibling2 => "sibling2", "Sibling 2", Text, Student;
    Sibling3 => "sibling3", "Sibling 3", Text, Student;
    Sibling4 => "sibling4", "Sibling 4", Text, Student;
    Sibling5 => "sibling5", "Sibling 5", Text, Student;
    Sibling6 => "sibling6", "Sibling 6", Text, Student;
    // Emergency contacts
    Emergency1Name => "emergency1Name", "Emergency Contact 1 Name", Text, Student;
    Emergency1Relationship => "emergency1Relationship", "Emergency Contact 1 Relationship", Text, Student;
    Emergency1Id => "emergency1Id", "Emergency Contact 1 ID Number", Text, Student;
    Emergency1Phone => "emergency1Phone", "Emergency Contact 1 Phone", Text, Student;
    Emergency1Address => "emergency1Address", "Emergency Contact 1 Address", Text, Student;
    Emergency2Name => "emergency2Name", "Emergency Contact 2 Name", Text, Student;
    Emergency2Relationship => "emergency2Relationship", "Emergency Contact 2 Relationship", Text, Student;
    Emergency2Id => "emergency2Id", "Emergency Contact 2 ID Number", Text, Student;
    Emergency2Phone => "emergency2Phone", "Emergency Contact 2 Phone", Text, Student;
    Emergency2Address => "emergency2Address", "Emergency Contact 2 Address", Text, Student;
    // Academic
    SchoolAttended => "schoolAttended", "Secondary School Attended", Text, Student;
    SchoolAddress => "schoolAddress", "School Address", Text, Student;
    KcseResults => "kcseResults", "KCSE Results", Text, Student;
    KcseResults2 => "kcseResults2", "Additional KCSE Results", Text, Student;
    IndexNumber => "indexNumber", "KCSE Index Number", Text, Student;
    KcseYear => "kcseYear", "KCSE Year", Number, Student;
    OtherInstitutions => "otherInstitutions", "Other Institutions Attended", Text, Student;
    // Interests
    SportsInterests => "sportsInterests", "Sports Interests", Text, Student;
    ClubsInterests => "clubsInterests", "Clubs and Societies", Text, Student;
    // Additional
    PhysicalImpairment => "physicalImpairment", "Physical Impairment", Text, Student;
    AdditionalInfo => "additionalInfo", "Additional Information", Text, Student;
    // Consent
    DataConsent => "dataConsent", "Data processing consent", Checkbox, Student;
    DataRights => "dataRights", "Rights acknowledgment", Checkbox, Student;
    // Media release
    MediaFullName => "mediaFullName", "Media Release Full Name", Text, Media;
    MediaIdNumber => "mediaIdNumber", "Media Release ID Number", Text, Media;
    MediaDate => "mediaDate", "Media Release Date", Date, Media;
    MediaSignatureName => "mediaSignatureName", "Media Release Signature Name", Text, Media;
}

/// Sibling name fields, in order.
pub const SIBLING_FIELDS: [FieldId; 6] = [
    FieldId::Sibling1,
    FieldId::Sibling2,
    FieldId::Sibling3,
    FieldId::Sibling4,
    FieldId::Sibling5,
    FieldId::Sibling6,
];

/// Phone fields checked against the mobile number rule when filled.
pub const PHONE_FIELDS: [FieldId; 5] = [
    FieldId::PhoneNumber,
    FieldId::FatherPhone,
    FieldId::MotherPhone,
    FieldId::Emergency1Phone,
    FieldId::Emergency2Phone,
];

/// The location dropdowns, parent first.
pub const LOCATION_FIELDS: [FieldId; 4] = [
    FieldId::County,
    FieldId::SubCounty,
    FieldId::Constituency,
    FieldId::Ward,
];

impl FieldId {
    /// Fields belonging to the given form, in form order.
    pub fn for_form(form: FormKind) -> impl Iterator<Item = FieldId> {
        Self::ALL.iter().copied().filter(move |f| f.form() == form)
    }

    /// Whether the field is a checkbox.
    #[must_use]
    pub fn is_checkbox(self) -> bool {
        self.kind() == FieldKind::Checkbox
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown field identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown field: {}", self.0)
    }
}

impl std::error::Error for UnknownField {}

impl FromStr for FieldId {
    type Err = UnknownField;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

impl Serialize for FieldId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The value held by a field: text for inputs and selects, a flag for
/// checkboxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Checkbox state.
    Checked(bool),
    /// Text, select or date value.
    Text(String),
}

impl FieldValue {
    /// Whether the value counts as filled in.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        match self {
            Self::Checked(checked) => *checked,
            Self::Text(text) => !text.trim().is_empty(),
        }
    }
}

/// Fill progress of one form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormProgress {
    /// Number of filled fields.
    pub filled: usize,
    /// Number of fields on the form.
    pub total: usize,
    /// Rounded percentage.
    pub percent: u32,
}

/// The live values of every field on both forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    values: BTreeMap<FieldId, FieldValue>,
}

impl FieldSet {
    /// Create an empty field set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a text value.
    pub fn set_text(&mut self, field: FieldId, value: impl Into<String>) {
        self.values.insert(field, FieldValue::Text(value.into()));
    }

    /// Set a checkbox state.
    pub fn set_checked(&mut self, field: FieldId, checked: bool) {
        self.values.insert(field, FieldValue::Checked(checked));
    }

    /// Set a raw value.
    pub fn set(&mut self, field: FieldId, value: FieldValue) {
        self.values.insert(field, value);
    }

    /// Reset a field to its empty state.
    pub fn clear_field(&mut self, field: FieldId) {
        self.values.remove(&field);
    }

    /// Reset every field.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Get the raw value, if one was ever set.
    #[must_use]
    pub fn get(&self, field: FieldId) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    /// Text value of a field, empty when unset or a checkbox.
    #[must_use]
    pub fn text(&self, field: FieldId) -> &str {
        match self.values.get(&field) {
            Some(FieldValue::Text(text)) => text,
            _ => "",
        }
    }

    /// Trimmed text value, `None` when blank.
    #[must_use]
    pub fn value(&self, field: FieldId) -> Option<&str> {
        let text = self.text(field).trim();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Owned trimmed text value, `None` when blank.
    #[must_use]
    pub fn optional(&self, field: FieldId) -> Option<String> {
        self.value(field).map(str::to_string)
    }

    /// Whether a checkbox is checked.
    #[must_use]
    pub fn is_checked(&self, field: FieldId) -> bool {
        matches!(self.values.get(&field), Some(FieldValue::Checked(true)))
    }

    /// Whether a field counts as filled in.
    #[must_use]
    pub fn is_filled(&self, field: FieldId) -> bool {
        self.values.get(&field).is_some_and(FieldValue::is_filled)
    }

    /// Iterate over set values in form order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &FieldValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Whether no field has been set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fill progress of a form.
    #[must_use]
    pub fn progress(&self, form: FormKind) -> FormProgress {
        let mut total = 0;
        let mut filled = 0;
        for field in FieldId::for_form(form) {
            total += 1;
            if self.is_filled(field) {
                filled += 1;
            }
        }
        FormProgress {
            filled,
            total,
            percent: percent(filled, total),
        }
    }
}

/// Rounded percentage of `part` over `whole`; zero when `whole` is zero.
#[must_use]
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    let value = (part as f64 / whole as f64 * 100.0).round();
    // Bounded to 0..=100 by construction.
    value as u32
}
