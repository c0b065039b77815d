//! The nested submission record and the aggregator that builds it.
//!
//! A [`SubmissionRecord`] is built fresh from the live field set on every
//! submission attempt. Optional values that are blank serialize as `null`.

// Field names below are the stored document keys.
#![allow(missing_docs)]

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::config::FormConfig;
use crate::fields::{FieldId, FieldSet, FormKind, SIBLING_FIELDS};
use crate::location::{DataSource, LocationHierarchy, LocationSelection};
use crate::validation::rules::{age_on, parse_date};

/// User agent stamped on records built by this crate.
pub const USER_AGENT: &str = concat!("studentform/", env!("CARGO_PKG_VERSION"));

/// Age bracket used in analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    /// 19 and under.
    #[serde(rename = "17-19")]
    UpTo19,
    /// 20 to 22.
    #[serde(rename = "20-22")]
    From20To22,
    /// 23 to 25.
    #[serde(rename = "23-25")]
    From23To25,
    /// 26 and over.
    #[serde(rename = "26+")]
    From26,
}

impl AgeGroup {
    /// Bracket for an age; `None` when the age is unknown or not positive.
    #[must_use]
    pub fn for_age(age: Option<i32>) -> Option<Self> {
        match age? {
            i32::MIN..=0 => None,
            1..=19 => Some(Self::UpTo19),
            20..=22 => Some(Self::From20To22),
            23..=25 => Some(Self::From23To25),
            _ => Some(Self::From26),
        }
    }

    /// The bracket label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpTo19 => "17-19",
            Self::From20To22 => "20-22",
            Self::From23To25 => "23-25",
            Self::From26 => "26+",
        }
    }
}

/// Record metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub submission_date: DateTime<Utc>,
    pub submission_year: i32,
    pub submission_month: u32,
    pub submission_day: u32,
    pub form_version: String,
    pub form_type: String,
    pub organization: String,
    pub processing_status: String,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub data_integrity: bool,
    pub location_data_source: String,
}

/// Personal details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    /// Upper-cased full name.
    pub full_name: String,
    pub admission_number: String,
    pub phone_number: String,
    pub national_id: String,
    pub passport_no: Option<String>,
    pub birth_cert_no: Option<String>,
    pub religion: Option<String>,
    pub nationality: String,
    pub gender: String,
    pub ethnic_background: Option<String>,
    pub date_of_birth: String,
    pub place_of_birth: String,
    /// Full years on the submission date.
    pub age: Option<i32>,
}

/// Residence and administrative location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    pub administrative: LocationSelection,
    pub permanent_residence: String,
    pub location: String,
    pub chief_name: Option<String>,
    pub division: Option<String>,
    /// Display names of the selected levels.
    pub county: Option<String>,
    pub sub_county: Option<String>,
    pub constituency: Option<String>,
    pub ward: Option<String>,
    pub nearest_town: Option<String>,
    pub nearest_police: Option<String>,
    pub home_address: Option<String>,
}

/// Marital status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaritalInfo {
    pub status: Option<String>,
    pub spouse_details: Option<String>,
    pub spouse_occupation: Option<String>,
    pub number_of_children: u32,
}

/// One parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parent {
    pub full_name: Option<String>,
    pub status: Option<String>,
    pub phone_number: Option<String>,
    pub national_id: Option<String>,
    pub occupation: Option<String>,
    pub date_of_birth: Option<String>,
}

/// Parents and siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyInfo {
    pub father: Parent,
    pub mother: Parent,
    /// Non-blank sibling names, in field order.
    pub siblings: Vec<String>,
    pub sibling_count: usize,
}

/// An emergency contact with a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub priority: u8,
    pub name: String,
    pub relationship: Option<String>,
    pub national_id: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

/// Secondary school attended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondarySchool {
    pub name: Option<String>,
    pub address: Option<String>,
}

/// KCSE results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kcse {
    pub results: Option<String>,
    pub additional_results: Option<String>,
    pub index_number: Option<String>,
    pub year: Option<i32>,
}

/// Academic background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicInfo {
    pub secondary_school: SecondarySchool,
    pub kcse: Kcse,
    pub other_qualifications: Option<String>,
}

/// Sports, clubs and hobbies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interests {
    pub sports: Option<String>,
    pub clubs: Option<String>,
    /// The clubs field split on commas.
    pub hobbies: Vec<String>,
}

/// Impairments and comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalInfo {
    pub physical_impairment: Option<String>,
    pub special_needs: bool,
    pub additional_comments: Option<String>,
}

/// Data protection consent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consent {
    pub data_processing: bool,
    pub rights_acknowledgment: bool,
    pub consent_date: DateTime<Utc>,
}

/// Derived analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub age_group: Option<AgeGroup>,
    pub academic_year: String,
    pub semester: String,
    pub location_completeness: u32,
    pub gender_code: Option<String>,
    pub form_completeness: u32,
    pub data_quality: String,
}

/// The student registration document sent to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub metadata: Metadata,
    pub personal_info: PersonalInfo,
    pub location_info: LocationInfo,
    pub marital_info: MaritalInfo,
    pub family_info: FamilyInfo,
    pub emergency_contacts: Vec<EmergencyContact>,
    pub academic_info: AcademicInfo,
    pub interests: Interests,
    pub additional_info: AdditionalInfo,
    pub consent: Consent,
    pub analytics: Analytics,
}

impl SubmissionRecord {
    /// Display name of the selected county, if any.
    #[must_use]
    pub fn county_name(&self) -> Option<&str> {
        self.location_info.county.as_deref()
    }
}

/// Reads a field set and builds a [`SubmissionRecord`]. Never fails and
/// never touches storage or location state.
#[derive(Debug, Clone, Copy)]
pub struct FieldAggregator<'a> {
    form: &'a FormConfig,
}

impl<'a> FieldAggregator<'a> {
    /// Create an aggregator stamping records with `form` settings.
    #[must_use]
    pub fn new(form: &'a FormConfig) -> Self {
        Self { form }
    }

    /// Build a record as of now.
    #[must_use]
    pub fn collect(
        &self,
        fields: &FieldSet,
        selection: &LocationSelection,
        source: DataSource,
    ) -> SubmissionRecord {
        self.collect_at(fields, selection, source, Utc::now())
    }

    /// Build a record as of `now`.
    #[must_use]
    pub fn collect_at(
        &self,
        fields: &FieldSet,
        selection: &LocationSelection,
        source: DataSource,
        now: DateTime<Utc>,
    ) -> SubmissionRecord {
        let text = |f: FieldId| fields.value(f).unwrap_or_default().to_string();
        let opt = |f: FieldId| fields.optional(f);

        let age = age_of(fields, now);
        let complete = source == DataSource::Complete;

        let siblings: Vec<String> = SIBLING_FIELDS
            .iter()
            .filter_map(|f| fields.optional(*f))
            .collect();

        let clubs = opt(FieldId::ClubsInterests);
        let hobbies = clubs
            .as_deref()
            .map(|clubs| {
                clubs
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let impairment = opt(FieldId::PhysicalImpairment);
        let special_needs = impairment
            .as_deref()
            .is_some_and(|i| !i.eq_ignore_ascii_case("none"));

        let gender = text(FieldId::Gender);
        let gender_code = gender
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect::<String>());

        SubmissionRecord {
            metadata: Metadata {
                submission_date: now,
                submission_year: now.year(),
                submission_month: now.month(),
                submission_day: now.day(),
                form_version: self.form.version.clone(),
                form_type: self.form.student_form_label.clone(),
                organization: self.form.organization.clone(),
                processing_status: "completed".to_string(),
                ip_address: None,
                user_agent: USER_AGENT.to_string(),
                data_integrity: true,
                location_data_source: source.as_str().to_string(),
            },
            personal_info: PersonalInfo {
                full_name: text(FieldId::FullName).to_uppercase(),
                admission_number: text(FieldId::AdmissionNumber),
                phone_number: text(FieldId::PhoneNumber),
                national_id: text(FieldId::NationalId),
                passport_no: opt(FieldId::PassportNo),
                birth_cert_no: opt(FieldId::BirthCertNo),
                religion: opt(FieldId::Religion),
                nationality: text(FieldId::Nationality),
                gender,
                ethnic_background: opt(FieldId::EthnicBackground),
                date_of_birth: text(FieldId::DateOfBirth),
                place_of_birth: text(FieldId::PlaceOfBirth),
                age,
            },
            location_info: LocationInfo {
                administrative: selection.clone(),
                permanent_residence: text(FieldId::PermanentResidence),
                location: text(FieldId::Location),
                chief_name: opt(FieldId::ChiefName),
                division: opt(FieldId::Division),
                county: selection.county.as_ref().map(|c| c.display_name.clone()),
                sub_county: selection.sub_county.as_ref().map(|s| s.display_name.clone()),
                constituency: selection
                    .constituency
                    .as_ref()
                    .map(|c| c.display_name.clone()),
                ward: selection.ward.as_ref().map(|w| w.display_name.clone()),
                nearest_town: opt(FieldId::NearestTown),
                nearest_police: opt(FieldId::NearestPolice),
                home_address: opt(FieldId::HomeAddress),
            },
            marital_info: MaritalInfo {
                status: opt(FieldId::MaritalStatus),
                spouse_details: opt(FieldId::SpouseDetails),
                spouse_occupation: opt(FieldId::SpouseOccupation),
                number_of_children: fields
                    .value(FieldId::NumberOfChildren)
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(0),
            },
            family_info: FamilyInfo {
                father: Parent {
                    full_name: opt(FieldId::FatherName),
                    status: opt(FieldId::FatherStatus),
                    phone_number: opt(FieldId::FatherPhone),
                    national_id: opt(FieldId::FatherIdNo),
                    occupation: opt(FieldId::FatherOccupation),
                    date_of_birth: opt(FieldId::FatherDob),
                },
                mother: Parent {
                    full_name: opt(FieldId::MotherName),
                    status: opt(FieldId::MotherStatus),
                    phone_number: opt(FieldId::MotherPhone),
                    national_id: opt(FieldId::MotherIdNo),
                    occupation: opt(FieldId::MotherOccupation),
                    date_of_birth: opt(FieldId::MotherDob),
                },
                sibling_count: siblings.len(),
                siblings,
            },
            emergency_contacts: emergency_contacts(fields),
            academic_info: AcademicInfo {
                secondary_school: SecondarySchool {
                    name: opt(FieldId::SchoolAttended),
                    address: opt(FieldId::SchoolAddress),
                },
                kcse: Kcse {
                    results: opt(FieldId::KcseResults),
                    additional_results: opt(FieldId::KcseResults2),
                    index_number: opt(FieldId::IndexNumber),
                    year: fields.value(FieldId::KcseYear).and_then(|y| y.parse().ok()),
                },
                other_qualifications: opt(FieldId::OtherInstitutions),
            },
            interests: Interests {
                sports: opt(FieldId::SportsInterests),
                clubs,
                hobbies,
            },
            additional_info: AdditionalInfo {
                physical_impairment: impairment,
                special_needs,
                additional_comments: opt(FieldId::AdditionalInfo),
            },
            consent: Consent {
                data_processing: fields.is_checked(FieldId::DataConsent),
                rights_acknowledgment: fields.is_checked(FieldId::DataRights),
                consent_date: now,
            },
            analytics: Analytics {
                age_group: AgeGroup::for_age(age),
                academic_year: self.form.academic_year.clone(),
                semester: self.form.semester.clone(),
                location_completeness: LocationHierarchy::completeness(selection),
                gender_code,
                form_completeness: fields.progress(FormKind::Student).percent,
                data_quality: if complete { "complete" } else { "basic" }.to_string(),
            },
        }
    }
}

/// Age in full years on the date of `now`, if the birth date parses.
#[must_use]
pub fn age_of(fields: &FieldSet, now: DateTime<Utc>) -> Option<i32> {
    fields
        .value(FieldId::DateOfBirth)
        .and_then(parse_date)
        .map(|dob| age_on(dob, now.date_naive()))
}

fn emergency_contacts(fields: &FieldSet) -> Vec<EmergencyContact> {
    let slots = [
        (
            1,
            [
                FieldId::Emergency1Name,
                FieldId::Emergency1Relationship,
                FieldId::Emergency1Id,
                FieldId::Emergency1Phone,
                FieldId::Emergency1Address,
            ],
        ),
        (
            2,
            [
                FieldId::Emergency2Name,
                FieldId::Emergency2Relationship,
                FieldId::Emergency2Id,
                FieldId::Emergency2Phone,
                FieldId::Emergency2Address,
            ],
        ),
    ];

    slots
        .into_iter()
        .filter_map(|(priority, [name, relationship, id, phone, address])| {
            Some(EmergencyContact {
                priority,
                name: fields.optional(name)?,
                relationship: fields.optional(relationship),
                national_id: fields.optional(id),
                phone_number: fields.optional(phone),
                address: fields.optional(address),
            })
        })
        .collect()
}
