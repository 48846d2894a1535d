use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{FEE_PREMIUM, FEE_STANDARD, FEE_SUITE};

// Closed vocabularies that must still accept values outside the known set:
// the store takes whatever the form layer hands it, so unknown names are kept
// verbatim in `Other` and round-trip through serde as plain strings.
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $variant:ident => $label:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $( $variant, )+
            Other(String),
        }

        impl $name {
            /// Resolve a display name or English alias (case-insensitive).
            pub fn from_name(name: &str) -> Self {
                let name = name.trim();
                $(
                    if name.eq_ignore_ascii_case($label) $(|| name.eq_ignore_ascii_case($alias))* {
                        return Self::$variant;
                    }
                )+
                Self::Other(name.to_string())
            }

            pub fn name(&self) -> &str {
                match self {
                    $( Self::$variant => $label, )+
                    Self::Other(name) => name,
                }
            }

            pub fn is_known(&self) -> bool {
                !matches!(self, Self::Other(_))
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self::from_name(&name)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self::from_name(name)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                match value {
                    $name::Other(name) => name,
                    known => known.name().to_string(),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

named_enum! {
    /// Saudi administrative region the student comes from.
    pub enum Province {
        Najran => "نجران" | "najran",
        Riyadh => "الرياض" | "riyadh",
        Makkah => "مكة المكرمة" | "makkah" | "mecca",
        Madinah => "المدينة المنورة" | "madinah" | "medina",
        Eastern => "الشرقية" | "eastern",
        Asir => "عسير" | "asir",
        Jazan => "جازان" | "jazan" | "jizan",
        Hail => "حائل" | "hail",
        Qassim => "القصيم" | "qassim",
        Tabuk => "تبوك" | "tabuk",
        Jouf => "الجوف" | "jouf" | "al-jouf",
        Baha => "الباحة" | "baha" | "al-baha",
        NorthernBorders => "الحدود الشمالية" | "northern borders",
    }
}

named_enum! {
    /// Academic major declared on the application.
    pub enum Specialization {
        Medicine => "طب وجراحة" | "medicine",
        Pharmacy => "صيدلة" | "pharmacy",
        Nursing => "تمريض" | "nursing",
        ComputerEngineering => "هندسة حاسب" | "computer engineering",
        CivilEngineering => "هندسة مدنية" | "civil engineering",
        ComputerScience => "علوم الحاسب" | "computer science",
        BusinessAdministration => "إدارة أعمال" | "business administration",
        Accounting => "محاسبة" | "accounting",
        Law => "قانون" | "law",
        SpecialEducation => "تربية خاصة" | "special education",
    }
}

named_enum! {
    /// Requested room category. Drives the fee.
    pub enum RoomType {
        Standard => "standard",
        Premium => "premium",
        Suite => "suite",
    }
}

/// Catch-all college for majors missing from the college table.
pub const OTHER_COLLEGE: &str = "كلية أخرى";

impl Province {
    /// Relative distance from the university (0 = local, higher = farther).
    /// `None` for provinces outside the table.
    pub fn distance_weight(&self) -> Option<u32> {
        let weight = match self {
            Self::Najran => 0,
            Self::Asir => 30,
            Self::Baha => 40,
            Self::Jazan => 65,
            Self::Qassim => 70,
            Self::Hail => 75,
            Self::Tabuk => 80,
            Self::Jouf => 82,
            Self::Riyadh => 85,
            Self::Madinah => 88,
            Self::NorthernBorders => 89,
            Self::Makkah => 90,
            Self::Eastern => 95,
            Self::Other(_) => return None,
        };
        Some(weight)
    }
}

impl Specialization {
    pub fn college(&self) -> &'static str {
        match self {
            Self::Medicine => "كلية الطب",
            Self::Pharmacy => "كلية الصيدلة",
            Self::Nursing => "كلية التمريض",
            Self::ComputerEngineering | Self::CivilEngineering => "كلية الهندسة",
            Self::ComputerScience => "كلية علوم الحاسب",
            Self::BusinessAdministration | Self::Accounting => "كلية إدارة الأعمال",
            Self::Law => "كلية القانون",
            Self::SpecialEducation => "كلية التربية",
            Self::Other(_) => OTHER_COLLEGE,
        }
    }

    /// Majors that only admit students with a GPA of at least 4.0.
    pub fn is_high_demand(&self) -> bool {
        matches!(
            self,
            Self::Medicine | Self::Pharmacy | Self::ComputerEngineering
        )
    }
}

impl RoomType {
    /// Yearly fee; anything outside the fee table pays the standard rate.
    pub fn fee(&self) -> u32 {
        match self {
            Self::Premium => FEE_PREMIUM,
            Self::Suite => FEE_SUITE,
            Self::Standard | Self::Other(_) => FEE_STANDARD,
        }
    }
}

impl Default for RoomType {
    fn default() -> Self {
        Self::Standard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[serde(alias = "ذكر")]
    Male,
    #[serde(alias = "أنثى")]
    Female,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Confirmed,
    Rejected,
    Completed,
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        };
        f.write_str(label)
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => f.write_str("male"),
            Self::Female => f.write_str("female"),
        }
    }
}

/// Profile data collected by the registration form, before the vault assigns
/// identity and derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationForm {
    pub full_name: String,
    /// 10-digit national identifier; the natural key of the vault.
    pub national_id: String,
    pub phone: String,
    pub email: String,
    pub gender: Gender,
    pub province: Province,
    /// Never persisted as a non-finite number: JSON has no NaN, so the vault
    /// stores 0 instead and a `null` GPA reads back as 0.
    #[serde(deserialize_with = "gpa_or_zero")]
    pub gpa: f64,
    pub specialization: Specialization,
    #[serde(default)]
    pub room_type: RoomType,
}

impl ApplicationForm {
    /// Replace a NaN or infinite GPA with 0. Returns whether it changed.
    pub fn clamp_non_finite_gpa(&mut self) -> bool {
        if self.gpa.is_finite() {
            return false;
        }
        self.gpa = 0.0;
        true
    }
}

/// Admin edit of a stored application. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationPatch {
    pub full_name: Option<String>,
    pub national_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gender: Option<Gender>,
    pub province: Option<Province>,
    pub gpa: Option<f64>,
    pub specialization: Option<Specialization>,
    pub room_type: Option<RoomType>,
    pub status: Option<ApplicationStatus>,
}

impl ApplicationPatch {
    /// Write the form fields of this patch over `form`. `status` lives on the
    /// stored record and is not touched here.
    pub fn apply_to(&self, form: &mut ApplicationForm) {
        if let Some(full_name) = &self.full_name {
            form.full_name = full_name.clone();
        }
        if let Some(national_id) = &self.national_id {
            form.national_id = national_id.clone();
        }
        if let Some(phone) = &self.phone {
            form.phone = phone.clone();
        }
        if let Some(email) = &self.email {
            form.email = email.clone();
        }
        if let Some(gender) = self.gender {
            form.gender = gender;
        }
        if let Some(province) = &self.province {
            form.province = province.clone();
        }
        if let Some(gpa) = self.gpa {
            form.gpa = gpa;
        }
        if let Some(specialization) = &self.specialization {
            form.specialization = specialization.clone();
        }
        if let Some(room_type) = &self.room_type {
            form.room_type = room_type.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn gpa_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// A stored housing application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Internal identifier, assigned on first insertion.
    pub id: Uuid,
    /// Human-facing receipt number (`NU-YYYY-MMDD-RRRR`), not unique.
    pub reference_number: String,
    #[serde(flatten)]
    pub form: ApplicationForm,
    pub fees: u32,
    #[serde(default)]
    pub status: ApplicationStatus,
    /// Set on every save, including updates of an existing national ID.
    pub registration_date: DateTime<Utc>,
}

impl Application {
    pub fn national_id(&self) -> &str {
        &self.form.national_id
    }
}
