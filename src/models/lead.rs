use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::ALL.iter().copied().find(|v| v.label() == s).ok_or(())
            }
        }
    };
}

labelled_enum! {
    /// Courses offered on the registration form.
    Course {
        PgMdMs => "Pg(Md/Ms)",
        Mbbs => "MBBS",
        BscNursing => "Bsc.nursing",
        Gnm => "Gnm",
        BPharma => "B.pharma",
        BTech => "B.tech",
        BTechLateral => "B.tech lateral",
        Diploma => "Diploma",
    }
}

labelled_enum! {
    /// Indian states and union territories.
    Place {
        AndhraPradesh => "Andhra Pradesh",
        ArunachalPradesh => "Arunachal Pradesh",
        Assam => "Assam",
        Bihar => "Bihar",
        Chhattisgarh => "Chhattisgarh",
        Goa => "Goa",
        Gujarat => "Gujarat",
        Haryana => "Haryana",
        HimachalPradesh => "Himachal Pradesh",
        Jharkhand => "Jharkhand",
        Karnataka => "Karnataka",
        Kerala => "Kerala",
        MadhyaPradesh => "Madhya Pradesh",
        Maharashtra => "Maharashtra",
        Manipur => "Manipur",
        Meghalaya => "Meghalaya",
        Mizoram => "Mizoram",
        Nagaland => "Nagaland",
        Odisha => "Odisha",
        Punjab => "Punjab",
        Rajasthan => "Rajasthan",
        Sikkim => "Sikkim",
        TamilNadu => "Tamil Nadu",
        Telangana => "Telangana",
        Tripura => "Tripura",
        UttarPradesh => "Uttar Pradesh",
        Uttarakhand => "Uttarakhand",
        WestBengal => "West Bengal",
        AndamanAndNicobarIslands => "Andaman and Nicobar Islands",
        Chandigarh => "Chandigarh",
        DadraNagarHaveliDamanDiu => "Dadra and Nagar Haveli and Daman and Diu",
        Delhi => "Delhi",
        JammuAndKashmir => "Jammu and Kashmir",
        Ladakh => "Ladakh",
        Lakshadweep => "Lakshadweep",
        Puducherry => "Puducherry",
    }
}

/// Form fields addressable through `update_field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum LeadField {
    Name,
    Email,
    PhoneNumber,
    Course,
    Place,
}

/// Lead being filled in on the registration form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadDraft {
    #[schema(example = "Asha Verma")]
    pub name: String,
    #[schema(example = "asha@example.com")]
    pub email: String,
    #[schema(example = "9876543210")]
    pub phone_number: String,
    #[schema(value_type = Option<String>, example = "MBBS")]
    pub course: Option<Course>,
    #[schema(value_type = Option<String>, example = "Kerala")]
    pub place: Option<Place>,
}

impl LeadDraft {
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.email.is_empty()
            && !self.phone_number.is_empty()
            && self.course.is_some()
            && self.place.is_some()
    }
}

/// Lead as returned by the store. Course and place stay as raw labels: the store is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadRecord {
    pub name: String,
    pub phone_number: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub place: String,
    #[serde(default)]
    pub college: String,
    pub created_at: DateTime<Utc>,
}
