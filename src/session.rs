//! Per-session state passed explicitly between the pipeline stages.

use crate::{acuity::AcuityTable, constants::REFERENCE_DISTANCE_M, Error, Result};
use serde::{Deserialize, Serialize};

/// Person being tested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Given name
    pub name: String,
    /// Family name
    pub surname: String,
    /// Age in years
    pub age: u32,
    /// National identity number, if given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    /// Phone number, if given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Email address, if given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Subject {
    /// Validate and build a subject from raw form input
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty name or surname, or an age that is
    /// not a whole number
    pub fn new(name: &str, surname: &str, age: &str) -> Result<Self> {
        let name = name.trim();
        let surname = surname.trim();
        if name.is_empty() || surname.is_empty() {
            return Err(Error::InvalidInput("Name and surname are required".to_string()));
        }
        let age = age
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::InvalidInput(format!("Age must be a whole number, got '{}'", age.trim())))?;
        Ok(Self {
            name: name.to_string(),
            surname: surname.to_string(),
            age,
            national_id: None,
            phone: None,
            email: None,
        })
    }

    /// Attach optional contact details; blank entries are left unset
    #[must_use]
    pub fn with_contact(mut self, national_id: Option<&str>, phone: Option<&str>, email: Option<&str>) -> Self {
        let optional = |value: Option<&str>| value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
        self.national_id = optional(national_id);
        self.phone = optional(phone);
        self.email = optional(email);
        self
    }

    /// Folder name used for this subject's reports
    #[must_use]
    pub fn folder_name(&self) -> String {
        let sanitize = |part: &str| -> String {
            part.chars()
                .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
                .collect()
        };
        format!("{}_{}", sanitize(&self.name), sanitize(&self.surname))
    }
}

/// Everything one test cycle needs to know about the subject and setup
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Person being tested
    pub subject: Subject,
    /// Level table with current optotype sizes
    pub table: AcuityTable,
    /// Latest measured distance in meters
    pub distance_m: f64,
    /// Camera identity, e.g. `camera_0`
    pub camera_id: String,
}

impl SessionContext {
    /// New context at the reference distance
    #[must_use]
    pub fn new(subject: Subject, table: AcuityTable, camera_id: impl Into<String>) -> Self {
        Self {
            subject,
            table,
            distance_m: REFERENCE_DISTANCE_M,
            camera_id: camera_id.into(),
        }
    }
}
