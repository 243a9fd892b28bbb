use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use carestock_core::{DomainError, DomainResult, Entity, RecordId};

const MAX_NAME_LEN: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
    Other,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Female => "female",
            Sex::Male => "male",
            Sex::Other => "other",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "female" => Ok(Sex::Female),
            "male" => Ok(Sex::Male),
            "other" => Ok(Sex::Other),
            other => Err(DomainError::constraint(format!("unknown sex '{other}'"))),
        }
    }
}

/// Caller-supplied fields of a registry record.
///
/// The allocator never looks inside these beyond validation; they are stored
/// and returned as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub given_name: String,
    pub family_name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub sex: Option<Sex>,
    /// Free-form demographic attributes (room, ward, contact, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl RecordPayload {
    pub fn new(given_name: impl Into<String>, family_name: impl Into<String>) -> Self {
        Self {
            given_name: given_name.into(),
            family_name: family_name.into(),
            birth_date: None,
            sex: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_birth_date(mut self, date: NaiveDate) -> Self {
        self.birth_date = Some(date);
        self
    }

    pub fn with_sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Validate against today's date.
    pub fn validate(&self) -> DomainResult<()> {
        self.validate_on(Utc::now().date_naive())
    }

    /// Validate required fields; `today` bounds the birth date.
    pub fn validate_on(&self, today: NaiveDate) -> DomainResult<()> {
        check_name("given_name", &self.given_name)?;
        check_name("family_name", &self.family_name)?;

        if let Some(born) = self.birth_date {
            if born > today {
                return Err(DomainError::constraint(format!(
                    "birth_date {born} is in the future"
                )));
            }
        }

        if self.attributes.keys().any(|k| k.trim().is_empty()) {
            return Err(DomainError::constraint("attribute keys cannot be empty"));
        }

        Ok(())
    }
}

fn check_name(field: &str, value: &str) -> DomainResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::constraint(format!("{field} cannot be empty")));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::constraint(format!(
            "{field} exceeds {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// A stored registry record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub id: RecordId,
    /// Starts at 1, +1 per successful update.
    pub version: u64,
    #[serde(flatten)]
    pub payload: RecordPayload,
}

impl RegistryRecord {
    pub fn new(id: RecordId, payload: RecordPayload) -> Self {
        Self {
            id,
            version: 1,
            payload,
        }
    }
}

impl Entity for RegistryRecord {
    type Id = RecordId;

    fn id(&self) -> RecordId {
        self.id
    }
}

/// Result of an in-place update.
///
/// Distinguishes "no such record" from "someone else changed it first" instead
/// of collapsing both into a zero row count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(RegistryRecord),
    NotFound,
    VersionConflict { actual: u64 },
}

impl UpdateOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, UpdateOutcome::Updated(_))
    }
}
