use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A patient, identified externally by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub dob: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Attributes supplied on first reference. Only `name` is required.
#[derive(Debug, Clone, Default)]
pub struct NewPatient {
    pub name: String,
    pub dob: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl NewPatient {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}
