use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(AppointmentStatus {
    Booked => "booked",
});

str_enum!(IntentKind {
    BookAppointment => "book_appointment",
    UpdateRecords => "update_records",
    RetrieveHistory => "retrieve_history",
    MedicalInfo => "medical_info",
    General => "general",
});

impl IntentKind {
    /// Lenient label matching for collaborator output: case, surrounding
    /// whitespace, spaces and hyphens are tolerated; anything unrecognised is `General`.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        normalized.parse().unwrap_or(Self::General)
    }
}

str_enum!(SentimentLabel {
    Positive => "positive",
    Neutral => "neutral",
    Negative => "negative",
});
