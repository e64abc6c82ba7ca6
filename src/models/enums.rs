use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Wire and database representations are the same snake_case string.
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
    };
}

str_enum!(UserRole {
    Patient => "patient",
    Doctor => "doctor",
    Admin => "admin",
});

str_enum!(CaseStatus {
    Pending => "pending",
    Accepted => "accepted",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(EmergencyLevel {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

impl EmergencyLevel {
    /// Queue sort key: critical cases first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

/// Patient-reported severity tier on intake.
str_enum!(SeverityTier {
    Mild => "mild",
    Moderate => "moderate",
    Severe => "severe",
});

/// Assessed severity in a triage result.
str_enum!(TriageSeverity {
    Low => "low",
    Medium => "medium",
    High => "high",
});

impl TriageSeverity {
    /// Conservative mapping used when the AI response carries no parsable
    /// severity: derive one from what the patient reported.
    pub fn from_tier(tier: SeverityTier) -> Self {
        match tier {
            SeverityTier::Severe => Self::High,
            SeverityTier::Moderate => Self::Medium,
            SeverityTier::Mild => Self::Low,
        }
    }
}

str_enum!(ConversationKind {
    SymptomCheck => "symptom_check",
    HealthChat => "health_chat",
});

str_enum!(OrderStatus {
    Pending => "pending",
    Paid => "paid",
    Canceled => "canceled",
});

/// Speaker in an AI triage transcript.
str_enum!(AiRole {
    User => "user",
    Assistant => "assistant",
});
