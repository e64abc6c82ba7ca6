use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical catalog categories (the admin form's dropdown contents).
pub const CATEGORIES: [&str; 10] = [
    "Antibiotics",
    "Pain Relief",
    "Cardiovascular",
    "Diabetes",
    "Respiratory",
    "Gastrointestinal",
    "Allergy",
    "Vitamins & Supplements",
    "Dermatology",
    "Other",
];

pub const DOSAGE_FORMS: [&str; 10] = [
    "Tablet",
    "Capsule",
    "Syrup",
    "Injection",
    "Inhaler",
    "Cream",
    "Ointment",
    "Drops",
    "Spray",
    "Other",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub manufacturer: Option<String>,
    pub price: f64,
    pub stock_quantity: i64,
    pub image_url: Option<String>,
    pub dosage_form: Option<String>,
    pub strength: Option<String>,
    pub prescription_required: bool,
    pub active_ingredients: Option<String>,
    pub side_effects: Option<String>,
    pub warnings: Option<String>,
    pub is_available: bool,
    pub created_at: NaiveDateTime,
}

/// Create/update payload. Price is a decimal, stock an integer; the typed
/// fields are the coercion boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationInput {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub manufacturer: Option<String>,
    pub price: f64,
    pub stock_quantity: i64,
    pub image_url: Option<String>,
    pub dosage_form: Option<String>,
    pub strength: Option<String>,
    #[serde(default)]
    pub prescription_required: bool,
    pub active_ingredients: Option<String>,
    pub side_effects: Option<String>,
    pub warnings: Option<String>,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

/// Catalog search: case-insensitive substring over name, manufacturer and
/// active ingredients, plus an optional exact category filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicationSearch {
    pub query: Option<String>,
    pub category: Option<String>,
}
