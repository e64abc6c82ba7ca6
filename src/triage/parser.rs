//! Turns a free-text completion reply into a structured assessment.
//!
//! Replies are expected to carry one JSON object, possibly wrapped in
//! prose. Parsing never fails: missing or malformed fields fall back to
//! conservative defaults, and a reply with no usable JSON at all degrades
//! to a text excerpt with severity taken from what the patient reported.

use std::str::FromStr;

use serde_json::Value;

use crate::models::enums::{SeverityTier, TriageSeverity};
use crate::models::TriageAssessment;

pub const DEFAULT_DIAGNOSIS: &str = "Unable to determine specific condition";
pub const DEFAULT_RECOMMENDATION: &str = "Please consult with a healthcare provider";
pub const MEDICAL_DISCLAIMER: &str =
    "Please consult a healthcare provider for proper diagnosis and treatment.";

/// Title used when generation fails or produces nothing usable.
pub const DEFAULT_TITLE: &str = "Health Consultation";

const EXCERPT_DIAGNOSIS: &str = "AI Analysis Complete";
const EXCERPT_CHARS: usize = 200;

/// Parse an assessment out of a completion reply.
pub fn parse_assessment(reply: &str, reported: SeverityTier) -> TriageAssessment {
    if let Some(block) = json_block(reply) {
        if let Ok(parsed) = serde_json::from_str::<Value>(block) {
            return from_fields(&parsed);
        }
    }
    from_text(reply, reported)
}

/// The widest brace-delimited slice of the reply: first `{` through last
/// `}`. Taking the last brace keeps nested objects intact.
fn json_block(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (start < end).then(|| &reply[start..=end])
}

fn from_fields(parsed: &Value) -> TriageAssessment {
    TriageAssessment {
        diagnosis: text_field(parsed, "diagnosis", DEFAULT_DIAGNOSIS),
        recommendation: text_field(parsed, "recommendation", DEFAULT_RECOMMENDATION),
        severity: parsed
            .get("severity")
            .and_then(Value::as_str)
            .and_then(|s| TriageSeverity::from_str(s).ok())
            .unwrap_or(TriageSeverity::Medium),
        requires_doctor: parsed
            .get("requiresDoctor")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        confidence: parsed
            .get("confidence")
            .and_then(Value::as_i64)
            .unwrap_or(75),
        additional_notes: text_field(parsed, "additionalNotes", MEDICAL_DISCLAIMER),
    }
}

fn text_field(parsed: &Value, key: &str, default: &str) -> String {
    parsed
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string())
}

/// No parsable JSON anywhere: surface an excerpt of the raw reply and lean
/// on the patient-reported tier for severity.
fn from_text(reply: &str, reported: SeverityTier) -> TriageAssessment {
    let excerpt: String = reply.chars().take(EXCERPT_CHARS).collect();
    TriageAssessment {
        diagnosis: EXCERPT_DIAGNOSIS.to_string(),
        recommendation: format!("{excerpt}..."),
        severity: TriageSeverity::from_tier(reported),
        requires_doctor: reported == SeverityTier::Severe,
        confidence: 70,
        additional_notes: MEDICAL_DISCLAIMER.to_string(),
    }
}

/// Tidy a model-generated session title. Quote characters are dropped
/// wherever they appear, titles over 60 characters are cut to 57 plus an
/// ellipsis, and an empty result becomes the generic fallback.
pub fn clean_title(raw: &str) -> String {
    let title: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '"' | '\''))
        .collect();

    if title.chars().count() > 60 {
        let head: String = title.chars().take(57).collect();
        return format!("{head}...");
    }

    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_the_json_assessment_from_prose() {
        let reply = r#"Here is my assessment:

{
  "diagnosis": "Tension headache",
  "recommendation": "Rest, hydration, and an over-the-counter analgesic",
  "severity": "low",
  "requiresDoctor": false,
  "confidence": 88,
  "additionalNotes": "See a doctor if pain persists beyond a week"
}

Take care."#;

        let assessment = parse_assessment(reply, SeverityTier::Mild);
        assert_eq!(assessment.diagnosis, "Tension headache");
        assert_eq!(
            assessment.recommendation,
            "Rest, hydration, and an over-the-counter analgesic"
        );
        assert_eq!(assessment.severity, TriageSeverity::Low);
        assert!(!assessment.requires_doctor);
        assert_eq!(assessment.confidence, 88);
        assert_eq!(
            assessment.additional_notes,
            "See a doctor if pain persists beyond a week"
        );
    }

    #[test]
    fn nested_objects_survive_extraction() {
        let reply = r#"{"diagnosis": "Flu", "recommendation": "Rest", "severity": "medium",
                       "requiresDoctor": true, "confidence": 80,
                       "additionalNotes": "Monitor temperature",
                       "meta": {"model": "clinical-v2"}}"#;

        let assessment = parse_assessment(reply, SeverityTier::Mild);
        assert_eq!(assessment.diagnosis, "Flu");
        assert!(assessment.requires_doctor);
    }

    #[test]
    fn missing_fields_fall_back_conservatively() {
        let assessment = parse_assessment(r#"{"diagnosis": "Sinusitis"}"#, SeverityTier::Severe);
        assert_eq!(assessment.diagnosis, "Sinusitis");
        assert_eq!(assessment.recommendation, DEFAULT_RECOMMENDATION);
        assert_eq!(assessment.severity, TriageSeverity::Medium);
        assert!(!assessment.requires_doctor);
        assert_eq!(assessment.confidence, 75);
        assert_eq!(assessment.additional_notes, MEDICAL_DISCLAIMER);
    }

    #[test]
    fn malformed_fields_fall_back_individually() {
        // Unknown severity string and a fractional confidence are treated
        // the same as absent fields.
        let reply = r#"{"diagnosis": "Rash", "severity": "catastrophic", "confidence": 87.5}"#;
        let assessment = parse_assessment(reply, SeverityTier::Mild);
        assert_eq!(assessment.diagnosis, "Rash");
        assert_eq!(assessment.severity, TriageSeverity::Medium);
        assert_eq!(assessment.confidence, 75);
    }

    #[test]
    fn plain_text_reply_degrades_to_excerpt() {
        let reply = "a".repeat(300);
        let assessment = parse_assessment(&reply, SeverityTier::Moderate);
        assert_eq!(assessment.diagnosis, "AI Analysis Complete");
        assert_eq!(assessment.recommendation, format!("{}...", "a".repeat(200)));
        assert_eq!(assessment.severity, TriageSeverity::Medium);
        assert_eq!(assessment.confidence, 70);
        assert_eq!(assessment.additional_notes, MEDICAL_DISCLAIMER);
    }

    #[test]
    fn short_text_reply_still_gets_ellipsis() {
        let assessment = parse_assessment("Drink more water.", SeverityTier::Mild);
        assert_eq!(assessment.recommendation, "Drink more water....");
    }

    #[test]
    fn excerpt_severity_follows_the_reported_tier() {
        for (tier, severity, needs_doctor) in [
            (SeverityTier::Severe, TriageSeverity::High, true),
            (SeverityTier::Moderate, TriageSeverity::Medium, false),
            (SeverityTier::Mild, TriageSeverity::Low, false),
        ] {
            let assessment = parse_assessment("no json here", tier);
            assert_eq!(assessment.severity, severity);
            assert_eq!(assessment.requires_doctor, needs_doctor);
        }
    }

    #[test]
    fn unparsable_brace_block_degrades_to_excerpt() {
        let assessment = parse_assessment("{this is not json}", SeverityTier::Mild);
        assert_eq!(assessment.diagnosis, "AI Analysis Complete");
        assert_eq!(assessment.confidence, 70);
    }

    #[test]
    fn clean_title_strips_quotes_anywhere() {
        assert_eq!(
            clean_title("  \"Persistent Cough 'Assessment'\"  "),
            "Persistent Cough Assessment"
        );
    }

    #[test]
    fn clean_title_truncates_long_titles() {
        let long = "x".repeat(80);
        let cleaned = clean_title(&long);
        assert_eq!(cleaned.chars().count(), 60);
        assert!(cleaned.ends_with("..."));
        assert!(cleaned.starts_with(&"x".repeat(57)));
    }

    #[test]
    fn clean_title_falls_back_when_empty() {
        assert_eq!(clean_title("  \"\"  "), DEFAULT_TITLE);
        assert_eq!(clean_title(""), DEFAULT_TITLE);
    }

    #[test]
    fn clean_title_passes_short_titles_through() {
        assert_eq!(clean_title("Chest Pain Assessment"), "Chest Pain Assessment");
    }
}
