//! Prompt templates for the completion service.
//!
//! The triage prompt demands one JSON object so the parser can pull a
//! structured assessment out of the reply; advice and title prompts are
//! free text.

use crate::models::enums::SeverityTier;

pub const TRIAGE_TEMPERATURE: f64 = 0.7;
pub const TRIAGE_MAX_TOKENS: u32 = 1024;

pub const ADVICE_TEMPERATURE: f64 = 0.6;
pub const ADVICE_MAX_TOKENS: u32 = 500;

pub const TITLE_TEMPERATURE: f64 = 0.5;
pub const TITLE_MAX_TOKENS: u32 = 50;

/// Build the symptom-analysis prompt for one triage run.
pub fn build_triage_prompt(symptoms: &str, severity: SeverityTier) -> String {
    format!(
        r#"You are a medical AI assistant. Analyse the following patient symptoms and provide a professional medical assessment.

Patient Symptoms: {symptoms}
Symptom Severity: {severity}

Please provide your analysis in the following JSON format:
{{
  "diagnosis": "Most likely condition or description",
  "recommendation": "Specific advice for the patient",
  "severity": "low/medium/high",
  "requiresDoctor": true/false,
  "confidence": 85,
  "additionalNotes": "Any additional important information"
}}

Guidelines:
- Be professional and medical in your assessment
- Consider the severity level when making recommendations
- If symptoms are severe or potentially serious, recommend doctor consultation
- Provide practical, actionable advice
- Confidence should be between 60-95%
- Always include appropriate medical disclaimers in additionalNotes
- Focus on common conditions first, but don't dismiss serious possibilities
- Mention when immediate medical attention is needed

Important: This is for informational purposes only and should not replace professional medical advice.
"#,
        severity = severity.as_str()
    )
}

/// Build the free-form health question prompt.
pub fn build_advice_prompt(question: &str) -> String {
    format!(
        r#"You are a helpful medical AI assistant. Provide helpful, accurate health advice for the following question.

Question: {question}

Guidelines:
- Provide clear, helpful advice
- Be professional and medical in tone
- Include appropriate disclaimers
- Focus on general health information
- Recommend consulting healthcare providers when appropriate
- Keep response concise but informative
- Always remind that this is not a substitute for professional medical advice

Response should be 2-3 paragraphs maximum.
"#
    )
}

/// Build the session-title prompt from a condensed transcript.
pub fn build_title_prompt(conversation_text: &str) -> String {
    format!(
        r#"Based on the following medical conversation, generate a short, descriptive title (maximum 6-8 words) that captures the main health concern or topic discussed.

Conversation:
{conversation_text}

Requirements:
- Maximum 8 words
- Be specific and descriptive
- Use medical terminology when appropriate
- Focus on the main symptom or condition
- Do not include quotation marks

Examples of good titles:
- "Persistent Headache and Vision Problems"
- "Chest Pain Assessment"
- "Digestive Issues After Meals"

Generate only the title, nothing else.
"#
    )
}
