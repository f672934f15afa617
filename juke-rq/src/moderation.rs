//! Content-classification client
//!
//! Sends a track's title and artist to the Gemini API under a fixed
//! playlist policy, with a closed response schema so the service can only
//! answer in the five-field verdict form decoded below. Each call is
//! stateless: no conversation history, no caching of prior verdicts.
//!
//! A response that does not match the schema is a hard failure; there is
//! no default-allow or default-deny fallback.
//!
//! # API Reference
//! - Endpoint: https://ai.google.dev/api/generate-content

use crate::error::{Error, Result};
use juke_common::config::ModerationSettings;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Gemini API base URL
const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Default timeout for classification requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed policy the classifier evaluates every track against
const POLICY_PROMPT: &str = "\
You are the playlist curator for an all-ages community venue. You will be \
presented with song titles and the associated artist. For every song you \
will evaluate whether or not it is appropriate for the venue.

The guidelines are extremely strict. Profanity and adult themes are not \
allowed; even the words \"hell\" and \"damn\" are disqualifying.

## Examples:

- \"Pumped Up Kicks\" by Foster the People would not be allowed because of \
the suggestive violence in the song

- \"Eyes on Fire\" by Blue Foundation is inappropriate for the veiled \
threats and the line \"flay you alive\"";

/// Verdict categories
///
/// Closed enum: any other wire value is a contract violation of the
/// classification service and fails deserialization. Only `Appropriate`
/// admits a track to the public playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluation {
    Appropriate,
    LikelyAppropriate,
    LikelyInappropriate,
    Inappropriate,
}

impl Evaluation {
    /// Only the single most permissive category approves a track
    pub fn is_approved(self) -> bool {
        matches!(self, Evaluation::Appropriate)
    }

    /// Wire form of the category
    pub fn as_str(self) -> &'static str {
        match self {
            Evaluation::Appropriate => "appropriate",
            Evaluation::LikelyAppropriate => "likely_appropriate",
            Evaluation::LikelyInappropriate => "likely_inappropriate",
            Evaluation::Inappropriate => "inappropriate",
        }
    }
}

/// Structured verdict returned by the classification service
///
/// `song_title` and `artist` are echoed back for traceability and are not
/// validated against the submitted values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SongEvaluation {
    pub evaluation: Evaluation,
    pub reasoning: String,
    pub issues: Vec<String>,
    pub song_title: String,
    pub artist: String,
}

/// Content-classification client
pub struct ModerationClient {
    /// HTTP client for API requests
    http_client: Client,
    /// API key for the classification service
    api_key: String,
    /// Model identifier
    model: String,
}

impl ModerationClient {
    /// Create a new moderation client
    pub fn new(settings: ModerationSettings) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            api_key: settings.api_key,
            model: settings.model,
        }
    }

    /// Classify one track against the fixed policy
    ///
    /// # Errors
    /// Returns [`Error::Moderation`] on transport failure, non-success
    /// status, or output that cannot be parsed against the verdict
    /// schema. Fatal for the submission; not retried.
    pub async fn evaluate(&self, title: &str, artist: &str) -> Result<SongEvaluation> {
        debug!(title = %title, artist = %artist, "Requesting moderation verdict");

        let url = format!("{}/{}:generateContent", GEMINI_API_BASE_URL, self.model);
        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&build_request(title, artist))
            .send()
            .await
            .map_err(|e| Error::Moderation(format!("classification request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Moderation(format!(
                "classification service returned {}: {}",
                status, body
            )));
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            Error::Moderation(format!("Failed to parse classification response: {}", e))
        })?;

        let verdict = parse_verdict(body)?;
        debug!(
            evaluation = verdict.evaluation.as_str(),
            issue_count = verdict.issues.len(),
            "Moderation verdict received"
        );
        Ok(verdict)
    }
}

/// Request payload: fixed policy instruction plus the closed output schema
fn build_request(title: &str, artist: &str) -> serde_json::Value {
    serde_json::json!({
        "system_instruction": {
            "parts": [{ "text": POLICY_PROMPT }]
        },
        "contents": [{
            "role": "user",
            "parts": [{ "text": format!("Song: {}, Artist: {}", title, artist) }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(),
        }
    })
}

/// The five-field schema the service must answer with
fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "required": ["evaluation", "reasoning", "issues", "song_title", "artist"],
        "properties": {
            "evaluation": {
                "type": "STRING",
                "enum": [
                    "appropriate",
                    "likely_appropriate",
                    "likely_inappropriate",
                    "inappropriate"
                ]
            },
            "reasoning": { "type": "STRING" },
            "issues": { "type": "ARRAY", "items": { "type": "STRING" } },
            "song_title": { "type": "STRING" },
            "artist": { "type": "STRING" }
        }
    })
}

/// Extract and decode the verdict from a generateContent response
fn parse_verdict(response: GenerateContentResponse) -> Result<SongEvaluation> {
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content.parts.into_iter().next())
        .map(|part| part.text)
        .ok_or_else(|| {
            Error::Moderation("classification response contained no candidates".to_string())
        })?;

    serde_json::from_str(&text)
        .map_err(|e| Error::Moderation(format!("verdict did not match schema: {}", e)))
}

// ============================================================================
// Gemini API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const VERDICT_JSON: &str = r#"{
        "evaluation": "inappropriate",
        "reasoning": "The song depicts violence.",
        "issues": ["suggestive violence"],
        "song_title": "Pumped Up Kicks",
        "artist": "Foster the People"
    }"#;

    fn gemini_body(verdict_text: &str) -> GenerateContentResponse {
        let body = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [{ "text": verdict_text }],
                    "role": "model"
                },
                "finishReason": "STOP"
            }]
        });
        serde_json::from_value(body).expect("valid generateContent body")
    }

    #[test]
    fn test_evaluation_decodes_all_four_categories() {
        for (wire, expected) in [
            ("appropriate", Evaluation::Appropriate),
            ("likely_appropriate", Evaluation::LikelyAppropriate),
            ("likely_inappropriate", Evaluation::LikelyInappropriate),
            ("inappropriate", Evaluation::Inappropriate),
        ] {
            let parsed: Evaluation =
                serde_json::from_str(&format!("\"{}\"", wire)).expect("known category");
            assert_eq!(parsed, expected);
            assert_eq!(parsed.as_str(), wire);
        }
    }

    #[test]
    fn test_evaluation_rejects_unknown_category() {
        let result = serde_json::from_str::<Evaluation>("\"borderline\"");
        assert!(result.is_err(), "Unknown categories must fail to decode");
    }

    #[test]
    fn test_only_appropriate_approves() {
        assert!(Evaluation::Appropriate.is_approved());
        assert!(!Evaluation::LikelyAppropriate.is_approved());
        assert!(!Evaluation::LikelyInappropriate.is_approved());
        assert!(!Evaluation::Inappropriate.is_approved());
    }

    #[test]
    fn test_parse_verdict_happy_path() {
        let verdict = parse_verdict(gemini_body(VERDICT_JSON)).expect("well-formed verdict");
        assert_eq!(verdict.evaluation, Evaluation::Inappropriate);
        assert_eq!(verdict.issues, vec!["suggestive violence"]);
        assert_eq!(verdict.song_title, "Pumped Up Kicks");
    }

    #[test]
    fn test_parse_verdict_rejects_empty_candidates() {
        let body: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({ "candidates": [] })).unwrap();
        let err = parse_verdict(body).expect_err("no candidates must fail");
        assert!(err.to_string().contains("no candidates"));
    }

    #[test]
    fn test_parse_verdict_rejects_missing_field() {
        // `issues` absent: a required field of the closed schema
        let text = r#"{
            "evaluation": "appropriate",
            "reasoning": "Fine.",
            "song_title": "Happy",
            "artist": "Pharrell Williams"
        }"#;
        assert!(parse_verdict(gemini_body(text)).is_err());
    }

    #[test]
    fn test_parse_verdict_rejects_extra_field() {
        let text = r#"{
            "evaluation": "appropriate",
            "reasoning": "Fine.",
            "issues": [],
            "song_title": "Happy",
            "artist": "Pharrell Williams",
            "confidence": 0.9
        }"#;
        assert!(parse_verdict(gemini_body(text)).is_err());
    }

    #[test]
    fn test_parse_verdict_rejects_prose_output() {
        assert!(parse_verdict(gemini_body("This song seems fine to me.")).is_err());
    }

    #[test]
    fn test_request_carries_closed_schema() {
        let request = build_request("Happy", "Pharrell Williams");
        let config = &request["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        let categories = config["responseSchema"]["properties"]["evaluation"]["enum"]
            .as_array()
            .expect("enum array");
        assert_eq!(categories.len(), 4);
        assert_eq!(
            request["contents"][0]["parts"][0]["text"],
            "Song: Happy, Artist: Pharrell Williams"
        );
    }
}
