//! Gemini API client for text generation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Model name, also shown in /stats output.
pub const MODEL_NAME: &str = "gemini-2.0-flash-exp";

const GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-exp:generateContent";

/// Per-request network timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What the model produced for a prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    /// Trimmed text of the first candidate.
    Answer(String),
    /// The API responded but returned no usable candidate.
    Empty,
}

#[derive(Debug)]
pub enum Error {
    Timeout,
    Http(String),
    Api(String),
    Parse(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Timeout => write!(f, "request timed out"),
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Api(e) => write!(f, "API error: {e}"),
            Error::Parse(e) => write!(f, "parse error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

/// Anything that turns a prompt into generated text. Lets the resolver run
/// against a scripted mock in tests instead of the real API.
pub trait TextModel {
    async fn generate(&self, prompt: &str) -> Result<Generation, Error>;
}

pub struct GeminiClient {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self { api_key, client }
    }
}

impl TextModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Generation, Error> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_k: 40,
                top_p: 0.8,
                max_output_tokens: 2048,
            },
        };

        let url = format!("{}?key={}", GEMINI_API_URL, self.api_key);

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout
            } else {
                Error::Http(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        debug!("Gemini response status: {status}");

        if !status.is_success() {
            return Err(Error::Api(format!("{status}: {body}")));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| Error::Parse(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(Error::Api(error.message));
        }

        let candidates = parsed.candidates.unwrap_or_default();
        let text = candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.as_ref())
            .and_then(|parts| parts.first())
            .and_then(|p| p.text.as_deref())
            .unwrap_or("")
            .trim();

        if text.is_empty() {
            Ok(Generation::Empty)
        } else {
            Ok(Generation::Answer(text.to_string()))
        }
    }
}
