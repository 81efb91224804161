// ============================================================================
// Judge Providers - Claude, GPT and Gemini over their HTTP APIs
// ============================================================================
//
// All three providers share one prompt template and one lenient response
// parser. A provider without an API key fails every call with
// `ProviderError::MissingApiKey`; the orchestrator drops that judgment.
// ============================================================================

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

use super::{JudgeProvider, ProviderError, JUDGE_TIMEOUT_SECS};
use crate::models::{JudgmentResult, Outcome};

// ============================================================================
// CONSTANTS
// ============================================================================

pub const CLAUDE_PROVIDER: &str = "claude-opus-4-5";
pub const CLAUDE_MODEL: &str = "claude-opus-4-5-20250514";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const GPT_PROVIDER: &str = "gpt-5.2";
pub const GPT_MODEL: &str = "gpt-5.2";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub const GEMINI_PROVIDER: &str = "gemini-3-pro";
pub const GEMINI_MODEL: &str = "gemini-3-pro";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub const TEMPERATURE: f64 = 0.1;
pub const MAX_OUTPUT_TOKENS: u32 = 1024;

const SYSTEM_MESSAGE: &str = "You are a prediction market oracle. Respond only with valid JSON.";

// ============================================================================
// PROMPT
// ============================================================================

/// Render the judgment prompt shared by every provider
pub fn build_prompt(title: &str, description: &str, evidence: &str) -> String {
    format!(
        "You are a prediction market oracle. Your job is to determine whether a prediction market \
should resolve as Yes, No, or Invalid.

## Market
Title: {title}
Description: {description}

## Evidence
{evidence}

## Instructions
1. Analyze the following context and evidence to determine whether the event described has occurred.
2. Consider the description carefully for resolution criteria.
3. Return your judgment as JSON with exactly these fields:
   - \"outcome\": one of \"Yes\", \"No\", or \"Invalid\"
   - \"confidence\": integer 0-100 representing your confidence
   - \"reasoning\": brief explanation of your judgment

Only return Invalid if the question is unanswerable, ambiguous beyond resolution, or the event cannot be verified.

Respond with ONLY valid JSON, no markdown fences or extra text.
"
    )
}

// ============================================================================
// RESPONSE PARSING
// ============================================================================

fn fence_patterns() -> &'static (Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"^```(?:json)?\s*\n?").expect("opening fence pattern"),
            Regex::new(r"\n?```\s*$").expect("closing fence pattern"),
        )
    })
}

/// Extract the JSON object from an LLM reply.
///
/// Markdown fences are stripped, then the slice from the first `{` to the
/// last `}` is parsed.
pub fn parse_llm_json(raw: &str) -> Result<Value, ProviderError> {
    let (open, close) = fence_patterns();
    let text = raw.trim();
    let text = open.replace(text, "");
    let text = close.replace(&text, "");

    let (start, end) = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => (start, end),
        _ => {
            return Err(ProviderError::Malformed(format!(
                "No JSON object found in LLM response: {}",
                raw
            )))
        }
    };

    serde_json::from_str(&text[start..=end]).map_err(|e| {
        ProviderError::Malformed(format!("Failed to parse JSON from LLM response: {} ({})", raw, e))
    })
}

/// Whole-number confidence from an integer, a float (truncated) or a numeric string
fn confidence_value(value: &Value) -> Option<u64> {
    fn truncate(f: f64) -> Option<u64> {
        (f.is_finite() && f >= 0.0).then(|| f.trunc() as u64)
    }

    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(truncate)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| s.parse::<f64>().ok().and_then(truncate))
        }
        _ => None,
    }
}

/// Turn raw reply text into a validated judgment attributed to `provider`
pub fn parse_judgment(provider: &str, raw: &str) -> Result<JudgmentResult, ProviderError> {
    let data = parse_llm_json(raw)?;

    let label = data["outcome"]
        .as_str()
        .ok_or_else(|| ProviderError::Malformed("missing \"outcome\"".to_string()))?;
    let outcome = Outcome::from_label(label)
        .ok_or_else(|| ProviderError::Malformed(format!("unknown outcome \"{}\"", label)))?;

    let confidence = confidence_value(&data["confidence"])
        .filter(|c| *c <= 100)
        .ok_or_else(|| {
            ProviderError::Malformed(format!("confidence must be a number 0-100, got {}", data["confidence"]))
        })?;

    let reasoning = data["reasoning"]
        .as_str()
        .ok_or_else(|| ProviderError::Malformed("missing \"reasoning\"".to_string()))?;

    Ok(JudgmentResult {
        provider: provider.to_string(),
        outcome,
        confidence: confidence as u8,
        reasoning: reasoning.to_string(),
    })
}

// ============================================================================
// HTTP
// ============================================================================

async fn post_json(
    url: &str,
    headers: &[(&str, &str)],
    body: &Value,
) -> Result<Value, ProviderError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(JUDGE_TIMEOUT_SECS))
        .build()
        .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

    let mut request = client.post(url).json(body);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let resp = request
        .send()
        .await
        .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(ProviderError::HttpStatus(status.as_u16(), text));
    }

    resp.json()
        .await
        .map_err(|e| ProviderError::Malformed(format!("response body is not JSON: {}", e)))
}

fn reply_text<'a>(provider: &str, value: &'a Value) -> Result<&'a str, ProviderError> {
    let text = value
        .as_str()
        .ok_or_else(|| ProviderError::Malformed("response carries no text".to_string()))?
        .trim();
    debug!("Raw response from {}: {}", provider, text);
    Ok(text)
}

// ============================================================================
// CLAUDE (Anthropic Messages API)
// ============================================================================

pub struct ClaudeJudge {
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl ClaudeJudge {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            model: CLAUDE_MODEL.to_string(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl JudgeProvider for ClaudeJudge {
    fn name(&self) -> &str {
        CLAUDE_PROVIDER
    }

    async fn judge(&self, title: &str, description: &str, evidence: &str) -> Result<JudgmentResult, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingApiKey("ANTHROPIC_API_KEY"))?;

        info!("Querying {}...", CLAUDE_PROVIDER);
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "temperature": TEMPERATURE,
            "messages": [{ "role": "user", "content": build_prompt(title, description, evidence) }],
        });
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let headers = [("x-api-key", api_key), ("anthropic-version", ANTHROPIC_VERSION)];

        let response = post_json(&url, &headers, &body).await?;
        let raw = reply_text(CLAUDE_PROVIDER, &response["content"][0]["text"])?;
        parse_judgment(CLAUDE_PROVIDER, raw)
    }
}

// ============================================================================
// GPT (OpenAI-compatible chat completions)
// ============================================================================

pub struct OpenAiJudge {
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAiJudge {
    /// `base_url` and `model` fall back to the public endpoint and default model
    pub fn new(api_key: Option<String>, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| GPT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
        }
    }
}

#[async_trait]
impl JudgeProvider for OpenAiJudge {
    fn name(&self) -> &str {
        GPT_PROVIDER
    }

    async fn judge(&self, title: &str, description: &str, evidence: &str) -> Result<JudgmentResult, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingApiKey("OPENAI_API_KEY"))?;

        info!("Querying {} (model {})...", GPT_PROVIDER, self.model);
        let body = json!({
            "model": self.model,
            "temperature": TEMPERATURE,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "messages": [
                { "role": "system", "content": SYSTEM_MESSAGE },
                { "role": "user", "content": build_prompt(title, description, evidence) },
            ],
        });
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let bearer = format!("Bearer {}", api_key);
        let headers = [("authorization", bearer.as_str())];

        let response = post_json(&url, &headers, &body).await?;
        let raw = reply_text(GPT_PROVIDER, &response["choices"][0]["message"]["content"])?;
        parse_judgment(GPT_PROVIDER, raw)
    }
}

// ============================================================================
// GEMINI (Google generateContent)
// ============================================================================

pub struct GeminiJudge {
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiJudge {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            model: GEMINI_MODEL.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl JudgeProvider for GeminiJudge {
    fn name(&self) -> &str {
        GEMINI_PROVIDER
    }

    async fn judge(&self, title: &str, description: &str, evidence: &str) -> Result<JudgmentResult, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingApiKey("GEMINI_API_KEY"))?;

        info!("Querying {}...", GEMINI_PROVIDER);
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(title, description, evidence) }] }],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
            },
        });
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let headers = [("x-goog-api-key", api_key)];

        let response = post_json(&url, &headers, &body).await?;
        let raw = reply_text(GEMINI_PROVIDER, &response["candidates"][0]["content"]["parts"][0]["text"])?;
        parse_judgment(GEMINI_PROVIDER, raw)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const VALID: &str = r#"{"outcome": "Yes", "confidence": 85, "reasoning": "Evidence supports yes"}"#;

    /// Serve one canned JSON response and hand back the raw request text
    async fn serve_once(status: u16, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower.strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if buf.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {} OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    #[test]
    fn test_parse_plain_json() {
        let value = parse_llm_json(VALID).unwrap();
        assert_eq!(value["outcome"], "Yes");
        assert_eq!(value["confidence"], 85);
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"outcome\": \"No\", \"confidence\": 70, \"reasoning\": \"nope\"}\n```";
        assert_eq!(parse_llm_json(raw).unwrap()["outcome"], "No");

        let raw = "```\n{\"outcome\": \"Yes\", \"confidence\": 90, \"reasoning\": \"yes\"}\n```";
        assert_eq!(parse_llm_json(raw).unwrap()["confidence"], 90);
    }

    #[test]
    fn test_parse_json_wrapped_in_prose() {
        let raw = "Here is my analysis:\n{\"outcome\": \"Yes\", \"confidence\": 80, \"reasoning\": \"ok\"}\nThat is my answer.";
        assert_eq!(parse_llm_json(raw).unwrap()["confidence"], 80);
    }

    #[test]
    fn test_parse_nested_object() {
        let raw = r#"{"outcome": "Yes", "confidence": 90, "reasoning": "t", "meta": {"src": "web"}}"#;
        assert_eq!(parse_llm_json(raw).unwrap()["meta"]["src"], "web");
    }

    #[test]
    fn test_parse_failures() {
        match parse_llm_json("This response has no JSON at all") {
            Err(ProviderError::Malformed(msg)) => assert!(msg.contains("No JSON object found")),
            other => panic!("unexpected: {:?}", other),
        }
        match parse_llm_json(r#"{"outcome": "Yes", confidence: }"#) {
            Err(ProviderError::Malformed(msg)) => assert!(msg.contains("Failed to parse JSON")),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(parse_llm_json("").is_err());
    }

    #[test]
    fn test_parse_judgment_validates_fields() {
        let judgment = parse_judgment("claude", VALID).unwrap();
        assert_eq!(judgment.provider, "claude");
        assert_eq!(judgment.outcome, Outcome::Yes);
        assert_eq!(judgment.confidence, 85);

        assert!(parse_judgment("x", r#"{"outcome": "yes", "confidence": 50, "reasoning": ""}"#).is_err());
        assert!(parse_judgment("x", r#"{"outcome": "Yes", "confidence": 101, "reasoning": ""}"#).is_err());
        assert!(parse_judgment("x", r#"{"outcome": "Yes", "confidence": -1, "reasoning": ""}"#).is_err());
        assert!(parse_judgment("x", r#"{"outcome": "Yes", "confidence": true, "reasoning": ""}"#).is_err());
        assert!(parse_judgment("x", r#"{"outcome": "No", "confidence": 50}"#).is_err());
    }

    #[test]
    fn test_parse_judgment_accepts_float_and_string_confidence() {
        let float = parse_judgment("x", r#"{"outcome": "Yes", "confidence": 85.0, "reasoning": "r"}"#).unwrap();
        assert_eq!(float.confidence, 85);

        let fractional = parse_judgment("x", r#"{"outcome": "No", "confidence": 55.9, "reasoning": "r"}"#).unwrap();
        assert_eq!(fractional.confidence, 55);

        let text = parse_judgment("x", r#"{"outcome": "Invalid", "confidence": "85", "reasoning": "r"}"#).unwrap();
        assert_eq!(text.outcome, Outcome::Invalid);
        assert_eq!(text.confidence, 85);

        let padded = parse_judgment("x", r#"{"outcome": "Yes", "confidence": " 100 ", "reasoning": "r"}"#).unwrap();
        assert_eq!(padded.confidence, 100);

        assert!(parse_judgment("x", r#"{"outcome": "Yes", "confidence": "101", "reasoning": ""}"#).is_err());
        assert!(parse_judgment("x", r#"{"outcome": "Yes", "confidence": 100.5, "reasoning": ""}"#).is_ok());
        assert!(parse_judgment("x", r#"{"outcome": "Yes", "confidence": 101.0, "reasoning": ""}"#).is_err());
        assert!(parse_judgment("x", r#"{"outcome": "Yes", "confidence": -0.5, "reasoning": ""}"#).is_err());
        assert!(parse_judgment("x", r#"{"outcome": "Yes", "confidence": "high", "reasoning": ""}"#).is_err());
    }

    #[test]
    fn test_prompt_contains_market_and_evidence() {
        let prompt = build_prompt("My Special Market", "Detailed description here", "### Fetched Sources");
        assert!(prompt.contains("Title: My Special Market"));
        assert!(prompt.contains("Description: Detailed description here"));
        assert!(prompt.contains("## Evidence\n### Fetched Sources"));
    }

    #[tokio::test]
    async fn test_missing_api_keys() {
        let claude = ClaudeJudge::new(None);
        let gpt = OpenAiJudge::new(None, None, None);
        let gemini = GeminiJudge::new(None);

        assert_eq!(
            claude.judge("T", "D", "E").await,
            Err(ProviderError::MissingApiKey("ANTHROPIC_API_KEY"))
        );
        assert_eq!(
            gpt.judge("T", "D", "E").await,
            Err(ProviderError::MissingApiKey("OPENAI_API_KEY"))
        );
        assert_eq!(
            gemini.judge("T", "D", "E").await,
            Err(ProviderError::MissingApiKey("GEMINI_API_KEY"))
        );
    }

    #[tokio::test]
    async fn test_claude_round_trip() {
        let body = json!({ "content": [{ "type": "text", "text": VALID }] }).to_string();
        let (base, server) = serve_once(200, body).await;

        let judge = ClaudeJudge::new(Some("test-key".to_string())).with_base_url(base);
        let result = judge.judge("My Special Market", "Detailed description here", "E").await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(result.provider, CLAUDE_PROVIDER);
        assert_eq!(result.outcome, Outcome::Yes);
        assert_eq!(result.confidence, 85);
        assert!(request.starts_with("POST /v1/messages"));
        assert!(request.contains("x-api-key: test-key"));
        assert!(request.contains("My Special Market"));
    }

    #[tokio::test]
    async fn test_openai_round_trip_uses_model_override() {
        let body = json!({ "choices": [{ "message": { "content": VALID } }] }).to_string();
        let (base, server) = serve_once(200, body).await;

        let judge = OpenAiJudge::new(Some("test-key".to_string()), Some(base), Some("local-model".to_string()));
        let result = judge.judge("T", "D", "E").await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(result.provider, GPT_PROVIDER);
        assert_eq!(result.confidence, 85);
        assert!(request.starts_with("POST /chat/completions"));
        assert!(request.contains("\"model\":\"local-model\""));
        assert!(request.contains("Bearer test-key"));
    }

    #[tokio::test]
    async fn test_gemini_round_trip() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": format!("```json\n{}\n```", VALID) }] } }]
        })
        .to_string();
        let (base, server) = serve_once(200, body).await;

        let judge = GeminiJudge::new(Some("test-key".to_string())).with_base_url(base);
        let result = judge.judge("T", "D", "E").await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(result.provider, GEMINI_PROVIDER);
        assert_eq!(result.outcome, Outcome::Yes);
        assert!(request.starts_with("POST /v1beta/models/gemini-3-pro:generateContent"));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let (base, server) = serve_once(500, "{\"error\":\"boom\"}".to_string()).await;
        let judge = ClaudeJudge::new(Some("k".to_string())).with_base_url(base);

        match judge.judge("T", "D", "E").await {
            Err(ProviderError::HttpStatus(500, body)) => assert!(body.contains("boom")),
            other => panic!("unexpected: {:?}", other),
        }
        server.await.unwrap();
    }
}
