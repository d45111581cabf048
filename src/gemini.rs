use std::sync::OnceLock;

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ChatError;

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorBody,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    api_version: String,
    model: String,
}

impl GeminiClient {
    pub fn from_config(config: &Config) -> Result<Self, ChatError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_key: config.api_key.clone(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            api_version: config.api_version().to_string(),
            model: config.model().to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, self.api_version, self.model
        )
    }

    /// Send one user turn and return the reply with bold markers removed.
    pub async fn generate(&self, prompt: &str) -> Result<String, ChatError> {
        let api_key = self.api_key.as_deref().ok_or(ChatError::MissingApiKey)?;

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        debug!(model = %self.model, chars = prompt.chars().count(), "sending generateContent request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(%status, "Gemini API returned an error");
            return Err(match serde_json::from_str::<GeminiErrorResponse>(&body) {
                Ok(err) => ChatError::Api(err.error.message),
                Err(_) => ChatError::Status(status),
            });
        }

        let text = extract_text(&body)?;
        Ok(strip_bold(&text))
    }
}

/// Pull `candidates[0].content.parts[0].text` out of a response body.
fn extract_text(body: &str) -> Result<String, ChatError> {
    let response: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| ChatError::MalformedResponse("response contained no candidate text".to_string()))
}

/// Replace every `**text**` with `text`.
pub fn strip_bold(text: &str) -> String {
    static BOLD: OnceLock<Regex> = OnceLock::new();
    let re = BOLD.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern compiles"));
    re.replace_all(text, "$1").into_owned()
}

/// Loopback HTTP fixtures shared by the client and app tests.
#[cfg(test)]
pub(crate) mod testing {
    use serde_json::Value;
    use std::collections::HashMap;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    #[derive(Debug)]
    pub struct CapturedRequest {
        pub method: String,
        pub path: String,
        pub headers: HashMap<String, String>,
        pub body: Value,
    }

    /// One-shot HTTP/1.1 server on a random loopback port. Replies to a single
    /// request with `status` and `resp_body` and hands back what it received.
    pub async fn mock_server_once(
        status: u16,
        resp_body: &'static str,
    ) -> (u16, tokio::sync::oneshot::Receiver<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = tokio::sync::oneshot::channel::<CapturedRequest>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);

            let mut request_line = String::new();
            reader.read_line(&mut request_line).await.unwrap();
            let mut parts = request_line.trim().splitn(3, ' ');
            let method = parts.next().unwrap_or("").to_string();
            let path = parts.next().unwrap_or("").to_string();

            let mut headers = HashMap::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    break;
                }
                if let Some((k, v)) = trimmed.split_once(": ") {
                    let key = k.to_lowercase();
                    if key == "content-length" {
                        content_length = v.parse().unwrap_or(0);
                    }
                    headers.insert(key, v.to_string());
                }
            }

            let mut body_bytes = vec![0u8; content_length];
            reader.read_exact(&mut body_bytes).await.unwrap();
            let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

            let _ = tx.send(CapturedRequest { method, path, headers, body });

            let http_resp = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                resp_body.len(),
                resp_body,
            );
            let _ = write_half.write_all(http_resp.as_bytes()).await;
        });

        (port, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::testing::mock_server_once;
    use tokio::net::TcpListener;

    fn client_for(port: u16, api_key: Option<&str>) -> GeminiClient {
        let config = Config {
            api_key: api_key.map(str::to_string),
            base_url: Some(format!("http://127.0.0.1:{port}/")),
            ..Config::new()
        };
        GeminiClient::from_config(&config).unwrap()
    }

    #[test]
    fn test_strip_bold() {
        assert_eq!(strip_bold("a **b** c **d e**"), "a b c d e");
        assert_eq!(strip_bold("no markup"), "no markup");
        assert_eq!(strip_bold("unclosed **bold"), "unclosed **bold");
        // Does not cross line breaks
        assert_eq!(strip_bold("**a\nb**"), "**a\nb**");
    }

    #[test]
    fn test_extract_text_missing_candidates() {
        assert!(matches!(extract_text(r#"{"candidates":[]}"#), Err(ChatError::MalformedResponse(_))));
        assert!(matches!(extract_text("not json"), Err(ChatError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_sends_expected_request() {
        let (port, req_rx) = mock_server_once(
            200,
            r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#,
        )
        .await;

        let reply = client_for(port, Some("test-key")).generate("hello there").await.unwrap();
        assert_eq!(reply, "ok");

        let req = req_rx.await.unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/v1/models/gemini-1.5-pro:generateContent");
        assert_eq!(req.headers.get("x-goog-api-key").map(String::as_str), Some("test-key"));
        assert!(!req.path.contains("key="), "credential must not be in the URL");
        assert_eq!(
            req.body,
            serde_json::json!({"contents":[{"role":"user","parts":[{"text":"hello there"}]}]})
        );
    }

    #[tokio::test]
    async fn test_reply_has_bold_stripped() {
        let (port, _rx) = mock_server_once(
            200,
            r#"{"candidates":[{"content":{"parts":[{"text":"**Sure!** Here you go"}]}}]}"#,
        )
        .await;

        let reply = client_for(port, Some("k")).generate("hi").await.unwrap();
        assert_eq!(reply, "Sure! Here you go");
    }

    #[tokio::test]
    async fn test_api_error_message_is_verbatim() {
        let (port, _rx) = mock_server_once(
            400,
            r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#,
        )
        .await;

        let err = client_for(port, Some("bad")).generate("hi").await.unwrap_err();
        assert_eq!(err.to_string(), "API key not valid. Please pass a valid API key.");
    }

    #[tokio::test]
    async fn test_error_status_without_body() {
        let (port, _rx) = mock_server_once(503, "oops").await;

        let err = client_for(port, Some("k")).generate("hi").await.unwrap_err();
        assert!(matches!(err, ChatError::Status(s) if s.as_u16() == 503));
    }

    #[tokio::test]
    async fn test_malformed_success_body() {
        let (port, _rx) = mock_server_once(200, r#"{"candidates":[{}]}"#).await;

        let err = client_for(port, Some("k")).generate("hi").await.unwrap_err();
        assert!(matches!(err, ChatError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_key_sends_nothing() {
        let client = client_for(9, None);
        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, ChatError::MissingApiKey));
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_error() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = client_for(port, Some("k")).generate("hi").await.unwrap_err();
        assert!(matches!(err, ChatError::Network(_)));
    }

    #[test]
    fn test_endpoint_from_config() {
        let config = Config {
            model: Some("gemini-1.5-flash".to_string()),
            base_url: Some("https://example.test/".to_string()),
            api_version: Some("v1beta".to_string()),
            ..Config::new()
        };
        let client = GeminiClient::from_config(&config).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(client.model(), "gemini-1.5-flash");
    }
}
