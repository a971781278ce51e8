//! AI gateway over HTTP.
//!
//! Posts JSON to `<endpoint>/question` and `<endpoint>/feedback` and reads a
//! `{ "data": "...", "error": { "message": "..." } }` envelope back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::traits::AiGateway;
use crate::error::GatewayError;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    error: Option<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    message: String,
}

pub struct HttpAiGateway {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpAiGateway {
    /// Build a gateway for `endpoint`. A missing trailing slash is added so
    /// route names join below the endpoint path.
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let mut endpoint = Url::parse(endpoint)
            .map_err(|e| GatewayError::ai(format!("invalid AI endpoint '{endpoint}': {e}")))?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    async fn post(&self, route: &str, body: serde_json::Value) -> Result<String, GatewayError> {
        let url = self
            .endpoint
            .join(route)
            .map_err(|e| GatewayError::ai(e.to_string()))?;

        let mut request = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        let envelope: Option<Envelope> = serde_json::from_str(&text).ok();
        if let Some(Envelope {
            error: Some(err), ..
        }) = &envelope
        {
            return Err(GatewayError::ai(err.message.clone()));
        }
        if !status.is_success() {
            return Err(GatewayError::ai(format!("HTTP {status}: {text}")));
        }
        match envelope.and_then(|e| e.data) {
            Some(data) if !data.trim().is_empty() => Ok(data),
            _ => Err(GatewayError::ai(format!(
                "'{route}' response carried no text"
            ))),
        }
    }
}

#[async_trait]
impl AiGateway for HttpAiGateway {
    async fn generate_question(&self, topic: &str) -> Result<String, GatewayError> {
        self.post("question", json!({ "topic": topic })).await
    }

    async fn generate_feedback(
        &self,
        question: &str,
        essay: &str,
    ) -> Result<String, GatewayError> {
        self.post("feedback", json!({ "question": question, "essay": essay }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn gateway(url: &str, key: Option<&str>) -> HttpAiGateway {
        HttpAiGateway::new(url, key.map(String::from), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn question_is_read_from_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/question")
            .match_body(Matcher::Json(json!({ "topic": "opinion" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":"Some people think cities should ban cars."}"#)
            .create_async()
            .await;

        let ai = gateway(&format!("{}/api", server.url()), None);
        let question = ai.generate_question("opinion").await.unwrap();
        assert_eq!(question, "Some people think cities should ban cars.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn feedback_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/feedback")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::Json(
                json!({ "question": "Q?", "essay": "My answer." }),
            ))
            .with_status(200)
            .with_body(r#"{"data":"Band 7. Work on cohesion."}"#)
            .create_async()
            .await;

        let ai = gateway(&server.url(), Some("secret"));
        let feedback = ai.generate_feedback("Q?", "My answer.").await.unwrap();
        assert_eq!(feedback, "Band 7. Work on cohesion.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn envelope_error_message_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/question")
            .with_status(200)
            .with_body(r#"{"error":{"message":"quota exceeded"}}"#)
            .create_async()
            .await;

        let ai = gateway(&server.url(), None);
        let err = ai.generate_question("direct").await.unwrap_err();
        assert_eq!(err, GatewayError::ai("quota exceeded"));
    }

    #[tokio::test]
    async fn http_failure_without_envelope() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/question")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let ai = gateway(&server.url(), None);
        let err = ai.generate_question("direct").await.unwrap_err();
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn rejects_invalid_endpoint() {
        let result = HttpAiGateway::new("not a url", None, Duration::from_secs(1));
        assert!(result.is_err());
    }
}
