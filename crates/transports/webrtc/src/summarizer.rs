//! HTTP summarizer client

use async_trait::async_trait;
use huddle_core::{parse_note_response, Error, NoteContent, Result, Summarizer};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Serialize)]
struct SummarizeRequest<'a> {
    transcript: &'a str,
}

/// Posts the session transcript to a notes endpoint.
///
/// The endpoint may answer with bare JSON or with model output that wraps it
/// in prose or code fences; both go through [`parse_note_response`].
pub struct HttpSummarizer {
    client: reqwest::Client,
    url: String,
}

impl HttpSummarizer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<NoteContent> {
        debug!(url = %self.url, bytes = transcript.len(), "Requesting notes");

        let response = self
            .client
            .post(&self.url)
            .json(&SummarizeRequest { transcript })
            .send()
            .await
            .map_err(|e| Error::Summarization(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Summarization(format!(
                "Summarizer returned HTTP {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Summarization(format!("Failed to read response: {}", e)))?;

        let notes = parse_note_response(&body)?;
        info!(
            points = notes.summary_points.len(),
            actions = notes.action_items.len(),
            "Generated notes"
        );
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Notes endpoint answering every request with `status` and `body`;
    /// received JSON bodies arrive on the returned channel
    async fn notes_endpoint(
        status: StatusCode,
        body: &'static str,
    ) -> (String, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            "/generate-notes",
            post(move |Json(request): Json<Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(request);
                    (status, body)
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/generate-notes", addr), rx)
    }

    #[tokio::test]
    async fn test_summarize_parses_fenced_reply() {
        let (url, mut requests) = notes_endpoint(
            StatusCode::OK,
            "```json\n{\"summaryNotes\":[\"Ship Friday\"],\"actionItems\":[\"Write tests\"],\"recap\":\"Short sync.\"}\n```",
        )
        .await;

        let summarizer = HttpSummarizer::new(url);
        let notes = summarizer.summarize("You: ship it\nAI: ok").await.unwrap();
        assert_eq!(notes.summary_points, vec!["Ship Friday".to_string()]);
        assert_eq!(notes.action_items, vec!["Write tests".to_string()]);
        assert_eq!(notes.recap, "Short sync.");

        let sent = requests.recv().await.unwrap();
        assert_eq!(sent["transcript"], "You: ship it\nAI: ok");
    }

    #[tokio::test]
    async fn test_summarize_reply_without_object_is_empty() {
        let (url, _requests) = notes_endpoint(StatusCode::OK, "Nothing to report.").await;
        let notes = HttpSummarizer::new(url).summarize("You: hi").await.unwrap();
        assert!(notes.is_empty());
    }

    #[tokio::test]
    async fn test_summarize_http_error() {
        let (url, _requests) = notes_endpoint(StatusCode::BAD_GATEWAY, "upstream down").await;
        let err = HttpSummarizer::new(url).summarize("x").await.unwrap_err();
        assert!(matches!(err, Error::Summarization(_)));
    }
}
