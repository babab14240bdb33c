use crate::config::BackendConfig;
use crate::models::{ChapterSpan, CorrectedText, Job, Mode, Outcome, PagesRead};
use http::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;

/// Failures of a single backend attempt. None of them are retried.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend rejected the request and explained why.
    #[error("{detail}")]
    Detail { status: StatusCode, detail: String },

    #[error("processing failed (HTTP {})", .status.as_u16())]
    Status { status: StatusCode },

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("the backend returned a malformed response")]
    Malformed(#[source] serde_json::Error),
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: serde_json::Value,
}

#[derive(Deserialize)]
struct ChapterMapBody {
    chapters: Vec<ChapterSpan>,
}

#[derive(Deserialize)]
struct CorrectionBody {
    corrected_text: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default, alias = "page_read")]
    pages_processed: Option<PagesRead>,
}

pub struct BackendClient {
    client: reqwest::Client,
    config: BackendConfig,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Self {
        BackendClient {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn endpoint(&self, mode: Mode) -> String {
        let path = match mode {
            Mode::ChapterMap => &self.config.chapter_map_path,
            Mode::TextCorrection => &self.config.text_correction_path,
        };
        format!("{}{}", self.config.base_url, path)
    }

    /// Posts the job as multipart form data and decodes the mode-specific reply.
    pub async fn submit(&self, job: &Job) -> Result<Outcome, BackendError> {
        let url = self.endpoint(job.mode);
        let (start_field, end_field) = job.mode.range_fields();

        let mut part = Part::bytes(job.file.data.clone()).file_name(job.file.name.clone());
        if let Some(content_type) = &job.file.content_type {
            part = part.mime_str(content_type)?;
        }
        let form = Form::new()
            .part("file", part)
            .text(start_field, job.range.start.to_string())
            .text(end_field, job.range.end.to_string());

        tracing::debug!(attempt = %job.attempt, %url, range = %job.range, "posting job to backend");

        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(error_from_body(status, &body));
        }

        decode_outcome(job.mode, &body)
    }

    /// Fetches the backend root to check that it is reachable.
    pub async fn probe(&self) -> Result<String, BackendError> {
        let url = format!("{}/", self.config.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(error_from_body(status, &body));
        }
        Ok(body)
    }
}

fn error_from_body(status: StatusCode, body: &str) -> BackendError {
    let detail = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => Some(detail),
        Ok(ErrorBody {
            detail: serde_json::Value::Null,
        }) => None,
        // FastAPI validation errors carry a structured detail.
        Ok(ErrorBody { detail }) => Some(detail.to_string()),
        Err(_) => None,
    };

    match detail {
        Some(detail) if !detail.is_empty() => BackendError::Detail { status, detail },
        _ => BackendError::Status { status },
    }
}

fn decode_outcome(mode: Mode, body: &str) -> Result<Outcome, BackendError> {
    match mode {
        Mode::ChapterMap => {
            let parsed: ChapterMapBody =
                serde_json::from_str(body).map_err(BackendError::Malformed)?;
            Ok(Outcome::Chapters {
                chapters: parsed.chapters,
            })
        }
        Mode::TextCorrection => {
            let parsed: CorrectionBody =
                serde_json::from_str(body).map_err(BackendError::Malformed)?;
            Ok(Outcome::CorrectedText(CorrectedText {
                text: parsed.corrected_text,
                filename: parsed.filename,
                pages: parsed.pages_processed,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PageRange, PdfFile};
    use crate::test_support::FakeBackend;
    use uuid::Uuid;

    fn job(mode: Mode, range: PageRange) -> Job {
        Job {
            attempt: Uuid::new_v4(),
            mode,
            range,
            file: PdfFile::new(
                "novel.pdf",
                Some("application/pdf".to_string()),
                b"%PDF-1.4 fake".to_vec(),
            ),
        }
    }

    #[tokio::test]
    async fn chapter_map_posts_chapter_fields_and_decodes_spans() {
        let backend = FakeBackend::start(
            StatusCode::OK,
            r#"{"chapters":[{"chapter":3,"start_page":10,"end_page":14},{"chapter":4,"start_page":15,"end_page":21}]}"#,
        )
        .await;
        let client = BackendClient::new(backend.config());

        let outcome = client
            .submit(&job(Mode::ChapterMap, PageRange::new(3, 4)))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Chapters {
                chapters: vec![
                    ChapterSpan { chapter: 3, start_page: 10, end_page: 14 },
                    ChapterSpan { chapter: 4, start_page: 15, end_page: 21 },
                ]
            }
        );

        let seen = backend.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path, "/map-chapters/");
        assert_eq!(seen[0].field("start_chapter"), Some("3"));
        assert_eq!(seen[0].field("end_chapter"), Some("4"));
        assert_eq!(seen[0].file_name.as_deref(), Some("novel.pdf"));
        assert_eq!(seen[0].file_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn text_correction_uses_plain_range_fields_and_page_read_alias() {
        let backend = FakeBackend::start(
            StatusCode::OK,
            r#"{"filename":"novel.pdf","page_read":2,"corrected_text":"Hello  world\n"}"#,
        )
        .await;
        let client = BackendClient::new(backend.config());

        let outcome = client
            .submit(&job(Mode::TextCorrection, PageRange::new(2, 2)))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::CorrectedText(CorrectedText {
                text: "Hello  world\n".to_string(),
                filename: Some("novel.pdf".to_string()),
                pages: Some(PagesRead::Count(2)),
            })
        );
        let seen = backend.requests();
        assert_eq!(seen[0].path, "/process-pdf/");
        assert_eq!(seen[0].field("start"), Some("2"));
        assert_eq!(seen[0].field("end"), Some("2"));
        assert_eq!(seen[0].field("start_chapter"), None);
    }

    #[tokio::test]
    async fn error_detail_is_surfaced_verbatim() {
        let backend =
            FakeBackend::start(StatusCode::BAD_REQUEST, r#"{"detail":"its only  1 page"}"#).await;
        let client = BackendClient::new(backend.config());

        let err = client
            .submit(&job(Mode::TextCorrection, PageRange::new(1, 1)))
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Detail { status, .. } if status == StatusCode::BAD_REQUEST));
        assert_eq!(err.to_string(), "its only  1 page");
    }

    #[tokio::test]
    async fn non_json_error_body_falls_back_to_generic_message() {
        let backend =
            FakeBackend::start(StatusCode::BAD_GATEWAY, "<html>upstream down</html>").await;
        let client = BackendClient::new(backend.config());

        let err = client
            .submit(&job(Mode::ChapterMap, PageRange::new(1, 2)))
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Status { .. }));
        assert_eq!(err.to_string(), "processing failed (HTTP 502)");
    }

    #[test]
    fn structured_detail_is_rendered_as_json() {
        let err = error_from_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail":[{"loc":["body","file"],"msg":"field required"}]}"#,
        );
        assert!(err.to_string().contains("field required"));

        let err = error_from_body(StatusCode::INTERNAL_SERVER_ERROR, r#"{"other":1}"#);
        assert!(matches!(err, BackendError::Status { .. }));
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_failure() {
        let backend = FakeBackend::start(StatusCode::OK, "{\"chapters\": [").await;
        let client = BackendClient::new(backend.config());

        let err = client
            .submit(&job(Mode::ChapterMap, PageRange::new(1, 2)))
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Malformed(_)));
        assert_eq!(err.to_string(), "the backend returned a malformed response");
    }

    #[tokio::test]
    async fn success_body_of_the_wrong_shape_is_malformed() {
        let backend = FakeBackend::start(StatusCode::OK, r#"{"corrected_text":"x"}"#).await;
        let client = BackendClient::new(backend.config());

        let err = client
            .submit(&job(Mode::ChapterMap, PageRange::new(1, 2)))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Malformed(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let client = BackendClient::new(BackendConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..BackendConfig::default()
        });

        let err = client
            .submit(&job(Mode::ChapterMap, PageRange::new(1, 2)))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
        assert!(!err.to_string().is_empty());
    }

    #[tokio::test]
    async fn probe_returns_root_body() {
        let backend = FakeBackend::start(StatusCode::OK, "{}").await;
        let client = BackendClient::new(backend.config());
        assert_eq!(client.probe().await.unwrap(), "\"server is up\"");
    }
}
