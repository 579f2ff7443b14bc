//! Document extraction through the Gemini `generateContent` API.

use super::util::{endpoint, http_client, is_retryable_status};
use crate::core::error::PipelineError;
use crate::core::extraction::{Extractor, MIME_JPEG, MIME_PDF};
use crate::core::fact::FactMap;
use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

const TICKET_PROMPT: &str = "\
You are a tax auditor specialised in Mexican purchase receipts. Extract the data of this \
purchase ticket with complete accuracy. Reply with a single JSON object with the keys \
\"tienda\" (normalized store name), \"fecha\" (YYYY-MM-DD), \"total\" (number), \
\"es_conocida\" (boolean) and \"campos_adicionales\" (object with the invoicing fields \
printed on the ticket such as Folio, Ticket ID, Sucursal, Caja, Transaccion, RFC). \
If a field is not legible return null. Never invent values and never confuse the \
subtotal with the total.";

const INVESTMENT_PROMPT: &str = "\
Extract the purchase of a listed security from this brokerage statement. Reply with a \
single JSON object with the keys \"emisora_ticker\" (exchange ticker), \"nombre_activo\" \
(asset name), \"fecha_compra\" (YYYY-MM-DD), \"cantidad_titulos\" (number of shares), \
\"precio_por_titulo\" (price per share, without currency symbols) and \"moneda\" \
(\"MXN\" or \"USD\"). If a field is not legible return null.";

pub struct GeminiExtractor {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Parses the model answer into a fact map.
///
/// Tolerates markdown code fences and a single-element array around the object.
fn parse_facts(text: &str) -> Result<FactMap, PipelineError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    let value: Value = serde_json::from_str(body.trim())
        .map_err(|e| PipelineError::MalformedFact(format!("Model answer is not JSON: {e}")))?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Array(items) => match items.into_iter().next() {
            Some(Value::Object(map)) => Ok(map),
            _ => Err(PipelineError::MalformedFact(
                "Model answer holds no JSON object".to_string(),
            )),
        },
        _ => Err(PipelineError::MalformedFact(
            "Model answer is not a JSON object".to_string(),
        )),
    }
}

impl GeminiExtractor {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self> {
        Ok(GeminiExtractor {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: http_client(Duration::from_secs(120))?,
        })
    }

    #[instrument(
        name = "GeminiGenerate",
        skip(self, prompt, payload),
        fields(model = %self.model, bytes = payload.len())
    )]
    async fn generate(
        &self,
        prompt: &str,
        mime_type: &str,
        payload: &[u8],
    ) -> Result<FactMap, PipelineError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text { text: prompt },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type,
                            data: STANDARD.encode(payload),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };
        let url = endpoint(
            &self.base_url,
            &format!("/v1beta/models/{}:generateContent", self.model),
            &[],
        )?;

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, %body, "Model request rejected");
            return Err(if is_retryable_status(status) {
                PipelineError::Transient(format!("Model unavailable: HTTP {status}"))
            } else if status == StatusCode::BAD_REQUEST {
                PipelineError::InvalidDocument(format!("Model rejected the document: {body}"))
            } else {
                PipelineError::Transient(format!("Model request failed: HTTP {status}"))
            });
        }

        let data: GenerateContentResponse = response.json().await?;
        let text = data
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .and_then(|p| p.into_iter().find_map(|p| p.text))
            .ok_or_else(|| PipelineError::MalformedFact("Model returned no content".to_string()))?;

        parse_facts(&text)
    }
}

#[async_trait]
impl Extractor for GeminiExtractor {
    async fn extract_ticket_from_image(&self, jpeg: &[u8]) -> Result<FactMap, PipelineError> {
        self.generate(TICKET_PROMPT, MIME_JPEG, jpeg).await
    }

    async fn extract_ticket_from_pdf(&self, pdf: &[u8]) -> Result<FactMap, PipelineError> {
        self.generate(TICKET_PROMPT, MIME_PDF, pdf).await
    }

    async fn extract_investment_from_image(&self, jpeg: &[u8]) -> Result<FactMap, PipelineError> {
        self.generate(INVESTMENT_PROMPT, MIME_JPEG, jpeg).await
    }

    async fn extract_investment_from_pdf(&self, pdf: &[u8]) -> Result<FactMap, PipelineError> {
        self.generate(INVESTMENT_PROMPT, MIME_PDF, pdf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

    fn answer(text: &str) -> serde_json::Value {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
    }

    fn extractor(server: &MockServer) -> GeminiExtractor {
        GeminiExtractor::new(&server.uri(), "secret", "gemini-2.5-flash").unwrap()
    }

    #[tokio::test]
    async fn test_pdf_is_sent_inline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(header("x-goog-api-key", "secret"))
            .and(body_partial_json(json!({
                "contents": [{ "parts": [{}, { "inline_data": {
                    "mime_type": "application/pdf",
                    "data": STANDARD.encode(b"%PDF")
                }}]}],
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer(
                r#"{"emisora_ticker": "AAPL", "cantidad_titulos": 3}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let facts = extractor(&server)
            .extract_investment_from_pdf(b"%PDF")
            .await
            .unwrap();
        assert_eq!(facts["emisora_ticker"], json!("AAPL"));
        assert_eq!(facts["cantidad_titulos"], json!(3));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = extractor(&server)
            .extract_ticket_from_image(b"jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transient(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_rejected_document() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("Unable to process input image"),
            )
            .mount(&server)
            .await;

        let err = extractor(&server)
            .extract_ticket_from_image(b"jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidDocument(_)));
    }

    #[test]
    fn test_parse_facts_variants() {
        let fenced = "```json\n{\"tienda\": \"OXXO\", \"total\": 54.5}\n```";
        assert_eq!(parse_facts(fenced).unwrap()["tienda"], json!("OXXO"));

        let wrapped = r#"[{"tienda": "SORIANA"}]"#;
        assert_eq!(parse_facts(wrapped).unwrap()["tienda"], json!("SORIANA"));

        assert!(matches!(
            parse_facts("I could not read the ticket"),
            Err(PipelineError::MalformedFact(_))
        ));
        assert!(matches!(parse_facts("42"), Err(PipelineError::MalformedFact(_))));
    }
}
