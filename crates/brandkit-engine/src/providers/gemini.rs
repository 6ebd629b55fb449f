use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};

use super::{Candidate, CandidatePart, GenerativeService, ServiceRequest, ServiceResponse};
use crate::config::StudioConfig;
use crate::media::EncodedPayload;

/// Google Gemini `generateContent` transport. One POST per request, no
/// retries.
pub struct GeminiProvider {
    api_base: String,
    api_key: String,
    image_model: String,
    text_model: String,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        image_model: impl Into<String>,
        text_model: impl Into<String>,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            api_base: api_base.into().trim().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            image_model: image_model.into(),
            text_model: text_model.into(),
            http,
        })
    }

    pub fn from_config(config: &StudioConfig) -> Result<Self> {
        let Some(api_key) = config.api_key.clone() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        Self::new(
            config.api_base.clone(),
            api_key,
            config.image_model.clone(),
            config.text_model.clone(),
            config.request_timeout,
        )
    }

    fn model_for(&self, request: &ServiceRequest<'_>) -> &str {
        if request.wants_image() {
            &self.image_model
        } else {
            &self.text_model
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let model = model.trim().trim_start_matches("models/");
        format!("{}/models/{}:generateContent", self.api_base, model)
    }
}

pub(crate) fn build_payload(request: &ServiceRequest<'_>) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                {
                    "inlineData": {
                        "mimeType": request.image.mime_type,
                        "data": request.image.data,
                    }
                },
                { "text": request.prompt_text },
            ],
        }],
        "generationConfig": {
            "responseModalities": request
                .response_modalities
                .iter()
                .map(|modality| modality.wire_name())
                .collect::<Vec<&str>>(),
        },
    })
}

pub(crate) fn parse_response(payload: &Value) -> ServiceResponse {
    let candidates = payload
        .get("candidates")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut out = Vec::new();

    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(Value::as_object)
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut parsed = Vec::new();
        for part in parts {
            let inline_image = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
                .and_then(inline_image_from);
            let text = part
                .get("text")
                .and_then(Value::as_str)
                .map(str::to_string);
            if inline_image.is_none() && text.is_none() {
                continue;
            }
            parsed.push(CandidatePart { inline_image, text });
        }
        out.push(Candidate { parts: parsed });
    }

    ServiceResponse { candidates: out }
}

fn inline_image_from(inline: &Map<String, Value>) -> Option<EncodedPayload> {
    let data = inline
        .get("data")
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())?;
    let mime_type = inline
        .get("mimeType")
        .or_else(|| inline.get("mime_type"))
        .and_then(Value::as_str)
        .unwrap_or("image/png");
    Some(EncodedPayload {
        data: data.to_string(),
        mime_type: mime_type.to_string(),
    })
}

fn response_json_or_error(response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .context("Gemini response body read failed")?;
    if !status.is_success() {
        return Err(anyhow!(remote_error_message(code, &body)));
    }
    let parsed: Value =
        serde_json::from_str(&body).context("Gemini returned invalid JSON payload")?;
    if let Some(message) = parsed
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
    {
        bail!("Gemini request failed: {message}");
    }
    Ok(parsed)
}

/// Prefers the structured `error.message` the API sends over the raw body.
fn remote_error_message(code: u16, body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate_text(body.trim(), 512));
    format!("Gemini request failed ({code}): {message}")
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

impl GenerativeService for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &ServiceRequest<'_>) -> Result<ServiceResponse> {
        let endpoint = self.endpoint_for_model(self.model_for(request));
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&build_payload(request))
            .send()
            .map_err(|err| err.without_url())
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let payload = response_json_or_error(response)?;
        Ok(parse_response(&payload))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::providers::Modality;

    fn payload() -> EncodedPayload {
        EncodedPayload {
            data: "QUJD".to_string(),
            mime_type: "image/jpeg".to_string(),
        }
    }

    #[test]
    fn payload_carries_image_prompt_and_modalities() {
        let image = payload();
        let request = ServiceRequest {
            image: &image,
            prompt_text: "Create a lifestyle photo",
            response_modalities: &[Modality::Image, Modality::Text],
        };
        let body = build_payload(&request);
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!("image/jpeg"));
        assert_eq!(parts[0]["inlineData"]["data"], json!("QUJD"));
        assert_eq!(parts[1]["text"], json!("Create a lifestyle photo"));
        assert_eq!(
            body["generationConfig"]["responseModalities"],
            json!(["IMAGE", "TEXT"])
        );
    }

    #[test]
    fn parse_reads_both_inline_data_spellings() {
        let parsed = parse_response(&json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Sure!" },
                        { "inline_data": { "mime_type": "image/webp", "data": "WFla" } },
                        { "inlineData": { "mimeType": "image/png", "data": "" } },
                    ]
                }
            }]
        }));
        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.candidates[0].parts.len(), 2);
        let image = parsed.first_image().expect("inline image part");
        assert_eq!(image.mime_type, "image/webp");
        assert_eq!(image.data, "WFla");
        assert_eq!(parsed.text(), "Sure!");
    }

    #[test]
    fn parse_tolerates_missing_candidates() {
        let parsed = parse_response(&json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        assert!(parsed.candidates.is_empty());
        assert!(parsed.first_image().is_none());
    }

    #[test]
    fn remote_error_prefers_structured_message() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted"}}"#;
        assert_eq!(
            remote_error_message(429, body),
            "Gemini request failed (429): Resource has been exhausted"
        );
        assert_eq!(
            remote_error_message(502, "Bad Gateway"),
            "Gemini request failed (502): Bad Gateway"
        );
    }

    #[test]
    fn endpoint_strips_models_prefix() -> anyhow::Result<()> {
        let provider = GeminiProvider::new(
            "https://example.test/v1beta/",
            "key",
            "models/gemini-2.5-flash-image-preview",
            "gemini-2.5-flash",
            None,
        )?;
        assert_eq!(
            provider.endpoint_for_model("models/gemini-2.5-flash-image-preview"),
            "https://example.test/v1beta/models/gemini-2.5-flash-image-preview:generateContent"
        );
        Ok(())
    }
}
