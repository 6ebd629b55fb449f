use brandkit_contracts::events::EventWriter;
use brandkit_contracts::jobs::avatar_persona_prompt;
use serde_json::json;

use crate::error::StudioError;
use crate::map_object;
use crate::media::EncodedPayload;
use crate::providers::{GenerativeService, Modality, ServiceRequest};

/// Asks the service for a one-line brand persona. Best effort: any failure is
/// logged as `avatar_step_failed` and reported as `None`.
pub fn describe_avatar(
    service: &dyn GenerativeService,
    image: &EncodedPayload,
    product: &str,
    events: &EventWriter,
) -> Option<String> {
    let prompt = avatar_persona_prompt(product.trim());
    let request = ServiceRequest {
        image,
        prompt_text: &prompt,
        response_modalities: &[Modality::Text],
    };
    let outcome = match service.generate(&request) {
        Ok(response) => {
            let text = response.text();
            if text.is_empty() {
                Err(StudioError::AvatarStep(
                    "response carried no text".to_string(),
                ))
            } else {
                Ok(text)
            }
        }
        Err(err) => Err(StudioError::AvatarStep(format!("{err:#}"))),
    };

    match outcome {
        Ok(description) => {
            events.record(
                "avatar_step_succeeded",
                map_object(json!({
                    "provider": service.name(),
                    "description": description,
                })),
            );
            Some(description)
        }
        Err(err) => {
            events.record(
                "avatar_step_failed",
                map_object(json!({
                    "provider": service.name(),
                    "error": err.to_string(),
                })),
            );
            None
        }
    }
}
