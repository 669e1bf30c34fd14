//! Derives generation requests from an intake and the campaign goal.

use campaign_core::CampaignGoal;
use sha2::{Digest, Sha256};

use crate::error::{CreativeError, CreativeResult};
use crate::types::{GenerationParams, GenerationRequest, Intake};

/// Prompt used when the goal label is not one of the known goals.
pub const DEFAULT_PROMPT: &str =
    "Professional product advertisement, high quality, commercial photography";

/// Fixed prompt template for each campaign goal.
pub fn prompt_for(goal: CampaignGoal) -> &'static str {
    match goal {
        CampaignGoal::Awareness => {
            "Professional product advertisement, brand awareness, eye-catching, high quality, commercial photography, studio lighting"
        }
        CampaignGoal::Engagement => {
            "Engaging product showcase, interactive concept, lifestyle setting, natural environment, social media optimized"
        }
        CampaignGoal::Conversion => {
            "Product in use, compelling call-to-action, clear value proposition, commercial advertisement, conversion-focused"
        }
        CampaignGoal::Retention => {
            "Loyalty building, customer success story, product benefits showcase, long-term value, retention-focused"
        }
        CampaignGoal::Lead => {
            "Lead generation focused, information gathering, valuable offer presentation, B2B oriented, professional"
        }
    }
}

/// Resolve a goal label to its prompt. Absent or blank labels use the
/// awareness template; unrecognised labels use [`DEFAULT_PROMPT`].
pub fn prompt_for_label(goal: Option<&str>) -> &'static str {
    match goal.map(str::trim).filter(|label| !label.is_empty()) {
        None => prompt_for(CampaignGoal::Awareness),
        Some(label) => CampaignGoal::parse(label)
            .map(prompt_for)
            .unwrap_or(DEFAULT_PROMPT),
    }
}

/// Build the request for one generation job. Pure: identical inputs give
/// equal requests.
pub fn build_request(
    intake: &Intake,
    goal: Option<&str>,
    params: GenerationParams,
) -> CreativeResult<GenerationRequest> {
    if params.variant_count == 0 {
        return Err(CreativeError::InvalidRequest(
            "variant count must be positive".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&params.strength) {
        return Err(CreativeError::InvalidRequest(format!(
            "strength {} is outside [0, 1]",
            params.strength
        )));
    }

    Ok(GenerationRequest {
        source_image: intake.encoded_payload().to_string(),
        prompt: prompt_for_label(goal).to_string(),
        variant_count: params.variant_count,
        strength: params.strength,
    })
}

impl GenerationRequest {
    /// Hex SHA-256 over every request field.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.prompt.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.variant_count.to_be_bytes());
        hasher.update(self.strength.to_bits().to_be_bytes());
        hasher.update(self.source_image.as_bytes());
        hex::encode(hasher.finalize())
    }
}
