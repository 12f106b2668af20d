//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    config::QuestionSeed,
    dao::models::{GameKind, QuestionEntity},
    services::question_source,
};

/// Question to add to, or update in, the catalogue.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[validate(schema(function = "validate_choices_match_kind"))]
pub struct SeedQuestionRequest {
    /// Prompt, at most 280 characters.
    #[validate(length(min = 1, max = 280))]
    pub text: String,
    /// Game type, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: GameKind,
    /// Exactly two options for choice games, none for `daily`.
    #[serde(default)]
    pub choices: Option<[String; 2]>,
    /// Relative selection weight between 1 and 100.
    #[serde(default = "default_weight")]
    #[validate(range(min = 1, max = 100))]
    pub weight: u32,
    /// Whether the question can be served.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_weight() -> u32 {
    1
}

fn default_active() -> bool {
    true
}

fn validate_choices_match_kind(request: &SeedQuestionRequest) -> Result<(), ValidationError> {
    match question_source::choices_problem(request.kind, request.choices.as_ref()) {
        None => Ok(()),
        Some(problem) => {
            let mut err = ValidationError::new("choices_kind_mismatch");
            err.message = Some(problem.into());
            Err(err)
        }
    }
}

impl From<SeedQuestionRequest> for QuestionSeed {
    fn from(value: SeedQuestionRequest) -> Self {
        Self {
            text: value.text,
            kind: value.kind,
            choices: value.choices,
            weight: value.weight,
            active: value.active,
        }
    }
}

/// Stored question.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionView {
    /// Content-derived question id.
    pub id: Uuid,
    /// Prompt.
    pub text: String,
    /// Game type, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: GameKind,
    /// The two options of choice games.
    pub choices: Option<[String; 2]>,
    /// Whether the question can be served.
    pub active: bool,
    /// Relative selection weight.
    pub selection_weight: u32,
}

impl From<QuestionEntity> for QuestionView {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            text: value.text,
            kind: value.kind,
            choices: value.choices,
            active: value.active,
            selection_weight: value.selection_weight,
        }
    }
}
