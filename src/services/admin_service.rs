use tracing::info;

use crate::{
    config::QuestionSeed,
    dao::models::QuestionEntity,
    dto::admin::{QuestionView, SeedQuestionRequest},
    error::ServiceError,
    state::SharedState,
};

/// Add a question to the catalogue, or update the one with the same type and text.
pub async fn seed_question(
    state: &SharedState,
    request: SeedQuestionRequest,
) -> Result<QuestionView, ServiceError> {
    let store = state.require_store().await?;
    let question = QuestionEntity::from(QuestionSeed::from(request));
    store.save_question(question.clone()).await?;

    info!(
        question_id = %question.id,
        kind = question.kind.as_str(),
        active = question.active,
        "question saved"
    );
    Ok(question.into())
}
