use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::post,
};
use axum_valid::Valid;

use crate::{
    config::AppConfig,
    dto::admin::{QuestionView, SeedQuestionRequest},
    error::AppError,
    services::admin_service,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Catalogue management, guarded by the configured admin token.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/questions", post(seed_question))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Add or update a question of the catalogue.
#[utoipa::path(
    post,
    path = "/admin/questions",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token from the configuration")),
    request_body = SeedQuestionRequest,
    responses(
        (status = 200, description = "Question stored", body = QuestionView),
        (status = 400, description = "Choices do not fit the game type"),
        (status = 401, description = "Missing or wrong admin token")
    )
)]
pub async fn seed_question(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SeedQuestionRequest>>,
) -> Result<Json<QuestionView>, AppError> {
    Ok(Json(admin_service::seed_question(&state, payload).await?))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    check_admin_token(state.config(), provided)?;
    Ok(next.run(req).await)
}

fn check_admin_token(config: &AppConfig, provided: Option<&str>) -> Result<(), AppError> {
    let Some(expected) = config.admin_token() else {
        return Err(AppError::Unauthorized(
            "admin routes are disabled without a configured token".into(),
        ));
    };
    match provided {
        Some(token) if token == expected => Ok(()),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized(
            "missing admin token header `X-Admin-Token`".into(),
        )),
    }
}
