use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for PairPlay Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::profile::upsert_profile,
        crate::routes::profile::get_profile,
        crate::routes::invites::create_invite,
        crate::routes::invites::validate_code,
        crate::routes::invites::accept_invite,
        crate::routes::couple::get_couple,
        crate::routes::couple::couple_events,
        crate::routes::sessions::start_session,
        crate::routes::sessions::submit_answer,
        crate::routes::sessions::history,
        crate::routes::admin::seed_question,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::profile::UpsertProfileRequest,
            crate::dto::profile::ProfileView,
            crate::dto::pairing::CreateInviteResult,
            crate::dto::pairing::ValidateCodeResult,
            crate::dto::pairing::AcceptInviteRequest,
            crate::dto::pairing::AcceptInviteResult,
            crate::dto::couple::CoupleView,
            crate::dto::game::StartSessionRequest,
            crate::dto::game::StartSessionResult,
            crate::dto::game::SessionView,
            crate::dto::game::SubmitAnswerRequest,
            crate::dto::game::SubmitAnswerResult,
            crate::dto::game::HistoryAnswer,
            crate::dto::game::HistoryEntry,
            crate::dto::game::HistoryPage,
            crate::dto::admin::SeedQuestionRequest,
            crate::dto::admin::QuestionView,
            crate::dto::sse::Handshake,
            crate::dto::sse::CouplePairedEvent,
            crate::dto::sse::SessionStartedEvent,
            crate::dto::sse::SessionAnsweredEvent,
            crate::dto::sse::SessionCompletedEvent,
            crate::dao::models::GameKind,
            crate::state::game::RawAnswer,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "profiles", description = "Caller profile"),
        (name = "pairing", description = "Invite codes and pairing"),
        (name = "couples", description = "Relationship status"),
        (name = "sessions", description = "Mini-game sessions"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "admin", description = "Question catalogue management"),
    )
)]
pub struct ApiDoc;
