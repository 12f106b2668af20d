/// Question catalogue management.
pub mod admin_service;
/// Relationship status.
pub mod couple_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Game sessions: start, answer, history.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Invite code generation and normalisation.
pub mod invite_code;
/// Invite issuing, pre-check and acceptance.
pub mod pairing_service;
/// Caller profiles.
pub mod profile_service;
/// Question selection and seeding.
pub mod question_source;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events subscription service.
pub mod sse_service;
/// Storage connection supervisor.
pub mod storage_supervisor;
