use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod admin;
/// Relationship status views.
pub mod couple;
/// Session payloads and history entries.
pub mod game;
/// Health check payloads.
pub mod health;
/// Invite and pairing payloads.
pub mod pairing;
/// Profile payloads.
pub mod profile;
/// Server-sent event envelopes and payloads.
pub mod sse;
pub mod validation;

/// RFC 3339 rendering of instants in responses.
pub fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Parse an RFC 3339 timestamp as produced by the responses of this API.
pub fn parse_system_time(raw: &str) -> Option<SystemTime> {
    OffsetDateTime::parse(raw, &Rfc3339).ok().map(Into::into)
}
