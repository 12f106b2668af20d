/// Serde helpers for civil dates.
pub mod calendar_date;
/// Transactional storage of invites, profiles, couples and sessions.
pub mod couple_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
