mod config;
mod connection;
mod error;
mod models;
/// Store and transaction implementations.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoCoupleStore;
