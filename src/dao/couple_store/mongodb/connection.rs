use std::time::Duration;

use mongodb::{
    Client, Database,
    bson::{Document, doc},
    options::ClientOptions,
};
use tokio::time::sleep;
use tracing::{debug, info};

use super::error::{MongoDaoError, MongoResult};

/// `hello` attempts before giving the failure back to the storage supervisor.
const HANDSHAKE_ATTEMPTS: u32 = 10;
const FIRST_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Shape of the deployment as reported by `hello`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Deployment {
    ReplicaSet(String),
    Router,
    Standalone,
}

impl Deployment {
    fn from_hello(reply: &Document) -> Self {
        if let Ok(name) = reply.get_str("setName") {
            return Deployment::ReplicaSet(name.to_owned());
        }
        if matches!(reply.get_str("msg"), Ok("isdbgrid")) {
            return Deployment::Router;
        }
        Deployment::Standalone
    }

    fn runs_transactions(&self) -> bool {
        !matches!(self, Deployment::Standalone)
    }
}

/// Build a client, wait for the server's `hello` and refuse deployments without transactions.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let deployment = Deployment::from_hello(&handshake(&database).await?);
    if !deployment.runs_transactions() {
        return Err(MongoDaoError::TransactionsUnsupported {
            database: database_name.to_owned(),
        });
    }
    info!(?deployment, database = database_name, "connected to MongoDB");

    Ok((client, database))
}

async fn handshake(database: &Database) -> MongoResult<Document> {
    let mut attempts = 0;
    let mut backoff = FIRST_BACKOFF;

    loop {
        match database.run_command(doc! { "hello": 1 }).await {
            Ok(reply) => return Ok(reply),
            Err(source) => {
                attempts += 1;
                if attempts >= HANDSHAKE_ATTEMPTS {
                    return Err(MongoDaoError::Handshake { attempts, source });
                }
                debug!(attempts, error = %source, "MongoDB not reachable yet");
                sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replica_set_members_and_routers_run_transactions() {
        let member = Deployment::from_hello(&doc! { "isWritablePrimary": true, "setName": "rs0" });
        assert_eq!(member, Deployment::ReplicaSet("rs0".into()));
        assert!(member.runs_transactions());

        let router = Deployment::from_hello(&doc! { "isWritablePrimary": true, "msg": "isdbgrid" });
        assert_eq!(router, Deployment::Router);
        assert!(router.runs_transactions());
    }

    #[test]
    fn standalone_servers_are_refused() {
        let standalone = Deployment::from_hello(&doc! { "isWritablePrimary": true, "ok": 1.0 });
        assert_eq!(standalone, Deployment::Standalone);
        assert!(!standalone.runs_transactions());
    }
}
