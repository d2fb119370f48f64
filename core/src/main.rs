mod repl;

use std::sync::Arc;

use common::env_config::Config;
use identity::client::{IdentityService, RestIdentityClient};
use identity::controller::SessionController;
use store::client::{RecordStore, RestStoreClient};
use url::Url;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // get env vars
    let config = Config::from_env();

    // init logger
    if config.console_logging_enabled {
        logger::setup().expect("Failed to set up logger");
    }

    // a recovery callback URL pasted from the reset email, if any
    let launch = std::env::args().nth(1).and_then(|arg| Url::parse(&arg).ok());

    // degraded mode: without the service values the marketing shell still
    // runs, but every remote operation stays disabled
    let service = match config.service() {
        Ok(service) => service.clone(),
        Err(err) => {
            repl::run_degraded(&err.to_notice("Login and portal are disabled"));
            return Ok(());
        }
    };

    let identity_client = Arc::new(
        RestIdentityClient::new(&service, config.session_cache_path.clone())
            .expect("Failed to set up identity client"),
    );
    let store_client: Arc<dyn RecordStore> = Arc::new(
        RestStoreClient::new(&service, identity_client.clone())
            .expect("Failed to set up record store client"),
    );
    let identity_service: Arc<dyn IdentityService> = identity_client;

    let session = SessionController::start(
        identity_service,
        store_client.clone(),
        config.auth_callback_url.clone(),
        launch,
    )
    .await;

    repl::run(config, session, store_client).await
}
