//! Runs the full bridge against a simulated broker and a real
//! MySQL/MariaDB database configured through `config/default` or the
//! environment (a `.env` file is honoured). A background task publishes a
//! synthetic sensor reading every couple of seconds; Ctrl-C drives the
//! coordinated shutdown sequence.

use std::{sync::Arc, time::Duration};

use mqtt2sql::{broker::mock::MockBroker, store::mysql::MySqlMessageStore, Bridge};
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = mqtt2sql::load_config().expect("invalid configuration");
    let store = Arc::new(MySqlMessageStore::from_settings(&settings.database));

    let (client, broker) = MockBroker::new();
    let bridge = Bridge::start(&settings, client, store);

    // simulated broker traffic
    tokio::spawn(async move {
        let mut reading = 0u64;
        loop {
            sleep(Duration::from_secs(2)).await;
            broker.publish("sensors/kitchen/temp", &format!("{}.5", 20 + reading % 5), 1, false);
            reading += 1;
        }
    });

    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    info!("interrupt received, shutting down");
    bridge.stop().await;
}
