use std::sync::Arc;

use quiz_live_server::api;
use quiz_live_server::backend::{self, ResultQueue};
use quiz_live_server::config::Config;
use quiz_live_server::game::GameServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = Config::from_env();

    let (quizzes, sink) = match backend::init_from_config(&config.backend).await {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize backend");
            std::process::exit(1);
        }
    };

    let server = GameServer::new(config.game.clone(), quizzes, ResultQueue::new(sink));
    let routes = api::routes(Arc::clone(&server));

    let address = config.bind_address();
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Quiz live server listening"
    );

    warp::serve(routes).run(address).await;
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
