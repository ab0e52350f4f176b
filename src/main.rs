use std::sync::Arc;

mod answers;
mod app;
mod auth;
mod config;
mod db;
mod error;
mod extract;
mod filters;
mod questionnaires;
mod state;
#[cfg(test)]
mod testing;
mod users;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{config::AppConfig, state::AppState};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("questionnaires=debug,tower_http=info,info"));
    let fmt = tracing_subscriber::fmt().with_env_filter(filter);
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => fmt.json().with_current_span(true).init(),
        _ => fmt.compact().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Arc::new(AppConfig::from_env()?);
    let addr = config.listen_addr()?;
    let db = db::connect(&config).await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    info!("migrations applied");

    let state = AppState::from_pool(db, config);
    app::serve(app::build_app(state), addr).await
}
