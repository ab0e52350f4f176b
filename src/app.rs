use std::net::SocketAddr;

use axum::{body::Body, http::Request, routing::get, Router};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::{info, info_span, Level, Span};

use crate::state::AppState;
use crate::{answers, auth, questionnaires, users};

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(questionnaires::router())
        .merge(answers::router())
        .route("/health", get(|| async { "ok" }));

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                )
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}

fn request_span(req: &Request<Body>) -> Span {
    info_span!("request", method = %req.method(), path = req.uri().path())
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "questionnaires api listening");
    axum::serve(listener, app).await?;
    Ok(())
}
