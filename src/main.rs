mod config;
mod db;
mod flow;
mod identity;
mod routes;
mod services;
mod state;
mod store;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let state = state::AppState::from_config(&config)
        .await
        .expect("backend init failed");

    let port = config.port;
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "farmgate listening");
    axum::serve(listener, app).await.expect("server failed");
}
