use civic_registry::{app, error::init_error_details, state::AppState, users};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "civic_registry=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;
    init_error_details(!app_state.config.environment.is_production());
    if app_state.config.password_pepper.is_none() {
        tracing::warn!("PASSWORD_PEPPER is not set; logins and account changes will fail");
    }

    sqlx::migrate!("./migrations").run(&app_state.db).await?;

    if let Some(admin) = &app_state.config.bootstrap_admin {
        users::services::ensure_bootstrap_admin(
            &app_state.db,
            app_state.pepper(),
            &admin.username,
            &admin.password,
        )
        .await?;
    }

    app::serve(app::build_app(app_state)).await
}
