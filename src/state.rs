use sqlx::PgPool;

use opsdesk_config::{CorsConfig, JwtConfig, LoggingConfig, SessionConfig};
use opsdesk_db::init_db_pool;

#[derive(Clone, Debug)]
pub struct AppState {
    pub db: PgPool,
    pub jwt_config: JwtConfig,
    pub session_config: SessionConfig,
    pub cors_config: CorsConfig,
    pub logging_config: LoggingConfig,
}

pub async fn init_app_state() -> anyhow::Result<AppState> {
    Ok(AppState {
        db: init_db_pool().await?,
        jwt_config: JwtConfig::from_env(),
        session_config: SessionConfig::from_env(),
        cors_config: CorsConfig::from_env(),
        logging_config: LoggingConfig::from_env(),
    })
}
