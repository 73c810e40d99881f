use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use shoprec_db::{migrations, DbPool};
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

impl HealthCheck {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: "ready", detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: "degraded", detail: detail.into() }
    }

    fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}

/// `/health` payload. The service is ready only when the database answers and its schema is
/// current; an empty catalog is reported but does not degrade readiness, since fallback then
/// serves an empty list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub schema: HealthCheck,
    pub catalog: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let (schema, catalog) = if database.is_ready() {
        (schema_check(&state.db_pool).await, catalog_check(&state.db_pool).await)
    } else {
        let skipped = "skipped: database unreachable";
        (HealthCheck::degraded(skipped), HealthCheck::degraded(skipped))
    };
    let ready = database.is_ready() && schema.is_ready();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        schema,
        catalog,
        checked_at: Utc::now().to_rfc3339(),
    };

    if !ready {
        warn!(
            event_name = "system.health.degraded",
            correlation_id = "health",
            database = %payload.database.detail,
            schema = %payload.schema.detail,
            "health check reports degraded storage"
        );
    }

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck::ready("database query succeeded"),
        Err(error) => HealthCheck::degraded(format!("database query failed: {error}")),
    }
}

async fn schema_check(pool: &DbPool) -> HealthCheck {
    match migrations::pending_count(pool).await {
        Ok(0) => HealthCheck::ready("all migrations applied"),
        Ok(pending) => HealthCheck::degraded(format!("{pending} migration(s) pending")),
        Err(error) => HealthCheck::degraded(format!("migration status unavailable: {error}")),
    }
}

async fn catalog_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM product WHERE active = 1")
        .fetch_one(pool)
        .await
    {
        Ok(0) => HealthCheck::ready("no active products; fallback lists will be empty"),
        Ok(count) => HealthCheck::ready(format!("{count} active products")),
        Err(error) => HealthCheck::degraded(format!("catalog query failed: {error}")),
    }
}
