use axum::{extract::Extension, response::Json};
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

/// Postgres pool handle for runtime stats; `None` with in-memory storage.
#[derive(Clone, Debug, Default)]
pub struct DatabasePool(pub Option<PgPool>);

#[derive(ToSchema, Serialize, Debug, PartialEq, Eq)]
pub struct PoolStats {
    /// Open connections, idle or in use.
    size: u32,
    idle: usize,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct Vars {
    version: String,
    /// Tasks alive on the tokio runtime.
    tasks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<PoolStats>,
    /// Unix seconds.
    timestamp: i64,
}

fn pool_stats(pool: &PgPool) -> PoolStats {
    PoolStats {
        size: pool.size(),
        idle: pool.num_idle(),
    }
}

#[utoipa::path(
    get,
    path = "/debug/vars",
    responses(
        (status = 200, description = "Runtime metrics", body = Vars),
    ),
    tag = "health"
)]
pub async fn vars(Extension(pool): Extension<DatabasePool>) -> Json<Vars> {
    Json(Vars {
        version: env!("CARGO_PKG_VERSION").to_string(),
        tasks: tokio::runtime::Handle::current()
            .metrics()
            .num_alive_tasks(),
        database: pool.0.as_ref().map(pool_stats),
        timestamp: Utc::now().timestamp(),
    })
}
