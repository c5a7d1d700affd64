//! Authorized, ownership-scoped record writes
//!
//! The single most important invariant in the system lives here: a write is
//! first checked against the closed resource allowlist, then has its
//! `user_id` field unconditionally overwritten with the authenticated
//! caller's identity. No resource in the allowlist has an exception path,
//! and the persistence layer is never reached for a disallowed resource.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use common::error::AuthError;

use crate::verifier::AuthorizationContext;

/// Collections eligible for authenticated insertion
///
/// Closed at compile time; not extensible at runtime.
pub const ALLOWED_RESOURCES: [&str; 4] = [
    "journal_entries",
    "mood_checkins",
    "assessment_results",
    "nudge_feedback",
];

/// Map a resource name to its backing table
///
/// Resource names double as table names. Only allowlist members resolve, and
/// the returned str is the static allowlist entry, so no caller-supplied
/// string ever reaches SQL.
fn table_for(resource: &str) -> Option<&'static str> {
    ALLOWED_RESOURCES
        .iter()
        .copied()
        .find(|name| *name == resource)
}

/// Persistence seam for record inserts
#[allow(async_fn_in_trait)]
pub trait RecordStore {
    /// Insert `record` into the backing table for `resource` and return the
    /// full persisted row including generated fields
    async fn insert(&self, table: &'static str, record: &Map<String, Value>)
    -> Result<Value, AuthError>;
}

/// Authorize and perform a write on behalf of `ctx`
///
/// The caller-supplied `user_id` value, if any, is discarded: callers can
/// never write data as another user regardless of the payload they send.
pub async fn authorized_write<S: RecordStore>(
    store: &S,
    ctx: &AuthorizationContext,
    resource: &str,
    mut record: Map<String, Value>,
) -> Result<Value, AuthError> {
    let Some(table) = table_for(resource) else {
        warn!(
            user_id = %ctx.user_id,
            resource = %resource,
            "rejected write to disallowed resource"
        );
        return Err(AuthError::ResourceNotAllowed(resource.to_string()));
    };

    record.insert("user_id".to_string(), Value::String(ctx.user_id.clone()));

    store.insert(table, &record).await
}

/// PostgreSQL-backed record store
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    /// Create a new record store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RecordStore for PgRecordStore {
    async fn insert(
        &self,
        table: &'static str,
        record: &Map<String, Value>,
    ) -> Result<Value, AuthError> {
        let user_id = record
            .get("user_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let payload = Value::Object(record.clone());

        // `table` is one of the four static allowlist names, never
        // caller-derived, so interpolating it is safe.
        let query = format!(
            r#"
            INSERT INTO {table} (user_id, payload)
            VALUES ($1, $2)
            RETURNING id, user_id, payload, created_at
            "#
        );

        let row = sqlx::query(&query)
            .bind(&user_id)
            .bind(&payload)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AuthError::WriteFailed(e.to_string()))?;

        let id: Uuid = row.get("id");
        let created_at: DateTime<Utc> = row.get("created_at");
        let stored: Value = row.get("payload");

        let mut persisted = match stored {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("payload".to_string(), other);
                map
            }
        };
        persisted.insert("id".to_string(), Value::String(id.to_string()));
        persisted.insert("user_id".to_string(), Value::String(user_id));
        persisted.insert(
            "created_at".to_string(),
            Value::String(created_at.to_rfc3339()),
        );

        Ok(Value::Object(persisted))
    }
}
