//! Ledger of processed Stripe events.
//!
//! Stripe delivers events at least once. An event ID is recorded in the same
//! transaction as its side effects, so a redelivery either finds the row and
//! is skipped or races the first delivery and loses on the primary key.

use sqlx::PgConnection;

use super::RepositoryError;

/// Record an event. Returns `false` if it was already recorded.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn record(
    conn: &mut PgConnection,
    event_id: &str,
    event_type: &str,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        INSERT INTO stripe_events (id, event_type)
        VALUES ($1, $2)
        ON CONFLICT (id) DO NOTHING
        ",
    )
    .bind(event_id)
    .bind(event_type)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
