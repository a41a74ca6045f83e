use sqlx::PgPool;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Conditional decrement: only succeeds when enough stock is on hand, so
/// concurrent sales of the same product cannot drive the level negative.
pub(crate) const DECREMENT_STOCK_SQL: &str =
    "UPDATE spare_parts SET stock_quantity = stock_quantity - $2 WHERE id = $1 AND stock_quantity >= $2 RETURNING stock_quantity";

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },
    #[error("unknown product {0}")]
    UnknownProduct(Uuid),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Atomically reserves and decrements stock for one product. Returns the
/// remaining level. Insufficient stock leaves the row untouched.
pub async fn decrement_stock(pool: &PgPool, spare_part_id: Uuid, quantity: i32) -> Result<i32, InventoryError> {
    let remaining = sqlx::query_scalar::<_, i32>(DECREMENT_STOCK_SQL)
        .bind(spare_part_id)
        .bind(quantity)
        .fetch_optional(pool)
        .await?;

    match remaining {
        Some(level) => Ok(level),
        None => {
            let available = sqlx::query_scalar::<_, i32>("SELECT stock_quantity FROM spare_parts WHERE id = $1")
                .bind(spare_part_id)
                .fetch_optional(pool)
                .await?;
            match available {
                Some(available) => Err(InventoryError::InsufficientStock { requested: quantity, available }),
                None => Err(InventoryError::UnknownProduct(spare_part_id)),
            }
        }
    }
}

/// Settlement-path decrement. When the conditional update itself errors at
/// the database layer it falls back to a read-then-write decrement — an
/// inherited race window, so it is loudly logged and never treated as the
/// normal path. Insufficient stock is NOT retried through the fallback.
pub async fn decrement_stock_best_effort(
    pool: &PgPool,
    spare_part_id: Uuid,
    quantity: i32,
) -> Result<i32, InventoryError> {
    match decrement_stock(pool, spare_part_id, quantity).await {
        Err(InventoryError::Db(err)) => {
            warn!(
                spare_part_id = %spare_part_id,
                error = %err,
                "conditional stock decrement failed; falling back to read-then-write"
            );
            let current = sqlx::query_scalar::<_, i32>("SELECT stock_quantity FROM spare_parts WHERE id = $1")
                .bind(spare_part_id)
                .fetch_optional(pool)
                .await?
                .ok_or(InventoryError::UnknownProduct(spare_part_id))?;
            let new_level = (current - quantity).max(0);
            if current - quantity < 0 {
                warn!(
                    spare_part_id = %spare_part_id,
                    current,
                    quantity,
                    "fallback decrement clamped stock at zero"
                );
            }
            sqlx::query("UPDATE spare_parts SET stock_quantity = $2 WHERE id = $1")
                .bind(spare_part_id)
                .bind(new_level)
                .execute(pool)
                .await?;
            Ok(new_level)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrement_is_a_single_guarded_statement() {
        // The guard and the write must live in one statement for the
        // no-negative-stock invariant to hold under concurrency.
        assert!(DECREMENT_STOCK_SQL.contains("stock_quantity >= $2"));
        assert!(DECREMENT_STOCK_SQL.contains("RETURNING stock_quantity"));
    }
}
