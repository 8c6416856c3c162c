//! Bulk writes: one statement per flush batch rather than one round trip
//! per dirty order. `unnest` turns the column-of-vectors shape the
//! in-memory batch already has into a set of rows the `ON CONFLICT`
//! clause can upsert in a single pass.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::schema::{OrderRow, PositionRow, TransitionRow};

/// Upsert a batch of orders keyed by `id`. Writes every column named in
/// the batch; the caller is expected to have already restricted the
/// batch to dirty orders.
pub async fn bulk_upsert_orders(pool: &PgPool, rows: &[OrderRow]) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
    let user_ids: Vec<_> = rows.iter().map(|r| r.user_id.clone()).collect();
    let strategy_ids: Vec<_> = rows.iter().map(|r| r.strategy_id.clone()).collect();
    let symbols: Vec<_> = rows.iter().map(|r| r.symbol.clone()).collect();
    let sides: Vec<_> = rows.iter().map(|r| r.side.clone()).collect();
    let order_types: Vec<_> = rows.iter().map(|r| r.order_type.clone()).collect();
    let product_types: Vec<_> = rows.iter().map(|r| r.product_type.clone()).collect();
    let qtys: Vec<_> = rows.iter().map(|r| r.qty).collect();
    let prices: Vec<_> = rows.iter().map(|r| r.price).collect();
    let filled_qtys: Vec<_> = rows.iter().map(|r| r.filled_qty).collect();
    let filled_prices: Vec<_> = rows.iter().map(|r| r.filled_price).collect();
    let statuses: Vec<_> = rows.iter().map(|r| r.status.clone()).collect();
    let broker_order_ids: Vec<_> = rows.iter().map(|r| r.broker_order_id.clone()).collect();
    let errors: Vec<_> = rows.iter().map(|r| r.error.clone()).collect();
    let retry_counts: Vec<_> = rows.iter().map(|r| r.retry_count).collect();
    let created_ats: Vec<_> = rows.iter().map(|r| r.created_at).collect();
    let updated_ats: Vec<_> = rows.iter().map(|r| r.updated_at).collect();
    let metadata: Vec<_> = rows.iter().map(|r| r.metadata_json.clone()).collect();

    let result = sqlx::query(
        r#"
        insert into orders (
            id, user_id, strategy_id, symbol, side, order_type, product_type,
            qty, price, filled_qty, filled_price, status, broker_order_id,
            error, retry_count, created_at, updated_at, metadata_json
        )
        select * from unnest(
            $1::uuid[], $2::text[], $3::text[], $4::text[], $5::text[], $6::text[], $7::text[],
            $8::bigint[], $9::bigint[], $10::bigint[], $11::bigint[], $12::text[], $13::text[],
            $14::text[], $15::integer[], $16::bigint[], $17::bigint[], $18::bytea[]
        )
        on conflict (id) do update set
            status = excluded.status,
            filled_qty = excluded.filled_qty,
            filled_price = excluded.filled_price,
            broker_order_id = excluded.broker_order_id,
            error = excluded.error,
            retry_count = excluded.retry_count,
            updated_at = excluded.updated_at,
            metadata_json = excluded.metadata_json
        "#,
    )
    .bind(ids)
    .bind(user_ids)
    .bind(strategy_ids)
    .bind(symbols)
    .bind(sides)
    .bind(order_types)
    .bind(product_types)
    .bind(qtys)
    .bind(prices)
    .bind(filled_qtys)
    .bind(filled_prices)
    .bind(statuses)
    .bind(broker_order_ids)
    .bind(errors)
    .bind(retry_counts)
    .bind(created_ats)
    .bind(updated_ats)
    .bind(metadata)
    .execute(pool)
    .await
    .context("bulk_upsert_orders failed")?;

    Ok(result.rows_affected())
}

/// Append-only insert of transition-log rows, in the order supplied.
pub async fn bulk_insert_transitions(pool: &PgPool, rows: &[TransitionRow]) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut affected = 0u64;
    for row in rows {
        sqlx::query(
            r#"
            insert into order_transitions (order_id, from_state, to_state, reason, actor, ts)
            values ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(row.order_id)
        .bind(&row.from_state)
        .bind(&row.to_state)
        .bind(&row.reason)
        .bind(&row.actor)
        .bind(row.ts)
        .execute(pool)
        .await
        .context("bulk_insert_transitions failed")?;
        affected += 1;
    }
    Ok(affected)
}

/// Upsert a batch of positions keyed by `(user_id, symbol)`.
pub async fn bulk_upsert_positions(pool: &PgPool, rows: &[PositionRow]) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let user_ids: Vec<_> = rows.iter().map(|r| r.user_id.clone()).collect();
    let symbols: Vec<_> = rows.iter().map(|r| r.symbol.clone()).collect();
    let qtys: Vec<_> = rows.iter().map(|r| r.qty).collect();
    let avg_prices: Vec<_> = rows.iter().map(|r| r.avg_price).collect();
    let realized: Vec<_> = rows.iter().map(|r| r.realized_pnl).collect();
    let unrealized: Vec<_> = rows.iter().map(|r| r.unrealized_pnl).collect();
    let statuses: Vec<_> = rows.iter().map(|r| r.status.clone()).collect();
    let opened_ats: Vec<_> = rows.iter().map(|r| r.opened_at).collect();
    let closed_ats: Vec<_> = rows.iter().map(|r| r.closed_at).collect();

    let result = sqlx::query(
        r#"
        insert into positions (
            user_id, symbol, qty, avg_price, realized_pnl, unrealized_pnl, status, opened_at, closed_at
        )
        select * from unnest(
            $1::text[], $2::text[], $3::bigint[], $4::bigint[], $5::bigint[], $6::bigint[],
            $7::text[], $8::bigint[], $9::bigint[]
        )
        on conflict (user_id, symbol) do update set
            qty = excluded.qty,
            avg_price = excluded.avg_price,
            realized_pnl = excluded.realized_pnl,
            unrealized_pnl = excluded.unrealized_pnl,
            status = excluded.status,
            closed_at = excluded.closed_at
        "#,
    )
    .bind(user_ids)
    .bind(symbols)
    .bind(qtys)
    .bind(avg_prices)
    .bind(realized)
    .bind(unrealized)
    .bind(statuses)
    .bind(opened_ats)
    .bind(closed_ats)
    .execute(pool)
    .await
    .context("bulk_upsert_positions failed")?;

    Ok(result.rows_affected())
}
