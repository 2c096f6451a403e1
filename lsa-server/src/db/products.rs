//! Product lines and canonical merge groups

use lsa_common::{time, Error, Result};
use sqlx::{sqlite::SqliteRow, Executor, QueryBuilder, Row, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::reports::ReportFilter;
use super::{get_timestamp, get_uuid};
use crate::models::{MergeGroup, ProductLine, ProductLineInput};

const LINE_COLUMNS: &str = r#"
    p.id, p.report_id, p.position, p.name, p.canonical_group_id, p.price,
    p.product_clicks, p.add_to_cart, p.orders, p.items_sold, p.revenue, p.external_item_id
"#;

fn line_from_row(row: &SqliteRow) -> Result<ProductLine> {
    Ok(ProductLine {
        id: get_uuid(row, "id")?,
        report_id: get_uuid(row, "report_id")?,
        position: row.try_get("position")?,
        name: row.try_get("name")?,
        canonical_group_id: row.try_get("canonical_group_id")?,
        price: row.try_get("price")?,
        product_clicks: row.try_get("product_clicks")?,
        add_to_cart: row.try_get("add_to_cart")?,
        orders: row.try_get("orders")?,
        items_sold: row.try_get("items_sold")?,
        revenue: row.try_get("revenue")?,
        external_item_id: row.try_get("external_item_id")?,
    })
}

/// Replace every product line of a report with `lines`, in order
pub async fn replace_lines(
    conn: &mut SqliteConnection,
    report_id: Uuid,
    lines: &[ProductLineInput],
) -> Result<()> {
    sqlx::query("DELETE FROM product_lines WHERE report_id = ?")
        .bind(report_id.to_string())
        .execute(&mut *conn)
        .await?;

    for (position, line) in lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO product_lines (
                id, report_id, position, name, price, product_clicks, add_to_cart,
                orders, items_sold, revenue, external_item_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(report_id.to_string())
        .bind(position as i64)
        .bind(line.name.trim())
        .bind(line.price)
        .bind(line.product_clicks)
        .bind(line.add_to_cart)
        .bind(line.orders)
        .bind(line.items_sold)
        .bind(line.revenue)
        .bind(&line.external_item_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn list_for_report<'e, E>(executor: E, report_id: Uuid) -> Result<Vec<ProductLine>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM product_lines p WHERE p.report_id = ? ORDER BY p.position",
        LINE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(report_id.to_string())
        .fetch_all(executor)
        .await?;

    rows.iter().map(line_from_row).collect()
}

/// Lines of every matching report in first-seen order
///
/// Ordered by report date, report id, then position within the report.
pub async fn list_in_scope<'e, E>(executor: E, filter: &ReportFilter) -> Result<Vec<ProductLine>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM product_lines p JOIN live_reports r ON r.id = p.report_id",
        LINE_COLUMNS
    ));
    filter.push_where(&mut builder);
    builder.push(" ORDER BY r.report_date, r.id, p.position");

    let rows = builder.build().fetch_all(executor).await?;
    rows.iter().map(line_from_row).collect()
}

/// Set `canonical_group_id` on the given lines
pub async fn assign_group(conn: &mut SqliteConnection, group_id: &str, line_ids: &[Uuid]) -> Result<u64> {
    if line_ids.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE product_lines SET canonical_group_id = ");
    builder.push_bind(group_id);
    builder.push(" WHERE id IN (");
    let mut separated = builder.separated(", ");
    for id in line_ids {
        separated.push_bind(id.to_string());
    }
    separated.push_unseparated(")");

    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Clear `canonical_group_id` on the given lines
pub async fn clear_groups(conn: &mut SqliteConnection, line_ids: &[Uuid]) -> Result<u64> {
    if line_ids.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<Sqlite>::new(
        "UPDATE product_lines SET canonical_group_id = NULL WHERE canonical_group_id IS NOT NULL AND id IN (",
    );
    let mut separated = builder.separated(", ");
    for id in line_ids {
        separated.push_bind(id.to_string());
    }
    separated.push_unseparated(")");

    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

fn group_from_row(row: &SqliteRow) -> Result<MergeGroup> {
    let merged_names: String = row.try_get("merged_names")?;
    let merged_names: Vec<String> = serde_json::from_str(&merged_names)
        .map_err(|e| Error::Internal(format!("Failed to deserialize merged names: {}", e)))?;

    Ok(MergeGroup {
        id: row.try_get("id")?,
        owner_id: get_uuid(row, "owner_id")?,
        scope_key: row.try_get("scope_key")?,
        canonical_name: row.try_get("canonical_name")?,
        merged_names,
        member_count: row.try_get("member_count")?,
        created_at: get_timestamp(row, "created_at")?,
    })
}

/// Insert a merge group or refresh an existing one with the same id
///
/// The original `created_at` is kept on refresh.
pub async fn upsert_group(conn: &mut SqliteConnection, group: &MergeGroup) -> Result<()> {
    let merged_names = serde_json::to_string(&group.merged_names)
        .map_err(|e| Error::Internal(format!("Failed to serialize merged names: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO product_merge_groups (
            id, owner_id, scope_key, canonical_name, merged_names, member_count, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            canonical_name = excluded.canonical_name,
            merged_names = excluded.merged_names,
            member_count = excluded.member_count
        "#,
    )
    .bind(&group.id)
    .bind(group.owner_id.to_string())
    .bind(&group.scope_key)
    .bind(&group.canonical_name)
    .bind(merged_names)
    .bind(group.member_count)
    .bind(time::format_timestamp(group.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn list_groups<'e, E>(executor: E, owner_id: Uuid) -> Result<Vec<MergeGroup>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, owner_id, scope_key, canonical_name, merged_names, member_count, created_at
        FROM product_merge_groups
        WHERE owner_id = ?
        ORDER BY created_at, id
        "#,
    )
    .bind(owner_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter().map(group_from_row).collect()
}

/// Delete the owner's merge groups no product line references any more
/// Recount each group's member lines after lines were replaced or removed
pub async fn refresh_member_counts(conn: &mut SqliteConnection, owner_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE product_merge_groups
        SET member_count = (
            SELECT COUNT(*) FROM product_lines p WHERE p.canonical_group_id = product_merge_groups.id
        )
        WHERE owner_id = ?
        "#,
    )
    .bind(owner_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn prune_orphan_groups(conn: &mut SqliteConnection, owner_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM product_merge_groups
        WHERE owner_id = ?
          AND NOT EXISTS (
              SELECT 1 FROM product_lines p WHERE p.canonical_group_id = product_merge_groups.id
          )
        "#,
    )
    .bind(owner_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

