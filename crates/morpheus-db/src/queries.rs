//! One function per query the rest of Morpheus needs. No generic query
//! builder: the teacher favors small, explicit, named functions over an ORM
//! layer, so this module does too.

use crate::error::DbError;
use crate::model::{AggregationRow, Company, Event, Link, Message, MessageGroup};
use chrono::{DateTime, Utc};
use morpheus_types::{MessageStatus, Method};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};

/// Inserts `code` if absent, returning the existing or new row. Backs the
/// admission algorithm's "get-or-create Company by company_code" step
/// (spec.md §4.8).
pub async fn get_or_create_company(pool: &PgPool, code: &str) -> Result<Company, DbError> {
    let row = sqlx::query_as::<_, Company>(
        r#"
        INSERT INTO companies (code) VALUES ($1)
        ON CONFLICT (code) DO UPDATE SET code = EXCLUDED.code
        RETURNING id, code
        "#,
    )
    .bind(code)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn find_company_by_code(pool: &PgPool, code: &str) -> Result<Option<Company>, DbError> {
    let row = sqlx::query_as::<_, Company>("SELECT id, code FROM companies WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn insert_message_group(
    pool: &PgPool,
    uuid: &str,
    company_id: i64,
    method: Method,
    from_email: Option<&str>,
    from_name: Option<&str>,
) -> Result<MessageGroup, DbError> {
    let row = sqlx::query_as::<_, MessageGroup>(
        r#"
        INSERT INTO message_groups (uuid, company_id, method, from_email, from_name)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, uuid, company_id, method, created_ts, from_email, from_name
        "#,
    )
    .bind(uuid)
    .bind(company_id)
    .bind(method.to_string())
    .bind(from_email)
    .bind(from_name)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Sum of `cost` for the company/method in the current calendar month
/// (admission algorithm step 4 and the Query API's month-to-date `spend`).
pub async fn sms_month_to_date_spend(
    pool: &PgPool,
    company_id: i64,
    method: Method,
) -> Result<f64, DbError> {
    let spend: Option<f64> = sqlx::query_scalar(
        r#"
        SELECT sum(cost) FROM messages
         WHERE company_id = $1 AND method = $2
           AND send_ts >= date_trunc('month', now())
        "#,
    )
    .bind(company_id)
    .bind(method.to_string())
    .fetch_one(pool)
    .await?;
    Ok(spend.unwrap_or(0.0))
}

/// Sum of `cost` for a company/method over an explicit `[start, end]`
/// window, for `GET /billing/{method}/{company_code}/` (spec.md §4.8).
pub async fn billing_total(
    pool: &PgPool,
    company_id: i64,
    method: Method,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<f64, DbError> {
    let spend: Option<f64> = sqlx::query_scalar(
        "SELECT sum(cost) FROM messages WHERE company_id = $1 AND method = $2 AND send_ts >= $3 AND send_ts <= $4",
    )
    .bind(company_id)
    .bind(method.to_string())
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;
    Ok(spend.unwrap_or(0.0))
}

/// Deletes every company whose code starts with `code_prefix`, along with
/// their messages and message groups (spec.md §6 "delete-subaccount":
/// the original implementation matches branch companies by code prefix,
/// e.g. multi-region `acme-uk`/`acme-us` under `acme`). Returns
/// `(messages_deleted, groups_deleted)`.
pub async fn delete_company_branches(pool: &PgPool, code_prefix: &str) -> Result<(i64, i64), DbError> {
    let mut tx: Transaction<'_, Postgres> = pool.begin().await?;
    let pattern = format!("{code_prefix}%");

    let m_count = sqlx::query(
        "DELETE FROM messages WHERE company_id IN (SELECT id FROM companies WHERE code LIKE $1)",
    )
    .bind(&pattern)
    .execute(&mut *tx)
    .await?
    .rows_affected() as i64;

    let g_count = sqlx::query(
        "DELETE FROM message_groups WHERE company_id IN (SELECT id FROM companies WHERE code LIKE $1)",
    )
    .bind(&pattern)
    .execute(&mut *tx)
    .await?
    .rows_affected() as i64;

    sqlx::query("DELETE FROM companies WHERE code LIKE $1").bind(&pattern).execute(&mut *tx).await?;

    tx.commit().await?;
    Ok((m_count, g_count))
}

pub struct NewMessage<'a> {
    pub external_id: Option<&'a str>,
    pub group_id: i64,
    pub company_id: i64,
    pub method: Method,
    pub status: MessageStatus,
    pub to_first_name: Option<&'a str>,
    pub to_last_name: Option<&'a str>,
    pub to_user_link: Option<&'a str>,
    pub to_address: &'a str,
    pub tags: &'a [String],
    pub subject: Option<&'a str>,
    pub body: Option<&'a str>,
    pub attachments: &'a [String],
    pub cost: Option<f64>,
    pub extra: Value,
}

/// Inserts one Message plus its shortened-link rows in a single transaction
/// (spec.md §4.9 step 7: "Inserting the Message also inserts one Link row
/// per shortened URL").
pub async fn insert_message_with_links(
    pool: &PgPool,
    m: NewMessage<'_>,
    links: &[(String, String)],
) -> Result<Message, DbError> {
    let mut tx: Transaction<'_, Postgres> = pool.begin().await?;

    let row = sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages
            (external_id, group_id, company_id, method, status,
             to_first_name, to_last_name, to_user_link, to_address,
             tags, subject, body, attachments, cost, extra)
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
        RETURNING id, external_id, group_id, company_id, method, send_ts, update_ts,
                  status, to_first_name, to_last_name, to_user_link, to_address,
                  tags, subject, body, attachments, cost, extra
        "#,
    )
    .bind(m.external_id)
    .bind(m.group_id)
    .bind(m.company_id)
    .bind(m.method.to_string())
    .bind(m.status.to_string())
    .bind(m.to_first_name)
    .bind(m.to_last_name)
    .bind(m.to_user_link)
    .bind(m.to_address)
    .bind(m.tags)
    .bind(m.subject)
    .bind(m.body)
    .bind(m.attachments)
    .bind(m.cost)
    .bind(m.extra)
    .fetch_one(&mut *tx)
    .await?;

    for (url, token) in links {
        sqlx::query("INSERT INTO links (message_id, token, url) VALUES ($1, $2, $3)")
            .bind(row.id)
            .bind(token)
            .bind(url)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(row)
}

pub async fn get_message_group(pool: &PgPool, id: i64) -> Result<MessageGroup, DbError> {
    sqlx::query_as::<_, MessageGroup>(
        "SELECT id, uuid, company_id, method, created_ts, from_email, from_name FROM message_groups WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

pub async fn find_message_by_external_id(
    pool: &PgPool,
    method: Method,
    external_id: &str,
) -> Result<Option<Message>, DbError> {
    let row = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, external_id, group_id, company_id, method, send_ts, update_ts,
               status, to_first_name, to_last_name, to_user_link, to_address,
               tags, subject, body, attachments, cost, extra
          FROM messages WHERE method = $1 AND external_id = $2
        "#,
    )
    .bind(method.to_string())
    .bind(external_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn get_message(pool: &PgPool, method: Method, id: i64) -> Result<Message, DbError> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT id, external_id, group_id, company_id, method, send_ts, update_ts,
               status, to_first_name, to_last_name, to_user_link, to_address,
               tags, subject, body, attachments, cost, extra
          FROM messages WHERE method = $1 AND id = $2
        "#,
    )
    .bind(method.to_string())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Up to 50 events for a message, oldest first, plus whether more exist
/// (spec.md §4.13 "up to 50 events (then a 'N more' sentinel)").
pub async fn list_events(pool: &PgPool, message_id: i64) -> Result<(Vec<Event>, i64), DbError> {
    let events = sqlx::query_as::<_, Event>(
        "SELECT id, message_id, status, ts, extra FROM events WHERE message_id = $1 ORDER BY ts ASC LIMIT 50",
    )
    .bind(message_id)
    .fetch_all(pool)
    .await?;

    let total: i64 =
        sqlx::query_scalar("SELECT count(*) FROM events WHERE message_id = $1")
            .bind(message_id)
            .fetch_one(pool)
            .await?;

    Ok((events, total))
}

/// Inserts an Event; the `events_update_message` trigger advances the
/// owning message's `update_ts`/`status` iff this event is strictly newer
/// (spec.md §4.10 step 4).
pub async fn insert_event(
    pool: &PgPool,
    message_id: i64,
    status: MessageStatus,
    ts: DateTime<Utc>,
    extra: Value,
) -> Result<Event, DbError> {
    let row = sqlx::query_as::<_, Event>(
        r#"
        INSERT INTO events (message_id, status, ts, extra)
        VALUES ($1, $2, $3, $4)
        RETURNING id, message_id, status, ts, extra
        "#,
    )
    .bind(message_id)
    .bind(status.to_string())
    .bind(ts)
    .bind(extra)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn find_link_by_token(pool: &PgPool, token: &str) -> Result<Option<Link>, DbError> {
    let row = sqlx::query_as::<_, Link>(
        "SELECT id, message_id, token, url FROM links WHERE token = $1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Re-fetches a Link by id, used by the `store_click` job handler which
/// only carries `link_id` in its payload (spec.md §4.12).
pub async fn get_link(pool: &PgPool, link_id: i64) -> Result<Link, DbError> {
    sqlx::query_as::<_, Link>("SELECT id, message_id, token, url FROM links WHERE id = $1")
        .bind(link_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

pub struct MessagePage {
    pub items: Vec<Message>,
    pub count: i64,
    pub spend: Option<f64>,
}

/// `GET /messages/{method}/` listing (spec.md §4.13): tag filter, full-text
/// `q`, offset pagination at page size 100, count capped at 10 000.
pub async fn list_messages(
    pool: &PgPool,
    company_id: Option<i64>,
    method: Method,
    tags: &[String],
    q: Option<&str>,
    offset: i64,
) -> Result<MessagePage, DbError> {
    const PAGE_SIZE: i64 = 100;
    const COUNT_CAP: i64 = 10_000;

    let items = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, external_id, group_id, company_id, method, send_ts, update_ts,
               status, to_first_name, to_last_name, to_user_link, to_address,
               tags, subject, body, attachments, cost, extra
          FROM messages
         WHERE method = $1
           AND ($2::bigint IS NULL OR company_id = $2)
           AND ($3::text[] = '{}' OR tags && $3)
           AND ($4::text IS NULL OR vector @@ plainto_tsquery('english', $4))
         ORDER BY update_ts DESC
         LIMIT $5 OFFSET $6
        "#,
    )
    .bind(method.to_string())
    .bind(company_id)
    .bind(tags)
    .bind(q)
    .bind(PAGE_SIZE)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT count(*) FROM (
            SELECT 1 FROM messages
             WHERE method = $1
               AND ($2::bigint IS NULL OR company_id = $2)
               AND ($3::text[] = '{}' OR tags && $3)
               AND ($4::text IS NULL OR vector @@ plainto_tsquery('english', $4))
             LIMIT $5
        ) capped
        "#,
    )
    .bind(method.to_string())
    .bind(company_id)
    .bind(tags)
    .bind(q)
    .bind(COUNT_CAP)
    .fetch_one(pool)
    .await?;

    let spend = if method.is_sms() {
        match company_id {
            Some(cid) => Some(sms_month_to_date_spend(pool, cid, method).await?),
            None => None,
        }
    } else {
        None
    };

    Ok(MessagePage { items, count, spend })
}

/// Per-day, per-status counts over the last 28 days, read from the
/// materialized view (spec.md §4.13 aggregation endpoint).
pub async fn aggregation(
    pool: &PgPool,
    company_id: Option<i64>,
    method: Method,
) -> Result<Vec<AggregationRow>, DbError> {
    let rows = sqlx::query_as::<_, AggregationRow>(
        r#"
        SELECT status, date, sum(count) AS count
          FROM message_aggregation
         WHERE method = $1
           AND ($2::bigint IS NULL OR company_id = $2)
           AND date > (now() - interval '28 days')::date
         GROUP BY status, date
         ORDER BY date ASC
        "#,
    )
    .bind(method.to_string())
    .bind(company_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Rolling N-day total across all statuses, for the 7/28/90-day summary
/// figures alongside the daily histogram.
pub async fn rolling_total(
    pool: &PgPool,
    company_id: Option<i64>,
    method: Method,
    days: i64,
) -> Result<i64, DbError> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT coalesce(sum(count), 0) FROM message_aggregation
         WHERE method = $1
           AND ($2::bigint IS NULL OR company_id = $2)
           AND date > (now() - ($3 || ' days')::interval)::date
        "#,
    )
    .bind(method.to_string())
    .bind(company_id)
    .bind(days.to_string())
    .fetch_one(pool)
    .await?;
    Ok(total)
}

/// Count of messages currently in a non-terminal ("open") status, for the
/// aggregation endpoint's open-count figure.
pub async fn open_count(
    pool: &PgPool,
    company_id: Option<i64>,
    method: Method,
) -> Result<i64, DbError> {
    const OPEN_STATUSES: &[&str] = &["scheduled", "buffered", "deferral"];
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT count(*) FROM messages
         WHERE method = $1
           AND ($2::bigint IS NULL OR company_id = $2)
           AND status = ANY($3)
        "#,
    )
    .bind(method.to_string())
    .bind(company_id)
    .bind(OPEN_STATUSES)
    .fetch_one(pool)
    .await?;
    Ok(total)
}

/// Refreshes `message_aggregation` (cron, spec.md §6 "refresh aggregation
/// view at minute 12 hourly"). `CONCURRENTLY` needs the view's unique
/// index, created alongside it in the migration.
pub async fn refresh_aggregation_view(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("REFRESH MATERIALIZED VIEW CONCURRENTLY message_aggregation")
        .execute(pool)
        .await?;
    Ok(())
}

/// Deletes messages whose `send_ts` falls in the configured retention
/// window (spec.md §6 cron: "between 368 and 365 days ago" by default, or
/// a configured `retention_days`), and any now-empty message groups older
/// than the same window.
pub async fn sweep_retention(pool: &PgPool, retention_days: i64) -> Result<u64, DbError> {
    let window_end = retention_days;
    let window_start = retention_days + 3;
    let result = sqlx::query(
        r#"
        DELETE FROM messages
         WHERE send_ts < now() - ($1 || ' days')::interval
           AND send_ts >= now() - ($2 || ' days')::interval
        "#,
    )
    .bind(window_end.to_string())
    .bind(window_start.to_string())
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        DELETE FROM message_groups
         WHERE created_ts < now() - ($1 || ' days')::interval
           AND id NOT IN (SELECT group_id FROM messages)
        "#,
    )
    .bind(retention_days.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
