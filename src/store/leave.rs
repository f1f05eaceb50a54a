use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{
    Executor, MySql, MySqlPool,
    mysql::MySqlArguments,
    query::{QueryAs, QueryScalar},
};

use crate::{
    auth::scope::AccessScope,
    error::AppError,
    model::leave_request::{
        Decision, LeaveChanges, LeaveDraft, LeaveFilter, LeaveInterval, LeaveRequest, LeaveRow, LeaveStatus,
        conflicting_intervals,
    },
    store::{LeavePage, LeaveStore, Pagination},
};

const SELECT_LEAVE: &str = r#"
    SELECT
        lr.id,
        lr.user_id,
        u.full_name AS requester_name,
        u.department_id,
        lr.from_date,
        lr.to_date,
        lr.reason,
        lr.status,
        lr.approved_by,
        approver.full_name AS approver_name,
        lr.created_at,
        lr.updated_at
    FROM leave_requests lr
    JOIN users u ON u.id = lr.user_id
    LEFT JOIN users approver ON approver.id = lr.approved_by
"#;

const NOT_FOUND: &str = "Leave request not found";

// Typed SQLx binding for the dynamic WHERE clause
#[derive(Debug, Clone, Copy, PartialEq)]
enum FilterValue {
    U64(u64),
    Str(&'static str),
    Date(NaiveDate),
}

/// Scope predicate plus optional filters, as SQL and its bind values.
fn where_clause(scope: &AccessScope, filter: &LeaveFilter) -> (String, Vec<FilterValue>) {
    let mut sql = String::from(" WHERE 1=1");
    let mut args = Vec::new();

    match *scope {
        AccessScope::All => {}
        AccessScope::Department(department_id) => {
            sql.push_str(" AND u.department_id = ?");
            args.push(FilterValue::U64(department_id));
        }
        AccessScope::Own(user_id) => {
            sql.push_str(" AND lr.user_id = ?");
            args.push(FilterValue::U64(user_id));
        }
    }

    if let Some(status) = filter.status {
        sql.push_str(" AND lr.status = ?");
        args.push(FilterValue::Str(status.as_str()));
    }
    if let Some(user_id) = filter.user_id {
        sql.push_str(" AND lr.user_id = ?");
        args.push(FilterValue::U64(user_id));
    }
    if let Some(from) = filter.from_date {
        sql.push_str(" AND lr.from_date >= ?");
        args.push(FilterValue::Date(from));
    }
    if let Some(to) = filter.to_date {
        sql.push_str(" AND lr.to_date <= ?");
        args.push(FilterValue::Date(to));
    }

    (sql, args)
}

fn bind_rows<'q>(
    mut query: QueryAs<'q, MySql, LeaveRow, MySqlArguments>,
    args: &[FilterValue],
) -> QueryAs<'q, MySql, LeaveRow, MySqlArguments> {
    for arg in args {
        query = match *arg {
            FilterValue::U64(v) => query.bind(v),
            FilterValue::Str(s) => query.bind(s),
            FilterValue::Date(d) => query.bind(d),
        };
    }
    query
}

fn bind_count<'q>(
    mut query: QueryScalar<'q, MySql, i64, MySqlArguments>,
    args: &[FilterValue],
) -> QueryScalar<'q, MySql, i64, MySqlArguments> {
    for arg in args {
        query = match *arg {
            FilterValue::U64(v) => query.bind(v),
            FilterValue::Str(s) => query.bind(s),
            FilterValue::Date(d) => query.bind(d),
        };
    }
    query
}

fn into_requests(rows: Vec<LeaveRow>) -> Result<Vec<LeaveRequest>, AppError> {
    rows.into_iter().map(LeaveRequest::try_from).collect()
}

async fn fetch_by_id<'e, E>(executor: E, id: u64) -> Result<Option<LeaveRequest>, AppError>
where
    E: Executor<'e, Database = MySql>,
{
    let sql = format!("{SELECT_LEAVE} WHERE lr.id = ?");
    sqlx::query_as::<_, LeaveRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(LeaveRequest::try_from)
        .transpose()
}

/// Serializes every create and edit of one owner until the transaction ends.
async fn lock_owner<'e, E>(executor: E, owner_id: u64) -> Result<(), AppError>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_scalar::<_, u64>("SELECT id FROM users WHERE id = ? FOR UPDATE")
        .bind(owner_id)
        .fetch_optional(executor)
        .await?
        .map(|_| ())
        .ok_or(AppError::NotFound("User not found"))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// The owner's calendar-blocking requests that share a day with `candidate`.
async fn blocking_conflicts<'e, E>(
    executor: E,
    owner_id: u64,
    candidate: &LeaveInterval,
    exclude: Option<u64>,
) -> Result<Vec<LeaveInterval>, AppError>
where
    E: Executor<'e, Database = MySql>,
{
    let blocking = LeaveStatus::blocking();
    let sql = format!(
        r#"
        SELECT id, from_date, to_date
        FROM leave_requests
        WHERE user_id = ?
        AND status IN ({})
        AND from_date <= ?
        AND to_date >= ?
        "#,
        placeholders(blocking.len())
    );

    let mut query = sqlx::query_as::<_, (u64, NaiveDate, NaiveDate)>(&sql).bind(owner_id);
    for status in &blocking {
        query = query.bind(status.as_str());
    }
    let rows = query
        .bind(candidate.to())
        .bind(candidate.from())
        .fetch_all(executor)
        .await?;

    Ok(conflicting_intervals(
        rows.into_iter()
            .map(|(id, from, to)| (id, LeaveInterval::stored(from, to))),
        candidate,
        exclude,
    ))
}

pub struct MySqlLeaveStore {
    pool: MySqlPool,
}

impl MySqlLeaveStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeaveStore for MySqlLeaveStore {
    async fn get(&self, id: u64) -> Result<Option<LeaveRequest>, AppError> {
        fetch_by_id(&self.pool, id).await
    }

    async fn list(&self, scope: &AccessScope, filter: &LeaveFilter) -> Result<Vec<LeaveRequest>, AppError> {
        let (where_sql, args) = where_clause(scope, filter);
        let sql = format!("{SELECT_LEAVE}{where_sql} ORDER BY lr.created_at DESC, lr.id DESC");

        let rows = bind_rows(sqlx::query_as::<_, LeaveRow>(&sql), &args)
            .fetch_all(&self.pool)
            .await?;

        into_requests(rows)
    }

    async fn list_page(
        &self,
        scope: &AccessScope,
        filter: &LeaveFilter,
        page: &Pagination,
    ) -> Result<LeavePage, AppError> {
        let (where_sql, args) = where_clause(scope, filter);

        let count_sql = format!(
            "SELECT COUNT(*) FROM leave_requests lr JOIN users u ON u.id = lr.user_id{where_sql}"
        );
        let total = bind_count(sqlx::query_scalar::<_, i64>(&count_sql), &args)
            .fetch_one(&self.pool)
            .await?;

        let data_sql = format!(
            "{SELECT_LEAVE}{where_sql} ORDER BY lr.created_at DESC, lr.id DESC LIMIT ? OFFSET ?"
        );
        let rows = bind_rows(sqlx::query_as::<_, LeaveRow>(&data_sql), &args)
            .bind(page.per_page())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(LeavePage {
            data: into_requests(rows)?,
            page: page.page(),
            per_page: page.per_page(),
            total: total.max(0) as u64,
        })
    }

    async fn create(&self, owner_id: u64, draft: LeaveDraft, today: NaiveDate) -> Result<LeaveRequest, AppError> {
        let leave = draft.validate(today)?;

        let mut tx = self.pool.begin().await?;
        lock_owner(&mut *tx, owner_id).await?;

        let conflicts = blocking_conflicts(&mut *tx, owner_id, &leave.interval, None).await?;
        if !conflicts.is_empty() {
            tracing::info!(user_id = owner_id, conflicts = conflicts.len(), "Leave request overlaps");
            return Err(AppError::Overlap(conflicts));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests (user_id, from_date, to_date, reason, status)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(owner_id)
        .bind(leave.interval.from())
        .bind(leave.interval.to())
        .bind(&leave.reason)
        .bind(LeaveStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .inspect_err(|e| tracing::error!(error = %e, user_id = owner_id, "Failed to insert leave request"))?;

        let id = result.last_insert_id();
        let created = fetch_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("leave request {id} vanished after insert")))?;

        tx.commit().await?;
        tracing::info!(leave_id = id, user_id = owner_id, "Leave request created");

        Ok(created)
    }

    async fn update(
        &self,
        id: u64,
        caller_id: u64,
        changes: LeaveChanges,
        today: NaiveDate,
    ) -> Result<LeaveRequest, AppError> {
        let current = fetch_by_id(&self.pool, id).await?.ok_or(AppError::NotFound(NOT_FOUND))?;
        current.ensure_owned_by(caller_id)?;

        let mut tx = self.pool.begin().await?;
        lock_owner(&mut *tx, current.user_id).await?;

        // Holds off a concurrent approve/reject until this edit commits.
        sqlx::query_scalar::<_, u64>("SELECT id FROM leave_requests WHERE id = ? FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound(NOT_FOUND))?;

        let current = fetch_by_id(&mut *tx, id).await?.ok_or(AppError::NotFound(NOT_FOUND))?;
        current.ensure_pending()?;

        let applied = changes.apply_to(&current, today)?;

        if applied.interval_changed {
            let conflicts = blocking_conflicts(&mut *tx, current.user_id, &applied.interval, Some(id)).await?;
            if !conflicts.is_empty() {
                return Err(AppError::Overlap(conflicts));
            }
        }

        sqlx::query(
            r#"
            UPDATE leave_requests
            SET from_date = ?, to_date = ?, reason = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(applied.interval.from())
        .bind(applied.interval.to())
        .bind(&applied.reason)
        .bind(id)
        .execute(&mut *tx)
        .await
        .inspect_err(|e| tracing::error!(error = %e, leave_id = id, "Failed to update leave request"))?;

        let updated = fetch_by_id(&mut *tx, id).await?.ok_or(AppError::NotFound(NOT_FOUND))?;
        tx.commit().await?;
        tracing::info!(leave_id = id, user_id = caller_id, "Leave request updated");

        Ok(updated)
    }

    async fn delete(&self, id: u64, caller_id: u64) -> Result<(), AppError> {
        let current = fetch_by_id(&self.pool, id).await?.ok_or(AppError::NotFound(NOT_FOUND))?;
        current.ensure_owned_by(caller_id)?;
        current.ensure_pending()?;

        let result = sqlx::query("DELETE FROM leave_requests WHERE id = ? AND status = ?")
            .bind(id)
            .bind(LeaveStatus::Pending.as_str())
            .execute(&self.pool)
            .await
            .inspect_err(|e| tracing::error!(error = %e, leave_id = id, "Failed to delete leave request"))?;

        if result.rows_affected() == 0 {
            // decided between the read and the delete
            return Err(AppError::NotPending);
        }

        tracing::info!(leave_id = id, user_id = caller_id, "Leave request deleted");
        Ok(())
    }

    async fn transition_status(
        &self,
        id: u64,
        approver_id: u64,
        decision: Decision,
    ) -> Result<LeaveRequest, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, approved_by = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            AND status = ?
            "#,
        )
        .bind(decision.status().as_str())
        .bind(approver_id)
        .bind(id)
        .bind(LeaveStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(error = %e, leave_id = id, "Leave status transition failed"))?;

        if result.rows_affected() == 0 {
            return match fetch_by_id(&self.pool, id).await? {
                Some(_) => Err(AppError::NotPending),
                None => Err(AppError::NotFound(NOT_FOUND)),
            };
        }

        tracing::info!(leave_id = id, approver_id, status = %decision.status(), "Leave request decided");

        fetch_by_id(&self.pool, id).await?.ok_or(AppError::NotFound(NOT_FOUND))
    }
}
