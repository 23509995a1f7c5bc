use async_trait::async_trait;
use chrono::NaiveDate;
use futures::TryStreamExt;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::debug;

use super::{
    LeaveStore, ReportQuery, ReportRow, RequestQuery, StoreError, StoreResult, StoreTx, Visibility,
};
use crate::model::employee::Employee;
use crate::model::leave_balance::{BalanceKey, LeaveBalance};
use crate::model::leave_comment::{LeaveComment, NewLeaveComment};
use crate::model::leave_request::{
    LeaveRequest, LeaveRequestRow, LeaveStatus, NewLeaveRequest, RequestRevision, StatusChange,
};
use crate::model::leave_type::{LeaveType, LeaveTypeChanges, NewLeaveType};
use crate::utils::db_utils::{
    BindValues, SqlValue, WhereClause, build_update_sql, execute_update,
};

const REQUEST_COLUMNS: &str = r#"
    r.id, r.organization_id, r.employee_id, r.leave_type_id, r.start_date, r.end_date,
    r.total_days, r.reason, r.status, r.approved_by_id, r.approved_at, r.rejected_by_id,
    r.rejected_at, r.cancelled_at, r.cancellation_reason, r.review_comment,
    r.created_at, r.updated_at
"#;

const EMPLOYEE_COLUMNS: &str =
    "id, organization_id, department_id, first_name, last_name, email";

const LEAVE_TYPE_COLUMNS: &str =
    "id, organization_id, name, description, max_days_per_year, created_at";

const BALANCE_COLUMNS: &str =
    "employee_id, leave_type_id, year, total_days, used_days, carried_over";

fn into_request(row: LeaveRequestRow) -> StoreResult<LeaveRequest> {
    let id = row.id;
    LeaveRequest::try_from(row)
        .map_err(|e| StoreError::Corrupt(format!("leave request {id}: {e}")))
}

fn into_requests(rows: Vec<LeaveRequestRow>) -> StoreResult<Vec<LeaveRequest>> {
    rows.into_iter().map(into_request).collect()
}

fn visibility_filter(filter: &mut WhereClause, visibility: Visibility) {
    match visibility {
        Visibility::Employee(employee_id) => {
            filter.and("r.employee_id = ?", [SqlValue::U64(employee_id)]);
        }
        Visibility::Department(department_id) => {
            filter.and("e.department_id = ?", [SqlValue::U64(department_id)]);
        }
        Visibility::Organization => {}
    }
}

/// Production store over a MySQL pool.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeaveStore for MySqlStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(MySqlTx { tx }))
    }

    async fn employee(&self, id: u64) -> StoreResult<Option<Employee>> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
        let employee = sqlx::query_as::<_, Employee>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(employee)
    }

    async fn leave_type(&self, id: u64) -> StoreResult<Option<LeaveType>> {
        let sql = format!("SELECT {LEAVE_TYPE_COLUMNS} FROM leave_types WHERE id = ?");
        let leave_type = sqlx::query_as::<_, LeaveType>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(leave_type)
    }

    async fn leave_types(&self, organization_id: u64) -> StoreResult<Vec<LeaveType>> {
        let sql = format!(
            "SELECT {LEAVE_TYPE_COLUMNS} FROM leave_types WHERE organization_id = ? ORDER BY name"
        );
        let types = sqlx::query_as::<_, LeaveType>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(types)
    }

    async fn balance(&self, key: BalanceKey) -> StoreResult<Option<LeaveBalance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM leave_balances \
             WHERE employee_id = ? AND leave_type_id = ? AND year = ?"
        );
        let balance = sqlx::query_as::<_, LeaveBalance>(&sql)
            .bind(key.employee_id)
            .bind(key.leave_type_id)
            .bind(key.year)
            .fetch_optional(&self.pool)
            .await?;
        Ok(balance)
    }

    async fn balances(&self, employee_id: u64, year: Option<i32>) -> StoreResult<Vec<LeaveBalance>> {
        let mut filter = WhereClause::new();
        filter
            .and("employee_id = ?", [SqlValue::U64(employee_id)])
            .and_if("year = ?", year);
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM leave_balances{} ORDER BY year DESC, leave_type_id",
            filter.to_sql()
        );
        let balances = sqlx::query_as::<_, LeaveBalance>(&sql)
            .bind_values(&filter.values)
            .fetch_all(&self.pool)
            .await?;
        Ok(balances)
    }

    async fn request(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM leave_requests r WHERE r.id = ?");
        let row = sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(into_request).transpose()
    }

    async fn requests(&self, query: &RequestQuery) -> StoreResult<(Vec<LeaveRequest>, u64)> {
        let mut filter = WhereClause::new();
        filter.and("r.organization_id = ?", [SqlValue::U64(query.organization_id)]);
        visibility_filter(&mut filter, query.visibility);
        filter
            .and_if("r.employee_id = ?", query.employee_id)
            .and_if("r.status = ?", query.status.map(|s| s.to_string()))
            .and_if("r.leave_type_id = ?", query.leave_type_id)
            .and_if("r.end_date >= ?", query.from)
            .and_if("r.start_date <= ?", query.to);
        let where_sql = filter.to_sql();

        // -------------------------
        // COUNT query
        // -------------------------
        let count_sql = format!(
            "SELECT COUNT(*) FROM leave_requests r JOIN employees e ON e.id = r.employee_id{}",
            where_sql
        );
        debug!(sql = %count_sql, bindings = ?filter.values, "Counting leave requests");

        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind_values(&filter.values)
            .fetch_one(&self.pool)
            .await?;

        // -------------------------
        // DATA query
        // -------------------------
        let data_sql = format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM leave_requests r
            JOIN employees e ON e.id = r.employee_id
            {where_sql}
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT ? OFFSET ?
            "#
        );

        let rows = sqlx::query_as::<_, LeaveRequestRow>(&data_sql)
            .bind_values(&filter.values)
            .bind(u64::from(query.limit))
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((into_requests(rows)?, total.max(0) as u64))
    }

    async fn comments(&self, request_id: u64) -> StoreResult<Vec<LeaveComment>> {
        let comments = sqlx::query_as::<_, LeaveComment>(
            r#"
            SELECT id, leave_request_id, author_id, body, is_internal, created_at
            FROM leave_comments
            WHERE leave_request_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn report_rows(&self, query: &ReportQuery) -> StoreResult<Vec<ReportRow>> {
        let mut filter = WhereClause::new();
        filter
            .and("r.organization_id = ?", [SqlValue::U64(query.organization_id)])
            .and("YEAR(r.start_date) = ?", [SqlValue::I32(query.year)]);
        visibility_filter(&mut filter, query.visibility);
        filter
            .and_if("r.leave_type_id = ?", query.leave_type_id)
            .and_if("r.status = ?", query.status.map(|s| s.to_string()))
            .and_if("r.end_date >= ?", query.from)
            .and_if("r.start_date <= ?", query.to);

        let sql = format!(
            r#"
            SELECT
                r.id AS request_id,
                r.employee_id,
                CONCAT(e.first_name, ' ', e.last_name) AS employee_name,
                e.department_id,
                d.name AS department_name,
                r.leave_type_id,
                t.name AS leave_type_name,
                r.status,
                r.start_date,
                r.end_date,
                r.total_days
            FROM leave_requests r
            JOIN employees e ON e.id = r.employee_id
            JOIN leave_types t ON t.id = r.leave_type_id
            LEFT JOIN departments d ON d.id = e.department_id
            {}
            ORDER BY r.start_date, r.id
            "#,
            filter.to_sql()
        );
        debug!(sql = %sql, bindings = ?filter.values, "Loading report rows");

        let mut stream = sqlx::query_as::<_, ReportRowSql>(&sql)
            .bind_values(&filter.values)
            .fetch(&self.pool);

        let mut rows = Vec::new();
        while let Some(row) = stream.try_next().await? {
            rows.push(row.try_into()?);
        }
        Ok(rows)
    }
}

#[derive(sqlx::FromRow)]
struct ReportRowSql {
    request_id: u64,
    employee_id: u64,
    employee_name: String,
    department_id: Option<u64>,
    department_name: Option<String>,
    leave_type_id: u64,
    leave_type_name: String,
    status: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_days: i32,
}

impl TryFrom<ReportRowSql> for ReportRow {
    type Error = StoreError;

    fn try_from(row: ReportRowSql) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<LeaveStatus>()
            .map_err(|e| StoreError::Corrupt(format!("leave request {}: {e}", row.request_id)))?;
        Ok(ReportRow {
            request_id: row.request_id,
            employee_id: row.employee_id,
            employee_name: row.employee_name,
            department_id: row.department_id,
            department_name: row.department_name,
            leave_type_id: row.leave_type_id,
            leave_type_name: row.leave_type_name,
            status,
            start_date: row.start_date,
            end_date: row.end_date,
            total_days: row.total_days,
        })
    }
}

pub struct MySqlTx {
    tx: Transaction<'static, MySql>,
}

impl MySqlTx {
    async fn request_by_id(&mut self, id: u64) -> StoreResult<LeaveRequest> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM leave_requests r WHERE r.id = ?");
        let row = sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await?;
        into_request(row)
    }
}

#[async_trait]
impl StoreTx for MySqlTx {
    async fn lock_employee(&mut self, id: u64) -> StoreResult<Option<Employee>> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ? FOR UPDATE");
        let employee = sqlx::query_as::<_, Employee>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(employee)
    }

    async fn overlapping_requests(
        &mut self,
        employee_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<u64>,
    ) -> StoreResult<Vec<LeaveRequest>> {
        let mut filter = WhereClause::new();
        filter
            .and("r.employee_id = ?", [SqlValue::U64(employee_id)])
            .and(
                "r.status IN (?, ?)",
                [
                    SqlValue::Str(LeaveStatus::Pending.to_string()),
                    SqlValue::Str(LeaveStatus::Approved.to_string()),
                ],
            )
            .and("r.start_date <= ?", [SqlValue::Date(end)])
            .and("r.end_date >= ?", [SqlValue::Date(start)])
            .and_if("r.id <> ?", exclude);

        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM leave_requests r{} ORDER BY r.start_date",
            filter.to_sql()
        );
        let rows = sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind_values(&filter.values)
            .fetch_all(&mut *self.tx)
            .await?;
        into_requests(rows)
    }

    async fn insert_request(&mut self, new: NewLeaveRequest) -> StoreResult<LeaveRequest> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (organization_id, employee_id, leave_type_id, start_date, end_date,
                 total_days, reason, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.organization_id)
        .bind(new.employee_id)
        .bind(new.leave_type_id)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.total_days)
        .bind(&new.reason)
        .bind(LeaveStatus::Pending.to_string())
        .bind(new.created_at)
        .bind(new.created_at)
        .execute(&mut *self.tx)
        .await?;

        self.request_by_id(result.last_insert_id()).await
    }

    async fn lock_request(&mut self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        let sql =
            format!("SELECT {REQUEST_COLUMNS} FROM leave_requests r WHERE r.id = ? FOR UPDATE");
        let row = sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(into_request).transpose()
    }

    async fn revise_request(&mut self, id: u64, revision: &RequestRevision) -> StoreResult<bool> {
        let mut filter = WhereClause::new();
        filter
            .and("id = ?", [SqlValue::U64(id)])
            .and("status = ?", [SqlValue::Str(LeaveStatus::Pending.to_string())]);

        let assignments = vec![
            ("leave_type_id", revision.leave_type_id.into()),
            ("start_date", revision.start_date.into()),
            ("end_date", revision.end_date.into()),
            ("total_days", revision.total_days.into()),
            ("reason", revision.reason.clone().into()),
            ("updated_at", revision.updated_at.into()),
        ];
        let Some(update) = build_update_sql("leave_requests", assignments, filter) else {
            return Ok(false);
        };
        let affected = execute_update(&mut *self.tx, update).await?;
        Ok(affected > 0)
    }

    async fn change_status(&mut self, id: u64, change: &StatusChange) -> StoreResult<bool> {
        let mut assignments: Vec<(&'static str, SqlValue)> = vec![
            ("status", change.to.to_string().into()),
            ("updated_at", change.at.into()),
        ];
        match change.to {
            LeaveStatus::Approved => {
                assignments.push(("approved_by_id", change.actor_id.into()));
                assignments.push(("approved_at", change.at.into()));
                assignments.push(("review_comment", change.note.clone().into()));
            }
            LeaveStatus::Rejected => {
                assignments.push(("rejected_by_id", change.actor_id.into()));
                assignments.push(("rejected_at", change.at.into()));
                assignments.push(("review_comment", change.note.clone().into()));
            }
            LeaveStatus::Cancelled => {
                assignments.push(("cancelled_at", change.at.into()));
                assignments.push(("cancellation_reason", change.note.clone().into()));
            }
            LeaveStatus::Pending => {}
        }

        let mut filter = WhereClause::new();
        filter
            .and("id = ?", [SqlValue::U64(id)])
            .and("status = ?", [SqlValue::Str(change.from.to_string())]);

        let Some(update) = build_update_sql("leave_requests", assignments, filter) else {
            return Ok(false);
        };
        let affected = execute_update(&mut *self.tx, update).await?;
        Ok(affected > 0)
    }

    async fn lock_balance(&mut self, key: BalanceKey) -> StoreResult<Option<LeaveBalance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM leave_balances \
             WHERE employee_id = ? AND leave_type_id = ? AND year = ? FOR UPDATE"
        );
        let balance = sqlx::query_as::<_, LeaveBalance>(&sql)
            .bind(key.employee_id)
            .bind(key.leave_type_id)
            .bind(key.year)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(balance)
    }

    async fn insert_balance(&mut self, balance: &LeaveBalance) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO leave_balances
                (employee_id, leave_type_id, year, total_days, used_days, carried_over)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(balance.employee_id)
        .bind(balance.leave_type_id)
        .bind(balance.year)
        .bind(balance.total_days)
        .bind(balance.used_days)
        .bind(balance.carried_over)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_allocation(
        &mut self,
        key: BalanceKey,
        total_days: i32,
        carried_over: i32,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE leave_balances
            SET total_days = ?, carried_over = ?
            WHERE employee_id = ? AND leave_type_id = ? AND year = ?
            "#,
        )
        .bind(total_days)
        .bind(carried_over)
        .bind(key.employee_id)
        .bind(key.leave_type_id)
        .bind(key.year)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_used_days(&mut self, key: BalanceKey, used_days: i32) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE leave_balances
            SET used_days = ?
            WHERE employee_id = ? AND leave_type_id = ? AND year = ?
            "#,
        )
        .bind(used_days)
        .bind(key.employee_id)
        .bind(key.leave_type_id)
        .bind(key.year)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_comment(&mut self, new: NewLeaveComment) -> StoreResult<LeaveComment> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_comments (leave_request_id, author_id, body, is_internal, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.leave_request_id)
        .bind(new.author_id)
        .bind(&new.body)
        .bind(new.is_internal)
        .bind(new.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(LeaveComment {
            id: result.last_insert_id(),
            leave_request_id: new.leave_request_id,
            author_id: new.author_id,
            body: new.body,
            is_internal: new.is_internal,
            created_at: new.created_at,
        })
    }

    async fn find_leave_type_by_name(
        &mut self,
        organization_id: u64,
        name: &str,
    ) -> StoreResult<Option<LeaveType>> {
        let sql = format!(
            "SELECT {LEAVE_TYPE_COLUMNS} FROM leave_types WHERE organization_id = ? AND name = ?"
        );
        let leave_type = sqlx::query_as::<_, LeaveType>(&sql)
            .bind(organization_id)
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(leave_type)
    }

    async fn insert_leave_type(&mut self, new: NewLeaveType) -> StoreResult<LeaveType> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_types (organization_id, name, description, max_days_per_year, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.organization_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.max_days_per_year)
        .bind(new.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(LeaveType {
            id: result.last_insert_id(),
            organization_id: new.organization_id,
            name: new.name,
            description: new.description,
            max_days_per_year: new.max_days_per_year,
            created_at: new.created_at,
        })
    }

    async fn update_leave_type(&mut self, id: u64, changes: &LeaveTypeChanges) -> StoreResult<bool> {
        let mut assignments: Vec<(&'static str, SqlValue)> = Vec::new();
        if let Some(name) = &changes.name {
            assignments.push(("name", name.clone().into()));
        }
        if let Some(description) = &changes.description {
            assignments.push(("description", description.clone().into()));
        }
        if let Some(max_days) = changes.max_days_per_year {
            assignments.push(("max_days_per_year", max_days.into()));
        }

        let mut filter = WhereClause::new();
        filter.and("id = ?", [SqlValue::U64(id)]);

        let Some(update) = build_update_sql("leave_types", assignments, filter) else {
            return Ok(false);
        };
        let affected = execute_update(&mut *self.tx, update).await?;
        Ok(affected > 0)
    }

    async fn leave_type_references(&mut self, id: u64) -> StoreResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM leave_balances WHERE leave_type_id = ?)
              + (SELECT COUNT(*) FROM leave_requests WHERE leave_type_id = ?)
            "#,
        )
        .bind(id)
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn delete_leave_type(&mut self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM leave_types WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
