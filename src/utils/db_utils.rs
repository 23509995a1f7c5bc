use chrono::{DateTime, NaiveDate, Utc};
use sqlx::mysql::MySqlArguments;
use sqlx::query::{Query, QueryAs, QueryScalar};
use sqlx::{Executor, MySql};


/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    U64(u64),
    I32(i32),
    Str(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Null,
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::U64(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Str(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Str(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}


/// ===============================
/// Typed binding for dynamic queries
/// ===============================
pub trait BindValues: Sized {
    fn bind_value(self, value: &SqlValue) -> Self;

    fn bind_values(self, values: &[SqlValue]) -> Self {
        values.iter().fold(self, |q, v| q.bind_value(v))
    }
}

impl<'q> BindValues for Query<'q, MySql, MySqlArguments> {
    fn bind_value(self, value: &SqlValue) -> Self {
        match value {
            SqlValue::U64(v) => self.bind(*v),
            SqlValue::I32(v) => self.bind(*v),
            SqlValue::Str(v) => self.bind(v.clone()),
            SqlValue::Date(v) => self.bind(*v),
            SqlValue::DateTime(v) => self.bind(*v),
            SqlValue::Null => self.bind(None::<String>),
        }
    }
}

impl<'q, O> BindValues for QueryAs<'q, MySql, O, MySqlArguments> {
    fn bind_value(self, value: &SqlValue) -> Self {
        match value {
            SqlValue::U64(v) => self.bind(*v),
            SqlValue::I32(v) => self.bind(*v),
            SqlValue::Str(v) => self.bind(v.clone()),
            SqlValue::Date(v) => self.bind(*v),
            SqlValue::DateTime(v) => self.bind(*v),
            SqlValue::Null => self.bind(None::<String>),
        }
    }
}

impl<'q, O> BindValues for QueryScalar<'q, MySql, O, MySqlArguments> {
    fn bind_value(self, value: &SqlValue) -> Self {
        match value {
            SqlValue::U64(v) => self.bind(*v),
            SqlValue::I32(v) => self.bind(*v),
            SqlValue::Str(v) => self.bind(v.clone()),
            SqlValue::Date(v) => self.bind(*v),
            SqlValue::DateTime(v) => self.bind(*v),
            SqlValue::Null => self.bind(None::<String>),
        }
    }
}


/// ===============================
/// WHERE clause builder
/// ===============================
#[derive(Debug, Default)]
pub struct WhereClause {
    conditions: Vec<String>,
    pub values: Vec<SqlValue>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one condition; its `?` placeholders take `values` in order.
    pub fn and(&mut self, condition: &str, values: impl IntoIterator<Item = SqlValue>) -> &mut Self {
        self.conditions.push(condition.to_string());
        self.values.extend(values);
        self
    }

    pub fn and_if<T: Into<SqlValue>>(&mut self, condition: &str, value: Option<T>) -> &mut Self {
        if let Some(v) = value {
            self.and(condition, [v.into()]);
        }
        self
    }

    pub fn to_sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}


/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}


/// ===============================
/// Build UPDATE SQL from a column whitelist
/// ===============================
pub fn build_update_sql(
    table: &str,
    assignments: Vec<(&'static str, SqlValue)>,
    filter: WhereClause,
) -> Option<SqlUpdate> {
    if assignments.is_empty() {
        return None;
    }

    let set_clause = assignments
        .iter()
        .map(|(column, _)| format!("{} = ?", column))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {}{}", table, set_clause, filter.to_sql());

    let mut values: Vec<SqlValue> = assignments.into_iter().map(|(_, v)| v).collect();
    values.extend(filter.values);

    Some(SqlUpdate { sql, values })
}


/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update<'c, E>(executor: E, update: SqlUpdate) -> Result<u64, sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    let result = sqlx::query(&update.sql)
        .bind_values(&update.values)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
