//! Counter repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide scoped read APIs (`find`, `get`, `count`, `paginate`).
//! - Provide upsert/decrease/remove mutations over the `counters` table.
//! - Apply same-action batches in a single transaction.
//!
//! # Invariants
//! - Validation runs before any SQL mutation.
//! - Read-modify-write sequences run under `BEGIN IMMEDIATE`, so concurrent
//!   writers on other connections are serialized and never lose updates.
//! - A decrease reaching zero deletes the row instead of storing zero.
//! - Decrease never creates a row.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::action::{BatchItem, BatchReport, CounterAction};
use crate::model::counter::{
    Counter, CounterId, CounterRecord, CounterType, CounterValidationError, Page,
};
use crate::model::scope::{CounterScope, CounterTarget};
use crate::repo::scope_sql::{ScopedSql, COUNTER_COLUMN_COUNT, COUNTER_SELECT_COLUMNS};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::collections::BTreeMap;
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for counter persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] CounterValidationError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("counter not found: {0}")]
    NotFound(CounterId),
    #[error("counter repository requires schema version {expected_version}, got {actual_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("invalid persisted counter data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl RepoError {
    /// Returns the validation failure, if this is one.
    pub fn as_validation(&self) -> Option<&CounterValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

/// Repository interface for counter operations.
///
/// Every call receives the scope it operates on; implementations keep no
/// filter state between calls.
pub trait CounterRepository {
    /// Newest row matching the scope, or `None`.
    fn find(&self, scope: &CounterScope) -> RepoResult<Option<Counter>>;
    /// All rows matching the scope, newest first.
    fn get(&self, scope: &CounterScope) -> RepoResult<Vec<CounterRecord>>;
    /// Number of rows matching the scope.
    fn count(&self, scope: &CounterScope) -> RepoResult<u64>;
    /// One 1-based page of `get` results.
    fn paginate(
        &self,
        scope: &CounterScope,
        page: u32,
        per_page: u32,
    ) -> RepoResult<Page<CounterRecord>>;
    /// Adds `value` (> 0) to the target row, creating it when absent.
    fn increase(&self, scope: &CounterScope, value: i64) -> RepoResult<bool>;
    /// Subtracts `value` from an existing row; `Ok(false)` when absent.
    fn decrease(&self, scope: &CounterScope, value: i64) -> RepoResult<bool>;
    /// Sets the target row to `value` (> 0), creating it when absent.
    fn replace(&self, scope: &CounterScope, value: i64) -> RepoResult<bool>;
    /// Adds one, creating a `Countable` row when absent.
    fn increment(&self, scope: &CounterScope) -> RepoResult<bool>;
    /// Subtracts one; `Ok(false)` when absent.
    fn decrement(&self, scope: &CounterScope) -> RepoResult<bool>;
    /// Applies `action` to every item under the scope's title and isolation.
    fn apply_batch(
        &self,
        scope: &CounterScope,
        action: CounterAction,
        items: &[BatchItem],
    ) -> RepoResult<BatchReport>;
    /// Deletes every row matching a non-empty scope.
    fn remove(&self, scope: &CounterScope) -> RepoResult<usize>;
    /// Deletes one row by id.
    fn remove_by_id(&self, id: CounterId) -> RepoResult<()>;
}

/// SQLite-backed counter repository.
pub struct SqliteCounterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCounterRepository<'conn> {
    /// Wraps a connection without checking its schema.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Wraps a connection after checking it is migrated to the latest
    /// schema version.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let actual_version = current_user_version(conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    fn write_tx<T>(&self, work: impl FnOnce(&Connection) -> RepoResult<T>) -> RepoResult<T> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let output = work(&*tx)?;
        tx.commit()?;
        Ok(output)
    }
}

impl CounterRepository for SqliteCounterRepository<'_> {
    fn find(&self, scope: &CounterScope) -> RepoResult<Option<Counter>> {
        let scoped = ScopedSql::render(scope);
        let sql = format!("{} LIMIT 1;", scoped.select(scope));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(scoped.params.iter()))?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_counter_row(row)?));
        }

        Ok(None)
    }

    fn get(&self, scope: &CounterScope) -> RepoResult<Vec<CounterRecord>> {
        let scoped = ScopedSql::render(scope);
        let sql = format!("{};", scoped.select(scope));
        query_records(self.conn, scope, &sql, scoped.params)
    }

    fn count(&self, scope: &CounterScope) -> RepoResult<u64> {
        let scoped = ScopedSql::render(scope);
        let total: i64 = self.conn.query_row(
            &format!("{};", scoped.count()),
            params_from_iter(scoped.params.iter()),
            |row| row.get(0),
        )?;
        u64::try_from(total)
            .map_err(|_| RepoError::InvalidData(format!("negative row count `{total}`")))
    }

    fn paginate(
        &self,
        scope: &CounterScope,
        page: u32,
        per_page: u32,
    ) -> RepoResult<Page<CounterRecord>> {
        if page == 0 || per_page == 0 {
            return Err(CounterValidationError::InvalidPagination { page, per_page }.into());
        }

        let total = self.count(scope)?;
        let scoped = ScopedSql::render(scope);
        let sql = format!("{} LIMIT ? OFFSET ?;", scoped.select(scope));
        let mut params = scoped.params;
        params.push(Value::Integer(i64::from(per_page)));
        params.push(Value::Integer(i64::from(page - 1) * i64::from(per_page)));

        let items = query_records(self.conn, scope, &sql, params)?;
        let last_page = total.div_ceil(u64::from(per_page)).max(1);

        Ok(Page {
            items,
            total,
            per_page,
            current_page: page,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
        })
    }

    fn increase(&self, scope: &CounterScope, value: i64) -> RepoResult<bool> {
        let target = scope.target()?;
        ensure_positive(value)?;
        self.write_tx(|conn| {
            upsert_in(conn, &target, value, Upsert::Add, CounterType::Summable)
        })?;
        Ok(true)
    }

    fn decrease(&self, scope: &CounterScope, value: i64) -> RepoResult<bool> {
        let target = scope.target()?;
        self.write_tx(|conn| decrease_in(conn, &target, value))
    }

    fn replace(&self, scope: &CounterScope, value: i64) -> RepoResult<bool> {
        let target = scope.target()?;
        ensure_positive(value)?;
        self.write_tx(|conn| {
            upsert_in(conn, &target, value, Upsert::Set, CounterType::Summable)
        })?;
        Ok(true)
    }

    fn increment(&self, scope: &CounterScope) -> RepoResult<bool> {
        let target = scope.target()?;
        self.write_tx(|conn| upsert_in(conn, &target, 1, Upsert::Add, CounterType::Countable))?;
        Ok(true)
    }

    fn decrement(&self, scope: &CounterScope) -> RepoResult<bool> {
        let target = scope.target()?;
        self.write_tx(|conn| decrease_in(conn, &target, 1))
    }

    fn apply_batch(
        &self,
        scope: &CounterScope,
        action: CounterAction,
        items: &[BatchItem],
    ) -> RepoResult<BatchReport> {
        let title = scope
            .title_filter()
            .ok_or(CounterValidationError::MissingTitle)?;

        self.write_tx(|conn| {
            let mut report = BatchReport::default();
            for item in items {
                if item.key.is_empty() {
                    return Err(CounterValidationError::MissingKey.into());
                }

                let target = CounterTarget {
                    title,
                    key: item.key.as_str(),
                    isolation: scope.isolation(),
                };
                if apply_in(conn, &target, action, item.value)? {
                    report.applied += 1;
                } else {
                    report.skipped += 1;
                }
            }
            Ok(report)
        })
    }

    fn remove(&self, scope: &CounterScope) -> RepoResult<usize> {
        if scope.is_unfiltered() {
            return Err(CounterValidationError::UnscopedRemove.into());
        }

        let scoped = ScopedSql::render(scope);
        let removed = self.conn.execute(
            &format!("{};", scoped.delete()),
            params_from_iter(scoped.params.iter()),
        )?;
        Ok(removed)
    }

    fn remove_by_id(&self, id: CounterId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM counters WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upsert {
    Add,
    Set,
}

fn ensure_positive(value: i64) -> Result<(), CounterValidationError> {
    if value <= 0 {
        return Err(CounterValidationError::NonPositiveValue(value));
    }
    Ok(())
}

fn apply_in(
    conn: &Connection,
    target: &CounterTarget<'_>,
    action: CounterAction,
    value: i64,
) -> RepoResult<bool> {
    match action {
        CounterAction::Increase => {
            ensure_positive(value)?;
            upsert_in(conn, target, value, Upsert::Add, CounterType::Summable)?;
            Ok(true)
        }
        CounterAction::Replace => {
            ensure_positive(value)?;
            upsert_in(conn, target, value, Upsert::Set, CounterType::Summable)?;
            Ok(true)
        }
        CounterAction::Decrease => decrease_in(conn, target, value),
    }
}

fn upsert_in(
    conn: &Connection,
    target: &CounterTarget<'_>,
    amount: i64,
    mode: Upsert,
    kind_on_create: CounterType,
) -> RepoResult<()> {
    let Some(existing) = find_target(conn, target)? else {
        conn.execute(
            "INSERT INTO counters (
                isolation_id,
                isolation_name,
                title,
                key,
                value,
                type
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                target.isolation.map(|isolation| isolation.id),
                target.isolation.map(|isolation| isolation.name.as_str()),
                target.title,
                target.key,
                amount,
                kind_on_create.as_str(),
            ],
        )?;
        return Ok(());
    };

    let value = match mode {
        Upsert::Add => existing
            .value
            .checked_add(amount)
            .ok_or(CounterValidationError::ValueOverflow)?,
        Upsert::Set => amount,
    };
    update_value(conn, existing.id, value)
}

fn decrease_in(conn: &Connection, target: &CounterTarget<'_>, delta: i64) -> RepoResult<bool> {
    let Some(existing) = find_target(conn, target)? else {
        return Ok(false);
    };

    if delta < 0 || delta > existing.value {
        return Err(CounterValidationError::OutOfBounds {
            requested: delta,
            current: existing.value,
        }
        .into());
    }

    let remaining = existing.value - delta;
    if remaining == 0 {
        conn.execute("DELETE FROM counters WHERE id = ?1;", [existing.id])?;
        return Ok(true);
    }

    update_value(conn, existing.id, remaining)?;
    Ok(true)
}

fn update_value(conn: &Connection, id: CounterId, value: i64) -> RepoResult<()> {
    conn.execute(
        "UPDATE counters
         SET
            value = ?2,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        params![id, value],
    )?;
    Ok(())
}

/// Looks up the exact row a mutation writes to. A target without
/// isolation only matches rows whose `isolation_id` is NULL.
fn find_target(conn: &Connection, target: &CounterTarget<'_>) -> RepoResult<Option<Counter>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COUNTER_SELECT_COLUMNS}
         FROM counters
         WHERE counters.title = ?1
           AND counters.key = ?2
           AND counters.isolation_id IS ?3
         ORDER BY counters.id DESC
         LIMIT 1;"
    ))?;

    let mut rows = stmt.query(params![
        target.title,
        target.key,
        target.isolation.map(|isolation| isolation.id),
    ])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_counter_row(row)?));
    }

    Ok(None)
}

fn query_records(
    conn: &Connection,
    scope: &CounterScope,
    sql: &str,
    params: Vec<Value>,
) -> RepoResult<Vec<CounterRecord>> {
    let joined_columns = scope
        .join_spec()
        .map(|join| join.columns.as_slice())
        .unwrap_or_default();

    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(params))?;
    let mut records = Vec::new();

    while let Some(row) = rows.next()? {
        let counter = parse_counter_row(row)?;
        let mut joined = BTreeMap::new();
        for (offset, column) in joined_columns.iter().enumerate() {
            let value = row.get_ref(COUNTER_COLUMN_COUNT + offset)?;
            joined.insert(column.clone(), value_to_json(value));
        }
        records.push(CounterRecord { counter, joined });
    }

    Ok(records)
}

fn parse_counter_row(row: &Row<'_>) -> RepoResult<Counter> {
    let type_text: String = row.get(6)?;
    let kind = CounterType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid counter type `{type_text}` in counters.type"))
    })?;

    Ok(Counter {
        id: row.get(0)?,
        isolation_id: row.get(1)?,
        isolation_name: row.get(2)?,
        title: row.get(3)?,
        key: row.get(4)?,
        value: row.get(5)?,
        kind,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(number) => serde_json::Value::from(number),
        ValueRef::Real(number) => serde_json::Number::from_f64(number)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        ValueRef::Text(bytes) => {
            serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Blob(bytes) => serde_json::Value::from(bytes.to_vec()),
    }
}
