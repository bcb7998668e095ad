//! SQL rendering for [`CounterScope`] filters.
//!
//! # Invariants
//! - Every filter value is bound as a parameter; only validated identifiers
//!   are interpolated into SQL text.
//! - Counter columns are always qualified with the table name so joined
//!   tables never make a column ambiguous.

use crate::model::scope::CounterScope;
use rusqlite::types::Value;

pub(crate) const COUNTER_SELECT_COLUMNS: &str = "counters.id,
    counters.isolation_id,
    counters.isolation_name,
    counters.title,
    counters.key,
    counters.value,
    counters.type,
    counters.created_at,
    counters.updated_at";

/// Number of leading columns in every counter projection.
pub(crate) const COUNTER_COLUMN_COUNT: usize = 9;

/// `FROM` and `WHERE` fragments plus their bound values.
#[derive(Debug)]
pub(crate) struct ScopedSql {
    pub from: String,
    pub where_sql: String,
    pub params: Vec<Value>,
}

impl ScopedSql {
    pub fn render(scope: &CounterScope) -> Self {
        let mut params = Vec::new();
        let mut conditions = Vec::new();

        if let Some(isolation) = scope.isolation.as_ref() {
            conditions.push("counters.isolation_id = ?".to_string());
            params.push(Value::Integer(isolation.id));
        }

        if let Some(title) = scope.title.as_ref() {
            conditions.push("counters.title = ?".to_string());
            params.push(Value::Text(title.clone()));
        }

        if let Some(key) = scope.key.as_ref() {
            conditions.push("counters.key = ?".to_string());
            params.push(Value::Text(key.clone()));
        }

        if let Some(keys) = scope.keys.as_ref() {
            conditions.push(in_list("counters.key", keys, &mut params));
        }

        if let Some(titles) = scope.titles.as_ref() {
            conditions.push(in_list("counters.title", titles, &mut params));
        }

        if let Some(fragment) = scope.key_fragment.as_ref() {
            conditions.push("counters.key LIKE ? ESCAPE '\\'".to_string());
            params.push(Value::Text(format!("%{}%", escape_like(fragment))));
        }

        if let Some(kind) = scope.kind {
            conditions.push("counters.type = ?".to_string());
            params.push(Value::Text(kind.as_str().to_string()));
        }

        let from = match scope.join.as_ref() {
            Some(join) => format!(
                "counters INNER JOIN {table} ON {table}.{pk} = counters.key",
                table = join.table,
                pk = join.pk
            ),
            None => "counters".to_string(),
        };

        let where_sql = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        Self {
            from,
            where_sql,
            params,
        }
    }

    /// Newest-first select of counter columns plus joined projection.
    pub fn select(&self, scope: &CounterScope) -> String {
        let mut projection = COUNTER_SELECT_COLUMNS.to_string();
        if let Some(join) = scope.join.as_ref() {
            for column in &join.columns {
                projection.push_str(", ");
                projection.push_str(column);
            }
        }

        format!(
            "SELECT {projection} FROM {}{} ORDER BY counters.id DESC",
            self.from, self.where_sql
        )
    }

    pub fn count(&self) -> String {
        format!("SELECT COUNT(*) FROM {}{}", self.from, self.where_sql)
    }

    /// Deletes every counter row matched by the scope, join included.
    pub fn delete(&self) -> String {
        format!(
            "DELETE FROM counters WHERE id IN (SELECT counters.id FROM {}{})",
            self.from, self.where_sql
        )
    }
}

fn in_list(column: &str, values: &[String], params: &mut Vec<Value>) -> String {
    if values.is_empty() {
        return "0 = 1".to_string();
    }

    params.extend(values.iter().cloned().map(Value::Text));
    let placeholders = vec!["?"; values.len()].join(", ");
    format!("{column} IN ({placeholders})")
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
