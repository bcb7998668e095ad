//! Immutable query scope for counter operations.
//!
//! # Responsibility
//! - Accumulate title/key/isolation filters and the extra predicate
//!   variants (key set, key substring, type, title set, join).
//! - Resolve the mutation target `(title, key, isolation)` for upserts.
//!
//! # Invariants
//! - Builder methods consume and return the scope; nothing is shared
//!   between calls, so no filter can leak into an unrelated operation.
//! - `title`/`key` are last-write-wins; empty strings mean "not set".
//! - Join identifiers are validated when the join is added.

use crate::model::counter::{CounterType, CounterValidationError, Isolation};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Join of the counters table against another table on `table.pk = key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    pub table: String,
    pub pk: String,
    /// Extra projected columns, `name` or `table.name`.
    pub columns: Vec<String>,
}

/// Filters applied by a terminal repository call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterScope {
    pub(crate) title: Option<String>,
    pub(crate) key: Option<String>,
    pub(crate) isolation: Option<Isolation>,
    pub(crate) keys: Option<Vec<String>>,
    pub(crate) key_fragment: Option<String>,
    pub(crate) kind: Option<CounterType>,
    pub(crate) titles: Option<Vec<String>>,
    pub(crate) join: Option<JoinSpec>,
}

/// Resolved identity of the row a mutation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterTarget<'a> {
    pub title: &'a str,
    pub key: &'a str,
    pub isolation: Option<&'a Isolation>,
}

impl CounterScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the title equality filter.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = non_empty(title.into());
        self
    }

    /// Sets the key equality filter.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = non_empty(key.into());
        self
    }

    /// Restricts the scope to one isolation instance.
    pub fn isolate(mut self, name: impl Into<String>, id: i64) -> Self {
        self.isolation = Some(Isolation::new(name, id));
        self
    }

    /// Applies `isolate` when `isolation` is present.
    pub fn with_isolation(mut self, isolation: Option<Isolation>) -> Self {
        if isolation.is_some() {
            self.isolation = isolation;
        }
        self
    }

    /// Restricts keys to a set. Repeated calls extend the set.
    pub fn in_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys
            .get_or_insert_with(Vec::new)
            .extend(keys.into_iter().map(Into::into));
        self
    }

    /// Alias of [`CounterScope::in_keys`].
    pub fn stats_by_keys<I, S>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.in_keys(keys)
    }

    /// Matches keys containing `fragment` as a literal substring.
    pub fn contains(mut self, fragment: impl Into<String>) -> Self {
        self.key_fragment = Some(fragment.into());
        self
    }

    /// Restricts rows to one type marker.
    pub fn of_type(mut self, kind: CounterType) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restricts titles to a set. Repeated calls extend the set.
    pub fn in_titles<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.titles
            .get_or_insert_with(Vec::new)
            .extend(titles.into_iter().map(Into::into));
        self
    }

    /// Joins `table` on `table.pk = counters.key`.
    ///
    /// When `columns` is non-empty, list results carry those columns in
    /// [`crate::CounterRecord::joined`].
    ///
    /// # Errors
    /// - `InvalidIdentifier` when a table, pk or column name is not a plain
    ///   SQL identifier (`table.column` is accepted for columns).
    pub fn join<I, S>(
        mut self,
        table: impl Into<String>,
        pk: impl Into<String>,
        columns: I,
    ) -> Result<Self, CounterValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let table = validate_identifier(table.into())?;
        let pk = validate_identifier(pk.into())?;
        let columns = columns
            .into_iter()
            .map(|column| validate_column(column.into()))
            .collect::<Result<Vec<_>, _>>()?;

        self.join = Some(JoinSpec { table, pk, columns });
        Ok(self)
    }

    pub fn title_filter(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn key_filter(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn isolation(&self) -> Option<&Isolation> {
        self.isolation.as_ref()
    }

    pub fn join_spec(&self) -> Option<&JoinSpec> {
        self.join.as_ref()
    }

    /// Returns `true` when no filter at all is set.
    pub fn is_unfiltered(&self) -> bool {
        self.title.is_none()
            && self.key.is_none()
            && self.isolation.is_none()
            && self.keys.is_none()
            && self.key_fragment.is_none()
            && self.kind.is_none()
            && self.titles.is_none()
            && self.join.is_none()
    }

    /// Resolves the row identity a mutation writes to.
    ///
    /// # Errors
    /// - `MissingTitle` / `MissingKey` when either is unset.
    pub fn target(&self) -> Result<CounterTarget<'_>, CounterValidationError> {
        let title = self
            .title
            .as_deref()
            .ok_or(CounterValidationError::MissingTitle)?;
        let key = self
            .key
            .as_deref()
            .ok_or(CounterValidationError::MissingKey)?;
        Ok(CounterTarget {
            title,
            key,
            isolation: self.isolation.as_ref(),
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn validate_identifier(value: String) -> Result<String, CounterValidationError> {
    if IDENTIFIER_RE.is_match(&value) {
        Ok(value)
    } else {
        Err(CounterValidationError::InvalidIdentifier(value))
    }
}

fn validate_column(value: String) -> Result<String, CounterValidationError> {
    let mut segments = value.split('.');
    let valid = match (segments.next(), segments.next(), segments.next()) {
        (Some(name), None, None) => IDENTIFIER_RE.is_match(name),
        (Some(table), Some(name), None) => {
            IDENTIFIER_RE.is_match(table) && IDENTIFIER_RE.is_match(name)
        }
        _ => false,
    };

    if valid {
        Ok(value)
    } else {
        Err(CounterValidationError::InvalidIdentifier(value))
    }
}

#[cfg(test)]
mod tests {
    use super::CounterScope;
    use crate::model::counter::{CounterValidationError, Isolation};

    #[test]
    fn title_and_key_are_last_write_wins() {
        let scope = CounterScope::new()
            .title("first")
            .title("second")
            .key("a")
            .key("b");
        assert_eq!(scope.title_filter(), Some("second"));
        assert_eq!(scope.key_filter(), Some("b"));
    }

    #[test]
    fn empty_title_clears_filter() {
        let scope = CounterScope::new().title("views").title("");
        assert_eq!(scope.title_filter(), None);
        assert!(scope.is_unfiltered());
    }

    #[test]
    fn in_keys_flattens_repeated_calls() {
        let scope = CounterScope::new()
            .in_keys(["a", "b"])
            .in_keys(vec!["c".to_string()]);
        assert_eq!(
            scope.keys.as_deref(),
            Some(&["a".to_string(), "b".to_string(), "c".to_string()][..])
        );
    }

    #[test]
    fn target_requires_title_then_key() {
        let err = CounterScope::new().key("k").target().unwrap_err();
        assert_eq!(err, CounterValidationError::MissingTitle);

        let err = CounterScope::new().title("t").target().unwrap_err();
        assert_eq!(err, CounterValidationError::MissingKey);

        let scope = CounterScope::new().isolate("tenant", 7).title("t").key("k");
        let target = scope.target().unwrap();
        assert_eq!(target.title, "t");
        assert_eq!(target.key, "k");
        assert_eq!(target.isolation, Some(&Isolation::new("tenant", 7)));
    }

    #[test]
    fn join_rejects_non_identifiers() {
        let err = CounterScope::new()
            .join("users; DROP TABLE counters", "id", Vec::<String>::new())
            .unwrap_err();
        assert!(matches!(err, CounterValidationError::InvalidIdentifier(_)));

        let err = CounterScope::new()
            .join("users", "id", ["users.name", "a.b.c"])
            .unwrap_err();
        assert_eq!(
            err,
            CounterValidationError::InvalidIdentifier("a.b.c".to_string())
        );

        let scope = CounterScope::new()
            .join("users", "id", ["users.name", "email"])
            .unwrap();
        let join = scope.join_spec().unwrap();
        assert_eq!(join.table, "users");
        assert_eq!(join.columns, vec!["users.name", "email"]);
    }

    #[test]
    fn with_isolation_ignores_none() {
        let scope = CounterScope::new()
            .isolate("tenant", 1)
            .with_isolation(None);
        assert_eq!(scope.isolation(), Some(&Isolation::new("tenant", 1)));
    }
}
