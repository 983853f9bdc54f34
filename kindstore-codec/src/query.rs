//! Filter queries and their translation into store queries.
//!
//! A [`Query`] is read from a flat parameter map. Reserved keys (`kind`,
//! `namespace`, `ancestor`, `$select`, `create`, `dontIndex`, `autoIndex`)
//! become options; every other key is a field filter. Filters support
//! equality, null checks and the comparison operators the store can
//! evaluate. Anything else is rejected instead of silently ignored.

use crate::error::{QueryError, QueryResult};
use crate::key_codec::KeyCodec;
use kindstore_model::{Key, Record, Value, record_from_json};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tracing::debug;

/// Pseudo-property that filters on the entity key itself.
pub const KEY_PROPERTY: &str = "__key__";

/// Comparison operators the store evaluates natively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    /// Parses an operator token. Both the symbolic (`>=`) and the
    /// `$`-prefixed (`$gte`) spellings are accepted.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "=" | "$eq" => Some(Self::Eq),
            "<" | "$lt" => Some(Self::Lt),
            "<=" | "$lte" => Some(Self::Lte),
            ">" | "$gt" => Some(Self::Gt),
            ">=" | "$gte" => Some(Self::Gte),
            _ => None,
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }

    /// Whether a property comparing as `ordering` against the operand
    /// satisfies this operator.
    #[must_use]
    pub const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::Lte => !matches!(ordering, Ordering::Greater),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::Gte => !matches!(ordering, Ordering::Less),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The condition attached to one field.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    /// A plain literal: the field must equal it.
    Equals(Value),
    /// The field must be present and `null`.
    IsNull,
    /// An explicit operator with its operand.
    Compare(CompareOp, Value),
}

/// A condition on a named field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub condition: FilterValue,
}

/// A parsed filter query together with the per-call options.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    /// Overrides the service's default kind.
    pub kind: Option<String>,
    /// Overrides the service's default namespace.
    pub namespace: Option<String>,
    /// Identifier (or key) of the record to scope under.
    pub ancestor: Option<Value>,
    /// Fields to project; the id property is always kept.
    pub select: Option<Vec<String>>,
    /// Fields forced unindexed on write.
    pub dont_index: Vec<String>,
    /// Enables or disables the index-size heuristic for this call.
    pub auto_index: Option<bool>,
    /// On update, create the record when it does not exist.
    pub create: bool,
    pub filters: Vec<FieldFilter>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a query from a flat parameter map.
    pub fn parse(params: Record) -> QueryResult<Self> {
        let mut query = Self::default();
        for (name, value) in params {
            match name.as_str() {
                "kind" => query.kind = Some(expect_string(&name, value)?),
                "namespace" => query.namespace = optional_string(&name, value)?,
                "ancestor" => query.ancestor = (!value.is_null()).then_some(value),
                "$select" => query.select = Some(string_list(&name, value)?),
                "dontIndex" => query.dont_index = string_list(&name, value)?,
                "autoIndex" => query.auto_index = Some(flag(&name, value)?),
                "create" => query.create = flag(&name, value)?,
                directive if directive.starts_with('$') => {
                    return Err(QueryError::UnsupportedDirective(directive.to_string()));
                }
                _ => {
                    for condition in parse_condition(&name, value)? {
                        query.filters.push(FieldFilter {
                            field: name.clone(),
                            condition,
                        });
                    }
                }
            }
        }
        Ok(query)
    }

    /// Reads a query from a JSON object.
    pub fn from_json(json: serde_json::Value) -> QueryResult<Self> {
        record_from_json(json)
            .ok_or(QueryError::NotAnObject)
            .and_then(Self::parse)
    }

    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_ancestor(mut self, ancestor: impl Into<Value>) -> Self {
        self.ancestor = Some(ancestor.into());
        self
    }

    #[must_use]
    pub fn with_select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_dont_index<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dont_index = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_auto_index(mut self, auto_index: bool) -> Self {
        self.auto_index = Some(auto_index);
        self
    }

    /// Turns a strict update into an upsert.
    #[must_use]
    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Adds an equality filter. A `Null` operand becomes a null check.
    #[must_use]
    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let condition = match value.into() {
            Value::Null => FilterValue::IsNull,
            value => FilterValue::Equals(value),
        };
        self.filters.push(FieldFilter {
            field: field.into(),
            condition,
        });
        self
    }

    /// Adds an explicit comparison filter.
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            condition: FilterValue::Compare(op, value.into()),
        });
        self
    }
}

fn parse_condition(field: &str, value: Value) -> QueryResult<Vec<FilterValue>> {
    match value {
        Value::Null => Ok(vec![FilterValue::IsNull]),
        Value::Map(operators) if is_operator_map(&operators) => operators
            .into_iter()
            .map(|(token, operand)| -> QueryResult<FilterValue> {
                let op = CompareOp::parse(&token).ok_or_else(|| QueryError::UnsupportedOperator {
                    field: field.to_string(),
                    operator: token.clone(),
                })?;
                Ok(match coerce_numeric(operand) {
                    Value::Null if op == CompareOp::Eq => FilterValue::IsNull,
                    operand => FilterValue::Compare(op, operand),
                })
            })
            .collect(),
        literal => Ok(vec![FilterValue::Equals(literal)]),
    }
}

/// A map is an operator map when any of its keys looks like an operator.
/// Other maps are literal embedded values compared for equality.
fn is_operator_map(map: &Record) -> bool {
    map.keys()
        .any(|k| k.starts_with('$') || CompareOp::parse(k).is_some())
}

/// Operator operands sent as text by a transport layer are compared as
/// numbers when the whole string is a decimal number.
fn coerce_numeric(value: Value) -> Value {
    match value {
        Value::String(text) => parse_decimal(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

fn parse_decimal(text: &str) -> Option<Value> {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || fraction.is_some_and(|f| !all_digits(f)) {
        return None;
    }
    if fraction.is_none() {
        if let Ok(i) = text.parse::<i64>() {
            return Some(Value::Integer(i));
        }
    }
    text.parse::<f64>().ok().map(Value::Double)
}

fn expect_string(option: &str, value: Value) -> QueryResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(invalid(option, format!("expected a string, got {other:?}"))),
    }
}

fn optional_string(option: &str, value: Value) -> QueryResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        other => expect_string(option, other).map(Some),
    }
}

fn string_list(option: &str, value: Value) -> QueryResult<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| expect_string(option, item))
            .collect(),
        other => Err(invalid(option, format!("expected a list of names, got {other:?}"))),
    }
}

fn flag(option: &str, value: Value) -> QueryResult<bool> {
    match value {
        Value::Boolean(b) => Ok(b),
        Value::String(s) if s == "true" => Ok(true),
        Value::String(s) if s == "false" => Ok(false),
        other => Err(invalid(option, format!("expected a boolean, got {other:?}"))),
    }
}

fn invalid(option: &str, reason: String) -> QueryError {
    QueryError::InvalidOption {
        option: option.to_string(),
        reason,
    }
}

/// A single comparison the store evaluates.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyFilter {
    pub property: String,
    pub op: CompareOp,
    pub value: Value,
}

/// A query in the store's own terms.
#[derive(Clone, Debug, PartialEq)]
pub struct NativeQuery {
    pub kind: String,
    pub namespace: Option<String>,
    /// Restricts results to descendants of this key (the key itself included).
    pub ancestor: Option<Key>,
    pub filters: Vec<PropertyFilter>,
    /// Properties to return; `None` returns whole entities.
    pub projection: Option<Vec<String>>,
}

/// Builds [`NativeQuery`] values from parsed [`Query`] values.
#[derive(Debug, Clone)]
pub struct QueryTranslator {
    keys: KeyCodec,
    id_field: String,
}

impl QueryTranslator {
    pub fn new(keys: KeyCodec, id_field: impl Into<String>) -> Self {
        Self {
            keys,
            id_field: id_field.into(),
        }
    }

    /// Translates `query`, filling kind and namespace from the defaults.
    ///
    /// Filters on the id property become key filters; under an ancestor
    /// the compared key is nested below it.
    pub fn translate(&self, query: &Query) -> NativeQuery {
        let kind = query
            .kind
            .clone()
            .unwrap_or_else(|| self.keys.kind().to_string());
        let namespace = query
            .namespace
            .clone()
            .or_else(|| self.keys.namespace().map(str::to_string));
        let ancestor = query
            .ancestor
            .as_ref()
            .map(|a| self.keys.make_key(Some(a), Some(&kind), namespace.as_deref()));

        let filters = query
            .filters
            .iter()
            .map(|filter| self.property_filter(filter, &kind, namespace.as_deref(), ancestor.as_ref()))
            .collect::<Vec<_>>();

        let projection = query.select.as_ref().map(|fields| {
            fields
                .iter()
                .filter(|field| **field != self.id_field)
                .cloned()
                .collect()
        });

        debug!(
            kind = %kind,
            filters = filters.len(),
            ancestor = ?ancestor,
            "Translated query"
        );

        NativeQuery {
            kind,
            namespace,
            ancestor,
            filters,
            projection,
        }
    }

    fn property_filter(
        &self,
        filter: &FieldFilter,
        kind: &str,
        namespace: Option<&str>,
        ancestor: Option<&Key>,
    ) -> PropertyFilter {
        let (op, value) = match &filter.condition {
            FilterValue::Equals(value) => (CompareOp::Eq, value.clone()),
            FilterValue::IsNull => (CompareOp::Eq, Value::Null),
            FilterValue::Compare(op, value) => (*op, value.clone()),
        };

        if filter.field != self.id_field {
            return PropertyFilter {
                property: filter.field.clone(),
                op,
                value,
            };
        }

        let key = self
            .keys
            .make_nested_key(ancestor, Some(&value), Some(kind), namespace);
        PropertyFilter {
            property: KEY_PROPERTY.to_string(),
            op,
            value: Value::Key(key),
        }
    }
}
