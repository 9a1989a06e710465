use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, value_binding::ParamValue};

/// Literal that asks for entities with no value in a scoped column.
pub const NONE_SENTINEL: &str = "<none>";

/// Tri-state filter over a nullable "left on" column, e.g. enrollment withdrawal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipFilter {
    /// Still a member: the column is NULL.
    Enrolled,
    /// No longer a member: the column is set.
    Withdrawn,
    /// No restriction.
    #[default]
    All,
}

impl FromStr for MembershipFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enrolled" => Ok(MembershipFilter::Enrolled),
            "withdrawn" => Ok(MembershipFilter::Withdrawn),
            "all" => Ok(MembershipFilter::All),
            other => Err(Error::InvalidArgument(format!("unknown membership filter: {other}"))),
        }
    }
}

/// Builds a query string out of ordered phrases plus a map of named parameters.
///
/// Phrases are joined with a single space in the order they were appended;
/// nothing is reordered. Parameters are referenced from phrases as `:name`.
/// A builder belongs to a single query: create one, append filters, then
/// [`build`](QueryBuilder::build) it into an immutable [`BuiltQuery`].
///
/// The filter helpers only append something when the filter value is present,
/// so an unset filter leaves both the query text and the parameters untouched.
///
/// # Example
///
/// ```rust,ignore
/// let mut builder = QueryBuilder::with_base("FROM Account AS acct WHERE acct.appId = :appId");
/// builder.bind("appId", "api");
/// builder
///     .flag_filter(search.admin_only, "acct.roles")
///     .scoped_equality(search.org_membership.as_deref(), "acct.orgMembership", "orgId");
/// let query = builder.build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    phrases: Vec<String>,
    params: BTreeMap<String, ParamValue>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder whose first phrase is `base` (typically the `FROM ... WHERE` anchor).
    pub fn with_base(base: impl Into<String>) -> Self {
        let mut builder = Self::new();
        builder.append(base);
        builder
    }

    /// Appends a phrase with no parameters.
    pub fn append(&mut self, phrase: impl Into<String>) -> &mut Self {
        self.phrases.push(phrase.into());
        self
    }

    /// Binds a parameter without appending a phrase, for placeholders in the base phrase.
    pub fn bind(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Appends a phrase that references one named parameter.
    ///
    /// The phrase must reference `:key`; this is not checked here. A key that is
    /// already bound is overwritten.
    pub fn append_param(
        &mut self,
        phrase: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> &mut Self {
        self.phrases.push(phrase.into());
        self.params.insert(key.into(), value.into());
        self
    }

    /// Appends a phrase that references two named parameters.
    pub fn append_params(
        &mut self,
        phrase: impl Into<String>,
        key1: impl Into<String>,
        value1: impl Into<ParamValue>,
        key2: impl Into<String>,
        value2: impl Into<ParamValue>,
    ) -> &mut Self {
        self.phrases.push(phrase.into());
        self.params.insert(key1.into(), value1.into());
        self.params.insert(key2.into(), value2.into());
        self
    }

    /// Requires every value to satisfy `:value {operator} {target}`.
    ///
    /// Each value is bound to its own parameter, named after the operator with
    /// spaces removed plus a 1-based index (`IN1`, `NOTIN2`, ...). The clauses are
    /// joined into one `AND (... AND ...)` phrase. With no values nothing is
    /// appended: the filter is not applied, which is not the same as matching nothing.
    ///
    /// The generated names only need to be unique within one call; callers must
    /// not use the same operator twice on one builder.
    pub fn filter_by_set<I, V>(&mut self, values: I, operator: &str, target: &str) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        let prefix = operator.replace(' ', "");
        let mut clauses = Vec::new();
        for (i, value) in values.into_iter().enumerate() {
            let name = format!("{}{}", prefix, i + 1);
            clauses.push(format!(":{} {} {}", name, operator, target));
            self.params.insert(name, value.into());
        }
        if !clauses.is_empty() {
            self.phrases.push(format!("AND ({})", clauses.join(" AND ")));
        }
        self
    }

    /// Selects entities whose `collection` is non-empty (`true`) or empty (`false`).
    pub fn flag_filter(&mut self, flag: Option<bool>, collection: &str) -> &mut Self {
        match flag {
            Some(true) => self.append(format!("AND size({}) > 0", collection)),
            Some(false) => self.append(format!("AND size({}) = 0", collection)),
            None => self,
        }
    }

    /// Matches `column` against `value`, or against NULL when `value` is `<none>`.
    ///
    /// The sentinel comparison ignores case.
    pub fn scoped_equality(&mut self, value: Option<&str>, column: &str, param: &str) -> &mut Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case(NONE_SENTINEL) => {
                self.append(format!("AND {} IS NULL", column))
            }
            Some(v) => self.append_param(format!("AND {} = :{}", column, param), param, v),
            None => self,
        }
    }

    /// Restricts `column` to `requested`, but only if the caller may see it.
    ///
    /// Once a key is requested the `IN` clause is always appended. If the key is
    /// not in `allowed` the parameter is bound to an empty list, so the query
    /// returns no rows rather than failing or revealing that the scope exists.
    pub fn restrict_to_allowed<I, S>(
        &mut self,
        requested: Option<&str>,
        allowed: I,
        column: &str,
        param: &str,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(key) = requested else {
            return self;
        };
        self.phrases.push(format!("AND {} IN (:{})", column, param));
        let value = if allowed.into_iter().any(|s| s.as_ref() == key) {
            ParamValue::List(vec![ParamValue::from(key)])
        } else {
            log::debug!("Caller is not allowed to search {}; binding :{} to an empty set", column, param);
            ParamValue::empty_list()
        };
        self.params.insert(param.to_string(), value);
        self
    }

    /// Filters on whether `column` (a "left on" timestamp) is set.
    pub fn membership_filter(&mut self, filter: Option<MembershipFilter>, column: &str) -> &mut Self {
        match filter {
            Some(MembershipFilter::Enrolled) => self.append(format!("AND {} IS NULL", column)),
            Some(MembershipFilter::Withdrawn) => self.append(format!("AND {} IS NOT NULL", column)),
            Some(MembershipFilter::All) | None => self,
        }
    }

    /// The phrases so far, joined by single spaces.
    pub fn query(&self) -> String {
        self.phrases.join(" ")
    }

    pub fn parameters(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }

    /// Finishes the builder.
    pub fn build(self) -> BuiltQuery {
        let query = self.query();
        log::debug!("Built query: {} ({} parameters)", query, self.params.len());
        BuiltQuery { query, parameters: self.params }
    }
}

/// A finished query: text plus the parameters it references.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltQuery {
    query: String,
    parameters: BTreeMap<String, ParamValue>,
}

impl BuiltQuery {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn parameters(&self) -> &BTreeMap<String, ParamValue> {
        &self.parameters
    }

    pub fn into_parts(self) -> (String, BTreeMap<String, ParamValue>) {
        (self.query, self.parameters)
    }

    /// Returns a copy with `suffix` appended to the text and `params` merged in.
    pub(crate) fn extended<I>(&self, suffix: &str, params: I) -> BuiltQuery
    where
        I: IntoIterator<Item = (String, ParamValue)>,
    {
        let mut parameters = self.parameters.clone();
        parameters.extend(params);
        BuiltQuery { query: format!("{} {}", self.query, suffix), parameters }
    }
}

impl fmt::Display for BuiltQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query)
    }
}
