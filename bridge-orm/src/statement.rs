//! # Statement Rendering
//!
//! Turns a [`BuiltQuery`] with `:name` placeholders into positional SQL for a
//! driver, plus the values to bind in placeholder order.
//!
//! - PostgreSQL gets `$1, $2, ...`; MySQL and SQLite get `?`.
//! - A list parameter expands to one placeholder per element, so
//!   `IN (:studies)` becomes `IN (?, ?)`. An empty list renders as `NULL`;
//!   `IN (NULL)` matches no rows.
//! - Text inside single quotes and `::` casts are left alone. For MySQL a
//!   backslash inside quotes escapes the next character.
//! - A placeholder with no bound value is an error; nothing is sent to the database.

use sqlx::any::AnyArguments;

use crate::{Error, database::Drivers, query_builder::BuiltQuery, value_binding::{ParamValue, ValueBinder}};

/// Positional SQL and its values, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    values: Vec<ParamValue>,
}

impl Statement {
    pub fn render(query: &BuiltQuery, driver: &Drivers) -> Result<Self, Error> {
        let text = query.query();
        let mut sql = String::with_capacity(text.len());
        let mut values = Vec::new();
        let mut in_quote = false;
        let mut chars = text.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            // MySQL reads `\'` inside a string as an escaped quote.
            if in_quote && c == '\\' && *driver == Drivers::MySQL {
                sql.push(c);
                if let Some((_, escaped)) = chars.next() {
                    sql.push(escaped);
                }
                continue;
            }
            if c == '\'' {
                in_quote = !in_quote;
                sql.push(c);
                continue;
            }
            if in_quote || c != ':' {
                sql.push(c);
                continue;
            }
            match chars.peek().map(|&(_, n)| n) {
                Some(':') => {
                    chars.next();
                    sql.push_str("::");
                }
                Some(next) if next.is_ascii_alphabetic() || next == '_' => {
                    let start = i + 1;
                    let mut end = start;
                    while let Some(&(j, n)) = chars.peek() {
                        if n.is_ascii_alphanumeric() || n == '_' {
                            end = j + n.len_utf8();
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let name = &text[start..end];
                    let value = query
                        .parameters()
                        .get(name)
                        .ok_or_else(|| Error::MissingParameter(name.to_string()))?;
                    push_value(&mut sql, &mut values, value, driver);
                }
                _ => sql.push(c),
            }
        }

        log::debug!("Rendered statement: {} ({} values)", sql, values.len());
        Ok(Self { sql, values })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn values(&self) -> &[ParamValue] {
        &self.values
    }

    /// Binds the values in placeholder order.
    pub fn arguments<'q>(&self, driver: &Drivers) -> Result<AnyArguments<'q>, Error> {
        let mut args = AnyArguments::default();
        for value in &self.values {
            args.bind_param(value, driver)?;
        }
        Ok(args)
    }
}

fn push_value(sql: &mut String, values: &mut Vec<ParamValue>, value: &ParamValue, driver: &Drivers) {
    match value {
        ParamValue::List(items) if items.is_empty() => sql.push_str("NULL"),
        ParamValue::List(items) => {
            for (k, item) in items.iter().enumerate() {
                if k > 0 {
                    sql.push_str(", ");
                }
                values.push(item.clone());
                push_placeholder(sql, values.len(), driver);
            }
        }
        scalar => {
            values.push(scalar.clone());
            push_placeholder(sql, values.len(), driver);
        }
    }
}

fn push_placeholder(sql: &mut String, position: usize, driver: &Drivers) {
    match driver {
        Drivers::Postgres => {
            sql.push('$');
            sql.push_str(&position.to_string());
        }
        _ => sql.push('?'),
    }
}
