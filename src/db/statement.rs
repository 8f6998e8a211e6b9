//! Named-placeholder compilation.
//!
//! Templates use `:name` markers. Drivers here bind positionally, so each
//! distinct name is assigned a slot and rewritten to the backend's positional
//! marker. Only the marker text changes: bound values are handed to the driver
//! separately and never spliced into the statement.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::db::value::{Parameters, SqlValue};
use crate::error::DatabaseError;

/// Positional placeholder syntax understood by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// SQLite/libSQL: `?1`, `?2`, ...
    QuestionNumbered,
    /// PostgreSQL: `$1`, `$2`, ...
    DollarNumbered,
}

impl PlaceholderStyle {
    fn write_slot(self, out: &mut String, slot: usize) {
        let marker = match self {
            Self::QuestionNumbered => '?',
            Self::DollarNumbered => '$',
        };
        // Writing into a String cannot fail.
        let _ = write!(out, "{marker}{slot}");
    }
}

/// A statement ready for the driver: positional SQL plus its values in slot order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    sql: String,
    values: Vec<SqlValue>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Normal,
    Quoted(char),
    LineComment,
    BlockComment,
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

impl BoundStatement {
    /// Rewrite `:name` placeholders in `template` and collect their values.
    ///
    /// Placeholders inside quoted literals, quoted identifiers, and comments
    /// are left alone, as are `::` casts. A name used more than once shares a
    /// single slot. Every placeholder must have a value in `params`; keys that
    /// no placeholder references are ignored.
    pub fn compile(
        template: &str,
        params: &Parameters,
        style: PlaceholderStyle,
    ) -> Result<Self, DatabaseError> {
        let mut sql = String::with_capacity(template.len());
        let mut values = Vec::new();
        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut state = Scan::Normal;
        let mut chars = template.char_indices().peekable();

        while let Some((i, ch)) = chars.next() {
            match state {
                Scan::Normal => match ch {
                    '\'' | '"' => {
                        sql.push(ch);
                        state = Scan::Quoted(ch);
                    }
                    '-' if matches!(chars.peek(), Some(&(_, '-'))) => {
                        sql.push(ch);
                        state = Scan::LineComment;
                    }
                    '/' if matches!(chars.peek(), Some(&(_, '*'))) => {
                        chars.next();
                        sql.push_str("/*");
                        state = Scan::BlockComment;
                    }
                    ':' => match chars.peek() {
                        Some(&(_, ':')) => {
                            chars.next();
                            sql.push_str("::");
                        }
                        Some(&(_, next)) if is_ident_start(next) => {
                            let start = i + 1;
                            let mut end = start;
                            while let Some(&(j, c)) = chars.peek() {
                                if !is_ident_continue(c) {
                                    break;
                                }
                                end = j + c.len_utf8();
                                chars.next();
                            }
                            let name = &template[start..end];
                            let slot = match slots.get(name) {
                                Some(slot) => *slot,
                                None => {
                                    let value = params.get(name).ok_or_else(|| {
                                        DatabaseError::Bind(format!(
                                            "no value bound for placeholder ':{name}'"
                                        ))
                                    })?;
                                    values.push(value.clone());
                                    slots.insert(name, values.len());
                                    values.len()
                                }
                            };
                            style.write_slot(&mut sql, slot);
                        }
                        _ => sql.push(ch),
                    },
                    _ => sql.push(ch),
                },
                Scan::Quoted(quote) => {
                    sql.push(ch);
                    // A doubled quote closes and immediately reopens, which
                    // leaves the scanner inside the literal as intended.
                    if ch == quote {
                        state = Scan::Normal;
                    }
                }
                Scan::LineComment => {
                    sql.push(ch);
                    if ch == '\n' {
                        state = Scan::Normal;
                    }
                }
                Scan::BlockComment => {
                    sql.push(ch);
                    if ch == '*' && matches!(chars.peek(), Some(&(_, '/'))) {
                        chars.next();
                        sql.push('/');
                        state = Scan::Normal;
                    }
                }
            }
        }

        let unused: Vec<&str> = params
            .keys()
            .map(String::as_str)
            .filter(|k| !slots.contains_key(k))
            .collect();
        if !unused.is_empty() {
            tracing::debug!(?unused, "ignoring parameters with no matching placeholder");
        }

        Ok(Self { sql, values })
    }

    /// The rewritten statement text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound values, in slot order (slot 1 first).
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}
