//! Reply definitions
//!
//! Represents results sent back to clients.

use std::fmt;

use crate::error::HashKvError;

/// A reply to a command
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ok,
    Pong,
    Integer(i64),
    Float(f64),

    /// A single value, `None` when absent
    Bulk(Option<Vec<u8>>),

    /// Several values; absent entries stay `None`
    Array(Vec<Option<Vec<u8>>>),

    Error(String),
}

impl Reply {
    /// Build an error reply from an engine error
    pub fn from_error(err: &HashKvError) -> Self {
        Reply::Error(err.to_string())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Option<Vec<u8>>) -> fmt::Result {
    match value {
        Some(bytes) => write!(f, "\"{}\"", String::from_utf8_lossy(bytes)),
        None => write!(f, "(nil)"),
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => write!(f, "OK"),
            Reply::Pong => write!(f, "PONG"),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::Float(n) => write!(f, "\"{}\"", n),
            Reply::Bulk(value) => write_value(f, value),
            Reply::Array(values) if values.is_empty() => write!(f, "(empty array)"),
            Reply::Array(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) ", i + 1)?;
                    write_value(f, value)?;
                }
                Ok(())
            }
            Reply::Error(message) => write!(f, "(error) {}", message),
        }
    }
}
