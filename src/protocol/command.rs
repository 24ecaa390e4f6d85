//! Command definitions
//!
//! Represents hash commands from clients, and parses them from
//! whitespace-split text.

use crate::error::{HashKvError, Result};

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    HSet,
    HSetNx,
    HGet,
    HMGet,
    HMSet,
    HDel,
    HExists,
    HGetAll,
    HLen,
    HIncrBy,
    HIncrByFloat,
    HExpireAt,
    HPersist,
    Ping,
}

impl CommandType {
    /// Look a command up by name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        let command_type = match name.to_ascii_uppercase().as_str() {
            "HSET" => CommandType::HSet,
            "HSETNX" => CommandType::HSetNx,
            "HGET" => CommandType::HGet,
            "HMGET" => CommandType::HMGet,
            "HMSET" => CommandType::HMSet,
            "HDEL" => CommandType::HDel,
            "HEXISTS" => CommandType::HExists,
            "HGETALL" => CommandType::HGetAll,
            "HLEN" => CommandType::HLen,
            "HINCRBY" => CommandType::HIncrBy,
            "HINCRBYFLOAT" => CommandType::HIncrByFloat,
            "HEXPIREAT" => CommandType::HExpireAt,
            "HPERSIST" => CommandType::HPersist,
            "PING" => CommandType::Ping,
            _ => return None,
        };
        Some(command_type)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommandType::HSet => "HSET",
            CommandType::HSetNx => "HSETNX",
            CommandType::HGet => "HGET",
            CommandType::HMGet => "HMGET",
            CommandType::HMSet => "HMSET",
            CommandType::HDel => "HDEL",
            CommandType::HExists => "HEXISTS",
            CommandType::HGetAll => "HGETALL",
            CommandType::HLen => "HLEN",
            CommandType::HIncrBy => "HINCRBY",
            CommandType::HIncrByFloat => "HINCRBYFLOAT",
            CommandType::HExpireAt => "HEXPIREAT",
            CommandType::HPersist => "HPERSIST",
            CommandType::Ping => "PING",
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    HSet { key: Vec<u8>, field: Vec<u8>, value: Vec<u8> },
    HSetNx { key: Vec<u8>, field: Vec<u8>, value: Vec<u8> },
    HGet { key: Vec<u8>, field: Vec<u8> },
    HMGet { key: Vec<u8>, fields: Vec<Vec<u8>> },
    HMSet { key: Vec<u8>, pairs: Vec<(Vec<u8>, Vec<u8>)> },
    HDel { key: Vec<u8>, fields: Vec<Vec<u8>> },
    HExists { key: Vec<u8>, field: Vec<u8> },
    HGetAll { key: Vec<u8> },
    HLen { key: Vec<u8> },
    HIncrBy { key: Vec<u8>, field: Vec<u8>, delta: i64 },
    HIncrByFloat { key: Vec<u8>, field: Vec<u8>, delta: f64 },

    /// Expire at an absolute time (nanoseconds since the epoch)
    HExpireAt { key: Vec<u8>, at: i64 },
    HPersist { key: Vec<u8> },

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::HSet { .. } => CommandType::HSet,
            Command::HSetNx { .. } => CommandType::HSetNx,
            Command::HGet { .. } => CommandType::HGet,
            Command::HMGet { .. } => CommandType::HMGet,
            Command::HMSet { .. } => CommandType::HMSet,
            Command::HDel { .. } => CommandType::HDel,
            Command::HExists { .. } => CommandType::HExists,
            Command::HGetAll { .. } => CommandType::HGetAll,
            Command::HLen { .. } => CommandType::HLen,
            Command::HIncrBy { .. } => CommandType::HIncrBy,
            Command::HIncrByFloat { .. } => CommandType::HIncrByFloat,
            Command::HExpireAt { .. } => CommandType::HExpireAt,
            Command::HPersist { .. } => CommandType::HPersist,
            Command::Ping => CommandType::Ping,
        }
    }

    /// Parse `NAME arg...` tokens
    pub fn parse(args: &[&str]) -> Result<Self> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| HashKvError::Protocol("empty command".to_string()))?;
        let command_type = CommandType::from_name(name)
            .ok_or_else(|| HashKvError::Protocol(format!("unknown command '{}'", name)))?;

        let bytes = |s: &str| s.as_bytes().to_vec();
        let arity = |ok: bool| {
            if ok {
                Ok(())
            } else {
                Err(HashKvError::Protocol(format!(
                    "wrong number of arguments for '{}'",
                    command_type.name()
                )))
            }
        };

        let command = match command_type {
            CommandType::HSet | CommandType::HSetNx => {
                arity(rest.len() == 3)?;
                let (key, field, value) = (bytes(rest[0]), bytes(rest[1]), bytes(rest[2]));
                if command_type == CommandType::HSet {
                    Command::HSet { key, field, value }
                } else {
                    Command::HSetNx { key, field, value }
                }
            }
            CommandType::HGet => {
                arity(rest.len() == 2)?;
                Command::HGet { key: bytes(rest[0]), field: bytes(rest[1]) }
            }
            CommandType::HExists => {
                arity(rest.len() == 2)?;
                Command::HExists { key: bytes(rest[0]), field: bytes(rest[1]) }
            }
            CommandType::HMGet | CommandType::HDel => {
                arity(rest.len() >= 2)?;
                let key = bytes(rest[0]);
                let fields = rest[1..].iter().map(|f| bytes(*f)).collect();
                if command_type == CommandType::HMGet {
                    Command::HMGet { key, fields }
                } else {
                    Command::HDel { key, fields }
                }
            }
            CommandType::HMSet => {
                arity(rest.len() >= 3 && rest.len() % 2 == 1)?;
                let pairs = rest[1..]
                    .chunks(2)
                    .map(|pair| (bytes(pair[0]), bytes(pair[1])))
                    .collect();
                Command::HMSet { key: bytes(rest[0]), pairs }
            }
            CommandType::HGetAll => {
                arity(rest.len() == 1)?;
                Command::HGetAll { key: bytes(rest[0]) }
            }
            CommandType::HLen => {
                arity(rest.len() == 1)?;
                Command::HLen { key: bytes(rest[0]) }
            }
            CommandType::HPersist => {
                arity(rest.len() == 1)?;
                Command::HPersist { key: bytes(rest[0]) }
            }
            CommandType::HIncrBy => {
                arity(rest.len() == 3)?;
                Command::HIncrBy {
                    key: bytes(rest[0]),
                    field: bytes(rest[1]),
                    delta: parse_number(rest[2])?,
                }
            }
            CommandType::HIncrByFloat => {
                arity(rest.len() == 3)?;
                Command::HIncrByFloat {
                    key: bytes(rest[0]),
                    field: bytes(rest[1]),
                    delta: parse_number(rest[2])?,
                }
            }
            CommandType::HExpireAt => {
                arity(rest.len() == 2)?;
                Command::HExpireAt {
                    key: bytes(rest[0]),
                    at: parse_number(rest[1])?,
                }
            }
            CommandType::Ping => {
                arity(rest.is_empty())?;
                Command::Ping
            }
        };

        Ok(command)
    }
}

fn parse_number<N: std::str::FromStr>(text: &str) -> Result<N> {
    text.parse()
        .map_err(|_| HashKvError::Protocol(format!("value is not a number: '{}'", text)))
}
