//! Protocol Module
//!
//! Text command protocol for the hash operations.
//!
//! ### Commands
//! - `HSET key field value`           → integer (1 created, 0 overwritten)
//! - `HSETNX key field value`         → integer (1 written, 0 not set)
//! - `HGET key field`                 → bulk or nil
//! - `HMGET key field [field ...]`    → array
//! - `HMSET key field value [...]`    → OK
//! - `HDEL key field [field ...]`     → integer (fields removed)
//! - `HEXISTS key field`              → integer (0/1)
//! - `HGETALL key`                    → array of field, value, ...
//! - `HLEN key`                       → integer
//! - `HINCRBY key field delta`        → integer
//! - `HINCRBYFLOAT key field delta`   → float
//! - `HEXPIREAT key at`               → integer (0/1)
//! - `HPERSIST key`                   → integer (0/1)
//! - `PING`                           → PONG

mod command;
mod response;

pub use command::{Command, CommandType};
pub use response::Reply;
