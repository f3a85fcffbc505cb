//! MySQL-protocol backend for the database frontend.

use crate::backend::{Backend, Rows, TextRow};
use crate::error::{DriverError, Error, Result};
use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder, Row, Value};
use std::fmt;
use std::time::Duration;

/// Default query port of the database frontend.
pub const DEFAULT_PORT: u16 = 9030;

/// Connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Frontend host name or address
    pub host: String,
    /// Query port
    pub port: u16,
    /// Login user
    pub username: String,
    /// Login password
    pub password: String,
    /// TCP connect timeout
    pub connect_timeout: Option<Duration>,
}

impl ConnectOptions {
    /// Options for `host` on the default port.
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: password.into(),
            connect_timeout: None,
        }
    }

    /// `host:port` for display and errors.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Backend holding one long-lived connection.
pub struct MysqlBackend {
    conn: Conn,
}

impl MysqlBackend {
    /// Open a connection.
    pub fn connect(options: &ConnectOptions) -> Result<Self> {
        let builder = OptsBuilder::new()
            .ip_or_hostname(Some(options.host.clone()))
            .tcp_port(options.port)
            .user(Some(options.username.clone()))
            .pass(Some(options.password.clone()))
            .tcp_connect_timeout(options.connect_timeout);

        log::debug!("Connecting to {}", options.address());
        let conn = Conn::new(builder).map_err(|e| Error::Connect {
            address: options.address(),
            source: driver_error(e),
        })?;

        Ok(Self { conn })
    }
}

impl Backend for MysqlBackend {
    fn execute(&mut self, statement: &str) -> std::result::Result<(), DriverError> {
        self.conn.query_drop(statement).map_err(driver_error)
    }

    fn query(&mut self, statement: &str) -> std::result::Result<Rows<'_>, DriverError> {
        let result = self.conn.query_iter(statement).map_err(driver_error)?;
        Ok(Box::new(result.map(|row| row.map(text_row).map_err(driver_error))))
    }
}

fn text_row(row: Row) -> TextRow {
    let columns = row
        .columns_ref()
        .iter()
        .map(|column| column.name_str().into_owned())
        .collect();
    let values = row.unwrap().into_iter().map(text_value).collect();
    TextRow::with_columns(columns, values)
}

fn text_value(value: Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        other => Some(other.as_sql(true)),
    }
}

fn driver_error(error: mysql::Error) -> DriverError {
    match error {
        mysql::Error::MySqlError(e) => DriverError::server(e.code, e.message),
        other => DriverError::transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_options_defaults() {
        let options = ConnectOptions::new("fe.example.com", "root", "secret");
        assert_eq!(options.port, 9030);
        assert_eq!(options.address(), "fe.example.com:9030");
    }

    #[test]
    fn test_debug_redacts_password() {
        let options = ConnectOptions::new("fe", "root", "hunter2");
        let debug = format!("{options:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_text_value() {
        assert_eq!(text_value(Value::NULL), None);
        assert_eq!(
            text_value(Value::Bytes(b"80.0%".to_vec())),
            Some("80.0%".to_string())
        );
        assert_eq!(text_value(Value::Int(42)), Some("42".to_string()));
    }
}
