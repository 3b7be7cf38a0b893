//! Reply validation
//!
//! Every reply passes the same two gates (HTTP 200, reply `status` 200 when
//! present) and then the operation-specific [`Expectation`].

use serde_json::Value;

use crate::error::{GateKeyError, Result};
use crate::types::Reply;

/// Success marker carried in `info`
pub const SUCCESS_INFO: &str = "success";

/// What a successful reply must contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// Status checks only; yields `Value::Null`
    StatusOk,
    /// Reply `status` must be present and 200; yields `Value::Null`
    Status,
    /// Named field present and truthy; yields the field
    Field(&'static str),
    /// `info == "success"`; yields `data`, or `Value::Null` when absent
    Success,
    /// `info == "success"` and `data` truthy; yields `data`
    SuccessWithData,
}

/// Check a reply against an expectation and extract the payload
pub fn validate(reply: Reply, expectation: Expectation) -> Result<Value> {
    if reply.http_status != 200 {
        return Err(GateKeyError::Transport {
            status: reply.http_status,
            body: reply.body.to_string(),
        });
    }

    let mut body = reply.body;

    if let Some(status) = body.get("status") {
        if !is_status_ok(status) {
            return Err(GateKeyError::Server(info_text(&body)));
        }
    }

    match expectation {
        Expectation::StatusOk => Ok(Value::Null),
        Expectation::Status => match body.get("status") {
            Some(_) => Ok(Value::Null),
            None => Err(GateKeyError::UnexpectedResponse("status".into())),
        },
        Expectation::Field(name) => take_truthy(&mut body, name),
        Expectation::Success => {
            require_success(&body)?;
            Ok(body.get_mut("data").map(Value::take).unwrap_or(Value::Null))
        }
        Expectation::SuccessWithData => {
            require_success(&body)?;
            take_truthy(&mut body, "data")
        }
    }
}

/// Validate and require a string payload
pub fn validate_string(reply: Reply, expectation: Expectation) -> Result<String> {
    let field = match expectation {
        Expectation::Field(name) => name,
        _ => "data",
    };
    match validate(reply, expectation)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(GateKeyError::UnexpectedResponse(field.to_string())),
    }
}

/// PHP-style truthiness as the service applies it
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn is_status_ok(status: &Value) -> bool {
    match status {
        Value::Number(n) => n.as_u64() == Some(200),
        Value::String(s) => s.trim() == "200",
        _ => false,
    }
}

fn require_success(body: &Value) -> Result<()> {
    match body.get("info") {
        Some(Value::String(info)) if info == SUCCESS_INFO => Ok(()),
        Some(_) => Err(GateKeyError::Server(info_text(body))),
        None => Err(GateKeyError::UnexpectedResponse("info".into())),
    }
}

fn take_truthy(body: &mut Value, name: &str) -> Result<Value> {
    match body.get_mut(name) {
        Some(value) if is_truthy(value) => Ok(value.take()),
        _ => Err(GateKeyError::UnexpectedResponse(name.to_string())),
    }
}

/// `info` as text, falling back to the whole body
fn info_text(body: &Value) -> String {
    match body.get("info") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => body.to_string(),
    }
}
