//! # Resource Filters
//!
//! CEL expression evaluation for narrowing which resources a webhook
//! delivery annotates.
//!
//! Expressions see two variables:
//! - `resource`, the candidate object as a dynamic map (the JSON round-trip
//!   of the object is the defined shape)
//! - `request.body`, the JSON-decoded delivery body; an empty map when the
//!   request does not carry `application/json` content
//!
//! Beyond the CEL standard library, `split` is available on strings and
//! `first()` / `last()` on lists, the latter returning null for empty lists.

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use cel_interpreter::extractors::This;
use cel_interpreter::{Context, ExecutionError, Program, Value};
use kube::core::DynamicObject;
use serde_json::json;

use super::error::Error;

/// Statically validate a resource filter expression.
///
/// Intended for admission-time checks by the Receiver reconciler so invalid
/// expressions never reach the webhook server. Rejects syntax errors,
/// references to variables other than `resource` and `request`, and
/// expressions that produce a non-boolean result.
pub fn validate_expression(expr: &str) -> Result<(), Error> {
    let program = compile(expr)?;

    // Dry-run against an empty environment. Undeclared identifiers surface
    // as execution errors here; data-dependent failures (a key missing from
    // the empty body) cannot be decided statically and pass.
    let context = filter_context(&json!({}), &json!({}))?;
    match program.execute(&context) {
        Ok(Value::Bool(_)) => Ok(()),
        Ok(other) => Err(Error::Expression(format!(
            "expression '{expr}' must evaluate to a boolean, got {}",
            value_type(&other)
        ))),
        Err(ExecutionError::UndeclaredReference(name)) => Err(Error::Expression(format!(
            "undeclared reference to '{name}' in expression '{expr}'"
        ))),
        Err(_) => Ok(()),
    }
}

/// A compiled resource filter, built once per webhook delivery and applied
/// to every candidate resource.
pub struct ResourceFilter {
    program: Program,
    body: serde_json::Value,
}

impl ResourceFilter {
    /// Compile `expr` and capture the delivery body for evaluation.
    ///
    /// The body is decoded into `request.body` only when the Content-Type
    /// media type is `application/json` (parameters such as `charset` are
    /// allowed); any other content leaves the body as an empty map.
    pub fn new(expr: &str, headers: &HeaderMap, body: &[u8]) -> Result<Self, Error> {
        let program = compile(expr)?;
        let body = if is_json_content(headers) {
            serde_json::from_slice(body).map_err(|err| {
                Error::Expression(format!("failed to parse request body as JSON: {err}"))
            })?
        } else {
            json!({})
        };
        Ok(Self { program, body })
    }

    /// Evaluate the filter against one candidate resource.
    pub fn matches(&self, resource: &DynamicObject) -> Result<bool, Error> {
        let resource = serde_json::to_value(resource).map_err(|err| {
            Error::Expression(format!("failed to serialize resource for filtering: {err}"))
        })?;
        let context = filter_context(&resource, &self.body)?;
        match self.program.execute(&context) {
            Ok(Value::Bool(result)) => Ok(result),
            Ok(other) => Err(Error::Expression(format!(
                "expression did not return a boolean value, got {}",
                value_type(&other)
            ))),
            Err(err) => Err(Error::Expression(format!(
                "expression failed to evaluate: {err}"
            ))),
        }
    }
}

fn compile(expr: &str) -> Result<Program, Error> {
    Program::compile(expr)
        .map_err(|err| Error::Expression(format!("failed to parse expression '{expr}': {err}")))
}

fn filter_context(
    resource: &serde_json::Value,
    body: &serde_json::Value,
) -> Result<Context<'static>, Error> {
    let mut context = Context::default();
    context.add_function("split", split);
    context.add_function("first", list_first);
    context.add_function("last", list_last);
    context
        .add_variable("resource", resource)
        .map_err(|err| Error::Expression(format!("failed to bind 'resource': {err}")))?;
    context
        .add_variable("request", &json!({ "body": body }))
        .map_err(|err| Error::Expression(format!("failed to bind 'request': {err}")))?;
    Ok(context)
}

fn split(This(this): This<Arc<String>>, separator: Arc<String>) -> Result<Value, ExecutionError> {
    let parts = this
        .split(separator.as_str())
        .map(|part| Value::String(Arc::new(part.to_string())))
        .collect::<Vec<_>>();
    Ok(Value::List(Arc::new(parts)))
}

fn list_first(This(this): This<Value>) -> Result<Value, ExecutionError> {
    match this {
        Value::List(items) => Ok(items.first().cloned().unwrap_or(Value::Null)),
        other => Err(ExecutionError::function_error(
            "first",
            format!("cannot take the first element of a {}", value_type(&other)),
        )),
    }
}

fn list_last(This(this): This<Value>) -> Result<Value, ExecutionError> {
    match this {
        Value::List(items) => Ok(items.last().cloned().unwrap_or(Value::Null)),
        other => Err(ExecutionError::function_error(
            "last",
            format!("cannot take the last element of a {}", value_type(&other)),
        )),
    }
}

fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value.split(',').any(|part| {
                part.split(';')
                    .next()
                    .map(str::trim)
                    .is_some_and(|media| media.eq_ignore_ascii_case("application/json"))
            })
        })
        .unwrap_or(false)
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "bool",
        Value::Int(_) | Value::UInt(_) => "int",
        Value::Float(_) => "double",
        Value::String(_) => "string",
        Value::List(_) => "list",
        Value::Map(_) => "map",
        Value::Null => "null",
        _ => "value",
    }
}
