//! Built-in methods served by the standalone binary.

use chrono::Utc;
use xrpc_http::MethodRegistry;
use xrpc_model::{Fault, Value};

/// Build the registry of built-in methods.
///
/// `system.listMethods` reports every name registered here, itself included.
pub fn builtin_registry() -> MethodRegistry {
    let mut registry = MethodRegistry::new()
        .with_method("echo", |params: Vec<Value>| async move { Ok(echo(params)) })
        .with_method("sum", |params: Vec<Value>| async move { sum(&params) })
        .with_method("now", |_params: Vec<Value>| async move {
            Ok(Value::from(Utc::now()))
        });

    let mut names = registry.method_names();
    names.push("system.listMethods".to_owned());
    names.sort_unstable();
    registry.register("system.listMethods", move |_params: Vec<Value>| {
        let names = names.clone();
        async move { Ok(Value::from(names)) }
    });

    registry
}

/// A single parameter comes back as itself; several come back as an array.
fn echo(mut params: Vec<Value>) -> Value {
    if params.len() == 1 {
        params.pop().unwrap_or_default()
    } else {
        Value::Array(params)
    }
}

/// Add integers exactly and anything else as doubles.
fn sum(params: &[Value]) -> Result<Value, Fault> {
    let mut int_total: i64 = 0;
    let mut float_total: Option<f64> = None;

    for (i, param) in params.iter().enumerate() {
        if let Some(n) = param.as_i64() {
            int_total = int_total
                .checked_add(n)
                .ok_or_else(|| Fault::new(Fault::INTERNAL_ERROR, "integer overflow"))?;
        } else if let Some(d) = param.as_f64() {
            *float_total.get_or_insert(0.0) += d;
        } else {
            return Err(Fault::new(
                Fault::INTERNAL_ERROR,
                format!("param {i} is a {}, not a number", param.type_name()),
            ));
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let total = match float_total {
        Some(d) => Value::Double(d + int_total as f64),
        None => Value::from(int_total),
    };
    Ok(total)
}
