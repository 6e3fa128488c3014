//! Command-line arguments for each terraform subcommand.

use serde_json::Value;

use crate::options::TerraformOptions;

/// Render a variable value the way `-var` expects it.
///
/// Strings are passed raw; lists and maps use HCL literal syntax with
/// quoted strings inside.
pub fn format_var_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => format_hcl(other),
    }
}

fn format_hcl(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::Array(items) => {
            let items: Vec<_> = items.iter().map(format_hcl).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let entries: Vec<_> = map
                .iter()
                .map(|(k, v)| format!("{} = {}", k, format_hcl(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

/// `-var key=value` pairs in key order.
pub fn vars_as_args(options: &TerraformOptions) -> Vec<String> {
    let mut args = Vec::with_capacity(options.vars.len() * 2);
    for (name, value) in &options.vars {
        args.push("-var".to_string());
        args.push(format!("{}={}", name, format_var_value(value)));
    }
    args
}

fn push_common(args: &mut Vec<String>, options: &TerraformOptions) {
    if options.no_color {
        args.push("-no-color".to_string());
    }
}

fn lock_arg(options: &TerraformOptions) -> String {
    format!("-lock={}", options.lock)
}

pub fn init_args(options: &TerraformOptions) -> Vec<String> {
    let mut args = vec![
        "init".to_string(),
        "-upgrade=false".to_string(),
        "-input=false".to_string(),
    ];
    for (key, value) in &options.backend_config {
        args.push(format!("-backend-config={}={}", key, value));
    }
    push_common(&mut args, options);
    args
}

pub fn plan_args(options: &TerraformOptions) -> Vec<String> {
    let mut args = vec![
        "plan".to_string(),
        "-input=false".to_string(),
        lock_arg(options),
    ];
    args.extend(vars_as_args(options));
    push_common(&mut args, options);
    args
}

pub fn apply_args(options: &TerraformOptions) -> Vec<String> {
    let mut args = vec![
        "apply".to_string(),
        "-auto-approve".to_string(),
        "-input=false".to_string(),
        lock_arg(options),
    ];
    args.extend(vars_as_args(options));
    push_common(&mut args, options);
    args
}

pub fn destroy_args(options: &TerraformOptions) -> Vec<String> {
    let mut args = vec![
        "destroy".to_string(),
        "-auto-approve".to_string(),
        "-input=false".to_string(),
        lock_arg(options),
    ];
    args.extend(vars_as_args(options));
    push_common(&mut args, options);
    args
}

pub fn validate_args(options: &TerraformOptions) -> Vec<String> {
    let mut args = vec!["validate".to_string()];
    push_common(&mut args, options);
    args
}
