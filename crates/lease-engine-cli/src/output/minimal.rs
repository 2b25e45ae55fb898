use serde_json::Value;

/// Key answer for each result shape, as paths into the result object.
const PRIORITY_PATHS: [&str; 6] = [
    "lease_result.closing.lease_liability",
    "aggregated_totals.closing.lease_liability",
    "usgaap_classification",
    "closing.lease_liability",
    "lease_liability",
    "amount",
];

/// Print just the key answer value from the output.
///
/// Looks up well-known result paths in order of priority, then falls back
/// to the first field in the result object.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    // Arrays (schedule rows, rental periods) report on their last element
    let target = match result_obj {
        Value::Array(items) => items.last().unwrap_or(result_obj),
        other => other,
    };

    for path in &PRIORITY_PATHS {
        if let Some(val) = lookup(target, path) {
            if !val.is_null() {
                println!("{}", format_minimal(val));
                return;
            }
        }
    }

    if let Value::Object(map) = target {
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(target));
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, key| v.get(key))
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
