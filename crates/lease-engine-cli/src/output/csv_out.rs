use serde_json::{Map, Value};
use std::io;

/// Write output as CSV to stdout.
///
/// Arrays of rows (schedules, rental periods) become one record per row.
/// A result object becomes `field,value` pairs with nested objects
/// flattened into dotted field names; row arrays inside it are left to the
/// `schedule` and `rental-periods` commands.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result {
        Value::Object(map) => {
            let _ = wtr.write_record(["field", "value"]);
            let mut pairs = Vec::new();
            flatten("", map, &mut pairs);
            for (key, val) in pairs {
                let _ = wtr.write_record([key.as_str(), val.as_str()]);
            }
        }
        Value::Array(arr) => write_array_csv(&mut wtr, arr),
        other => {
            let _ = wtr.write_record([&format_csv_value(other)]);
        }
    }

    let _ = wtr.flush();
}

fn flatten(prefix: &str, map: &Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (key, val) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match val {
            Value::Object(inner) => flatten(&name, inner, out),
            Value::Array(arr) if arr.iter().any(|v| v.is_object()) => {}
            _ => out.push((name, format_csv_value(val))),
        }
    }
}

fn write_array_csv(wtr: &mut csv::Writer<io::StdoutLock<'_>>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_uses_dotted_names_and_skips_rows() {
        let v = serde_json::json!({
            "lease_id": "A",
            "closing": {"lease_liability": "10.00"},
            "schedule": [{"date": "2024-01-01"}]
        });
        let mut pairs = Vec::new();
        flatten("", v.as_object().unwrap(), &mut pairs);
        assert_eq!(
            pairs,
            vec![
                ("closing.lease_liability".to_string(), "10.00".to_string()),
                ("lease_id".to_string(), "A".to_string()),
            ]
        );
    }
}
