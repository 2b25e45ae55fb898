pub mod config;
pub mod file;
pub mod stdin;

use serde_json::Value;

/// Input from `--input`, falling back to piped stdin.
pub fn read_input(path: Option<&str>, what: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(p) = path {
        file::read_value(p)
    } else if let Some(data) = stdin::read_stdin()? {
        Ok(data)
    } else {
        Err(format!("--input <file.json|file.yaml> or stdin required for {what}").into())
    }
}
