//! JSON output for scripts: pretty by default, one line in compact mode.

use super::OutputConfig;
use serde::Serialize;

pub struct JsonOutput;

impl JsonOutput {
    pub fn format<T: Serialize + ?Sized>(data: &T, config: &OutputConfig) -> String {
        let rendered = if config.compact {
            serde_json::to_string(data)
        } else {
            serde_json::to_string_pretty(data)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}
