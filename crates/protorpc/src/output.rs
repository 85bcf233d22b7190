use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Emitted once the server is accepting connections.
#[derive(Serialize)]
pub struct ListeningOutput {
    pub event: &'static str,
    pub endpoint: String,
    pub methods: Vec<String>,
}

/// Result of a single `call`.
#[derive(Serialize)]
pub struct CallOutput {
    pub method: String,
    pub endpoint: String,
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn print_listening(out: &ListeningOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ENDPOINT", "METHODS"])
                .add_row(vec![out.endpoint.clone(), out.methods.join(", ")]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("listening on {} ({})", out.endpoint, out.methods.join(", "));
        }
    }
}

pub fn print_call(out: &CallOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["METHOD", "ENDPOINT", "TIME", "RESULT"])
                .add_row(vec![
                    out.method.clone(),
                    out.endpoint.clone(),
                    format!("{:.2}ms", out.elapsed_ms),
                    outcome_text(out),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "method={} endpoint={} time={:.2}ms {}",
                out.method,
                out.endpoint,
                out.elapsed_ms,
                outcome_text(out)
            );
        }
    }
}

fn outcome_text(out: &CallOutput) -> String {
    match (&out.result, &out.error) {
        (_, Some(error)) => format!("error: {error}"),
        (Some(result), None) => result.to_string(),
        (None, None) => "-".to_string(),
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_output() -> CallOutput {
        CallOutput {
            method: "Arith.Multiply".to_string(),
            endpoint: "tcp://127.0.0.1:1".to_string(),
            elapsed_ms: 0.5,
            result: Some(serde_json::json!({ "val": 56 })),
            error: None,
        }
    }

    #[test]
    fn success_omits_error_field() {
        let json = serde_json::to_string(&call_output()).unwrap();
        assert!(json.contains("\"result\":{\"val\":56}"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn error_takes_precedence_in_text() {
        let mut out = call_output();
        out.result = None;
        out.error = Some("divide by zero".to_string());
        assert_eq!(outcome_text(&out), "error: divide by zero");
    }
}
