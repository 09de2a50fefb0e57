//! Common test utilities for GraphQL observability testing
//!
//! Request builders for the demo router and helpers to read samples out of
//! the Prometheus exposition format.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request},
    response::Response,
};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

/// Build a JSON GraphQL POST request
pub fn graphql_request(uri: &str, query: &str, variables: Option<serde_json::Value>) -> Request<Body> {
    let mut body = serde_json::json!({ "query": query });
    if let Some(variables) = variables {
        body["variables"] = variables;
    }

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read a response body as JSON
pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read a response body as text
pub async fn text_body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// In-memory writer for capturing `tracing` JSON output
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    /// Parsed JSON events emitted to `target`
    pub fn events_for(&self, target: &str) -> Vec<serde_json::Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
            .filter(|event| event["target"] == target)
            .collect()
    }
}

/// Extract metric value from a Prometheus output line
/// Example: `metric_name{label1="value1"} 42.5` -> Some(42.5)
pub fn extract_metric_value(line: &str) -> Option<f64> {
    line.split_whitespace().last()?.parse::<f64>().ok()
}

/// Extract labels from a Prometheus metric line
/// Example: `metric{a="1",b="2"}` -> HashMap{"a" -> "1", "b" -> "2"}
pub fn extract_labels(line: &str) -> HashMap<String, String> {
    let mut labels = HashMap::new();

    if let (Some(start), Some(end)) = (line.find('{'), line.rfind('}')) {
        for pair in line[start + 1..end].split("\",") {
            if let Some((key, value)) = pair.split_once('=') {
                labels.insert(
                    key.trim().to_string(),
                    value.trim().trim_matches('"').to_string(),
                );
            }
        }
    }

    labels
}

/// Value of the sample `name` whose labels include all of `labels`
pub fn sample_value(output: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    output
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.split(|c| c == '{' || c == ' ')
                .next()
                .map(|metric| metric == name)
                .unwrap_or(false)
        })
        .find(|line| {
            let found = extract_labels(line);
            labels
                .iter()
                .all(|(key, value)| found.get(*key).map(String::as_str) == Some(*value))
        })
        .and_then(extract_metric_value)
}

/// Validate that a Prometheus exposition format output is well-formed
pub fn validate_exposition_format(output: &str) -> Result<(), String> {
    let lines: Vec<&str> = output.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        let line = line.trim();

        if line.starts_with("# HELP") {
            let help_parts: Vec<&str> = line.split_whitespace().collect();
            if help_parts.len() < 4 {
                return Err(format!("Line {}: Invalid HELP format", i + 1));
            }

            let metric_name = help_parts[2];
            let next_line = lines.get(i + 1).map(|l| l.trim()).unwrap_or_default();
            if !next_line.starts_with(&format!("# TYPE {} ", metric_name)) {
                return Err(format!(
                    "Line {}: HELP not followed by TYPE for metric {}",
                    i + 1,
                    metric_name
                ));
            }
        }

        if line.starts_with("# TYPE") {
            let type_parts: Vec<&str> = line.split_whitespace().collect();
            let valid_types = ["counter", "gauge", "histogram", "summary", "untyped"];
            match type_parts.get(3) {
                Some(metric_type) if valid_types.contains(metric_type) => {}
                _ => return Err(format!("Line {}: Invalid TYPE line", i + 1)),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_labels() {
        let labels = extract_labels(
            "graphql_requests_total{operation_name=\"devices,locations\",operation_type=\"query\",status=\"success\"} 3",
        );
        assert_eq!(labels.get("operation_name").map(String::as_str), Some("devices,locations"));
        assert_eq!(labels.get("status").map(String::as_str), Some("success"));
        assert!(extract_labels("metric_without_labels 1").is_empty());
    }

    #[test]
    fn test_sample_value() {
        let output = "# HELP m Help\n# TYPE m counter\nm{a=\"1\",b=\"x\"} 2\nm{a=\"2\",b=\"x\"} 5\nm_other{a=\"2\"} 9";
        assert_eq!(sample_value(output, "m", &[("a", "2")]), Some(5.0));
        assert_eq!(sample_value(output, "m", &[("a", "3")]), None);
    }

    #[test]
    fn test_validate_exposition_format() {
        let valid = "# HELP test_metric Test metric\n# TYPE test_metric counter\ntest_metric 1";
        assert!(validate_exposition_format(valid).is_ok());

        let invalid = "# HELP test_metric Test metric\ntest_metric 1";
        assert!(validate_exposition_format(invalid).is_err());
    }
}
