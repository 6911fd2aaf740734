//! Classification of worker output into coarse progress updates.
//!
//! Workers that speak the structured protocol emit one JSON object per line:
//!
//! ```text
//! {"auditflow": 1, "event": "progress", "percent": 40, "message": "Reading registrar"}
//! {"auditflow": 1, "event": "log", "level": "warning", "message": "Blank PAN rows"}
//! {"auditflow": 1, "event": "result", "success": true}
//! ```
//!
//! Anything else goes through the legacy substring sniffer. Neither path
//! decides when a run ends; only the process exit does.

use serde::Deserialize;

use crate::scripting::executor::{OutputLine, StreamKind};

/// Version of the line protocol understood by [`classify_line`].
pub const PROTOCOL_VERSION: u32 = 1;

/// Legacy bucket for stdout lines containing `ERROR`.
pub const ERROR_PERCENT: u8 = 90;
/// Legacy bucket for any stderr line.
pub const STDERR_PERCENT: u8 = 50;
/// Legacy bucket for stdout lines containing `WARNING`.
pub const WARNING_PERCENT: u8 = 30;
/// Legacy bucket for stdout lines containing `INFO`.
pub const INFO_PERCENT: u8 = 20;
/// Legacy bucket for unmatched stdout lines.
pub const DEFAULT_PERCENT: u8 = 10;

/// The coarse reading of one line of worker output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Suggested percentage. `None` leaves progress where it is.
    pub percent: Option<u8>,
    pub message: Option<String>,
    /// Error detail to surface alongside the message.
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    auditflow: u32,
    #[serde(flatten)]
    record: WorkerRecord,
}

/// One structured record emitted by a protocol-aware worker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerRecord {
    Progress {
        /// Any JSON number; clamped to `0..=100` when classified.
        percent: f64,
        #[serde(default)]
        message: Option<String>,
    },
    Log {
        level: LogLevel,
        message: String,
    },
    Result {
        success: bool,
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Parse a structured protocol record. Returns `None` for plain text,
/// malformed JSON and unsupported protocol versions.
pub fn parse_record(line: &str) -> Option<WorkerRecord> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let envelope: Envelope = serde_json::from_str(trimmed).ok()?;
    if envelope.auditflow != PROTOCOL_VERSION {
        tracing::debug!(
            version = envelope.auditflow,
            "Unsupported worker protocol version, falling back to text sniffing",
        );
        return None;
    }
    Some(envelope.record)
}

/// Classify one line of worker output.
pub fn classify_line(line: &OutputLine) -> Classification {
    if line.stream == StreamKind::Stdout {
        if let Some(record) = parse_record(&line.text) {
            return classify_record(record);
        }
    }
    sniff(line)
}

fn classify_record(record: WorkerRecord) -> Classification {
    match record {
        WorkerRecord::Progress { percent, message } => Classification {
            percent: Some(clamp_percent(percent)),
            message: Some(message.unwrap_or_else(|| "Processing...".to_string())),
            error: None,
        },
        WorkerRecord::Log { level, message } => {
            let percent = match level {
                LogLevel::Debug => None,
                LogLevel::Info => Some(INFO_PERCENT),
                LogLevel::Warning => Some(WARNING_PERCENT),
                LogLevel::Error => Some(ERROR_PERCENT),
            };
            let error = (level == LogLevel::Error).then(|| message.clone());
            Classification {
                percent,
                message: Some(message),
                error,
            }
        }
        WorkerRecord::Result { success, message } => {
            let fallback = if success {
                "Worker reported success"
            } else {
                "Worker reported failure"
            };
            Classification {
                percent: None,
                message: Some(message.unwrap_or_else(|| fallback.to_string())),
                error: None,
            }
        }
    }
}

/// Whole percent in `0..=100`, rounded down.
fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).floor() as u8
}

/// Legacy substring classification, kept for workers that print free text.
fn sniff(line: &OutputLine) -> Classification {
    let text = &line.text;
    match line.stream {
        StreamKind::Stderr => Classification {
            percent: Some(STDERR_PERCENT),
            message: Some("Error output received".to_string()),
            error: Some(text.clone()),
        },
        StreamKind::Stdout if text.contains("ERROR") => Classification {
            percent: Some(ERROR_PERCENT),
            message: Some("Worker reported an error".to_string()),
            error: Some(text.trim().to_string()),
        },
        StreamKind::Stdout if text.contains("WARNING") => Classification {
            percent: Some(WARNING_PERCENT),
            message: Some("Warning encountered".to_string()),
            error: None,
        },
        StreamKind::Stdout if text.contains("INFO") => Classification {
            percent: Some(INFO_PERCENT),
            message: Some("Processing...".to_string()),
            error: None,
        },
        StreamKind::Stdout => Classification {
            percent: Some(DEFAULT_PERCENT),
            message: Some(text.trim().to_string()),
            error: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stdout(text: &str) -> OutputLine {
        OutputLine::new(StreamKind::Stdout, text)
    }

    #[test]
    fn structured_progress_record() {
        let c = classify_line(&stdout(
            r#"{"auditflow": 1, "event": "progress", "percent": 42, "message": "Reading"}"#,
        ));
        assert_eq!(c.percent, Some(42));
        assert_eq!(c.message.as_deref(), Some("Reading"));
    }

    #[test]
    fn structured_percent_is_capped() {
        let c = classify_line(&stdout(
            r#"{"auditflow": 1, "event": "progress", "percent": 250}"#,
        ));
        assert_eq!(c.percent, Some(100));
    }

    #[test]
    fn structured_percent_out_of_u8_range_is_clamped() {
        let c = classify_line(&stdout(
            r#"{"auditflow": 1, "event": "progress", "percent": 300, "message": "Almost"}"#,
        ));
        assert_eq!(c.percent, Some(100));
        assert_eq!(c.message.as_deref(), Some("Almost"));

        let c = classify_line(&stdout(
            r#"{"auditflow": 1, "event": "progress", "percent": -5}"#,
        ));
        assert_eq!(c.percent, Some(0));
    }

    #[test]
    fn fractional_percent_is_rounded_down() {
        let c = classify_line(&stdout(
            r#"{"auditflow": 1, "event": "progress", "percent": 42.5, "message": "Reading"}"#,
        ));
        assert_eq!(c.percent, Some(42));
        assert_eq!(c.message.as_deref(), Some("Reading"));
    }

    #[test]
    fn structured_error_log_carries_detail() {
        let c = classify_line(&stdout(
            r#"{"auditflow": 1, "event": "log", "level": "error", "message": "sheet missing"}"#,
        ));
        assert_eq!(c.percent, Some(ERROR_PERCENT));
        assert_eq!(c.error.as_deref(), Some("sheet missing"));
    }

    #[test]
    fn result_record_does_not_move_progress() {
        let c = classify_line(&stdout(r#"{"auditflow": 1, "event": "result", "success": true}"#));
        assert_eq!(c.percent, None);
    }

    #[test]
    fn unknown_protocol_version_falls_back_to_sniffing() {
        assert_eq!(
            parse_record(r#"{"auditflow": 2, "event": "progress", "percent": 5}"#),
            None
        );
        let c = classify_line(&stdout(r#"{"auditflow": 2, "event": "progress", "percent": 5}"#));
        assert_eq!(c.percent, Some(DEFAULT_PERCENT));
    }

    #[test]
    fn legacy_success_json_is_plain_text() {
        assert_eq!(parse_record(r#"{"success": true}"#), None);
    }

    #[test]
    fn sniffs_legacy_markers() {
        assert_eq!(
            classify_line(&stdout("2025-01-01 - ERROR - boom")).percent,
            Some(ERROR_PERCENT)
        );
        assert_eq!(
            classify_line(&stdout("FATAL ERROR: bad input")).percent,
            Some(ERROR_PERCENT)
        );
        assert_eq!(
            classify_line(&stdout("WARNING: blank rows")).percent,
            Some(WARNING_PERCENT)
        );
        assert_eq!(
            classify_line(&stdout("INFO loading")).percent,
            Some(INFO_PERCENT)
        );

        let plain = classify_line(&stdout("  loaded 120 rows \n"));
        assert_eq!(plain.percent, Some(DEFAULT_PERCENT));
        assert_eq!(plain.message.as_deref(), Some("loaded 120 rows"));
    }

    #[test]
    fn stderr_is_never_parsed_as_protocol() {
        let line = OutputLine::new(
            StreamKind::Stderr,
            r#"{"auditflow": 1, "event": "progress", "percent": 80}"#,
        );
        let c = classify_line(&line);
        assert_eq!(c.percent, Some(STDERR_PERCENT));
        assert!(c.error.is_some());
    }
}
