use regex::{NoExpand, Regex};
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Field names considered personally identifiable in log output.
pub const PII_FIELDS: [&str; 5] = ["name", "email", "phone", "ssn", "password"];

pub const DEFAULT_MASK: &str = "***";

/// Masks the value of every `field=value` occurrence in `line`. Values run
/// until the next `separator` or the end of the string; absent fields are
/// left untouched. Fields are applied in the given order.
pub fn redact(fields: &[&str], mask: &str, line: &str, separator: &str) -> String {
    Redactor::new(fields, mask, separator).apply(line)
}

/// Compiled form of [`redact`] for repeated use on log lines.
pub struct Redactor {
    rules: Vec<(Regex, String)>,
}

impl Redactor {
    /// Rules for `field=value` lines with the given separator.
    pub fn new(fields: &[&str], mask: &str, separator: &str) -> Self {
        let rules = fields
            .iter()
            .map(|field| {
                let pattern = format!(
                    "{}=[^{}]+",
                    regex::escape(field),
                    regex::escape(separator)
                );
                let re = Regex::new(&pattern).expect("escaped field pattern compiles");
                (re, format!("{field}={mask}"))
            })
            .collect();
        Self { rules }
    }

    /// Rules for the JSON formatter's `"field":"value"` pairs. Values with
    /// escaped quotes are cut at the first quote, which over-masks rather
    /// than leaks.
    pub fn new_json(fields: &[&str], mask: &str) -> Self {
        let rules = fields
            .iter()
            .map(|field| {
                let pattern = format!("\"{}\":\"[^\"]*\"", regex::escape(field));
                let re = Regex::new(&pattern).expect("escaped field pattern compiles");
                (re, format!("\"{field}\":\"{mask}\""))
            })
            .collect();
        Self { rules }
    }

    pub fn apply(&self, line: &str) -> String {
        let mut out = line.to_string();
        for (re, replacement) in &self.rules {
            out = re.replace_all(&out, NoExpand(replacement)).into_owned();
        }
        out
    }
}

/// `MakeWriter` that masks PII fields in formatted log lines before they
/// reach stdout. The tracing fmt layer separates fields with spaces in text
/// mode and emits `"field":"value"` pairs in JSON mode; the rules follow
/// whichever format is installed.
#[derive(Clone)]
pub struct RedactingWriter {
    redactor: Arc<Redactor>,
}

impl RedactingWriter {
    pub fn new(redactor: Redactor) -> Self {
        Self {
            redactor: Arc::new(redactor),
        }
    }

    /// Field list from `LOG_REDACT_FIELDS` (comma-separated), falling back
    /// to [`PII_FIELDS`]. `json_logs` must match the formatter the writer
    /// is installed under.
    pub fn from_env(json_logs: bool) -> Self {
        let fields = std::env::var("LOG_REDACT_FIELDS")
            .map(|v| {
                v.split(',')
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|_| PII_FIELDS.iter().map(|f| f.to_string()).collect());
        let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
        let redactor = if json_logs {
            Redactor::new_json(&refs, DEFAULT_MASK)
        } else {
            Redactor::new(&refs, DEFAULT_MASK, " ")
        };
        Self::new(redactor)
    }
}

impl<'a> MakeWriter<'a> for RedactingWriter {
    type Writer = RedactingStdout;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingStdout {
            redactor: self.redactor.clone(),
            buf: Vec::new(),
        }
    }
}

/// Buffers one formatted event, redacts it on flush, then writes to stdout.
pub struct RedactingStdout {
    redactor: Arc<Redactor>,
    buf: Vec<u8>,
}

impl Write for RedactingStdout {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&self.buf);
        let redacted = self.redactor.apply(&line);
        self.buf.clear();
        let mut stdout = io::stdout().lock();
        stdout.write_all(redacted.as_bytes())?;
        stdout.flush()
    }
}

impl Drop for RedactingStdout {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_a_single_field() {
        let out = redact(&["password"], "***", "name=a;password=secret;", ";");
        assert_eq!(out, "name=a;password=***;");
    }

    #[test]
    fn masks_multiple_fields_in_order() {
        let line = "name=bob;email=bob@example.com;phone=123;job=dev;";
        let out = redact(&["name", "email", "phone"], "xxx", line, ";");
        assert_eq!(out, "name=xxx;email=xxx;phone=xxx;job=dev;");
    }

    #[test]
    fn absent_field_is_a_no_op() {
        let line = "name=a;job=dev;";
        assert_eq!(redact(&["ssn"], "***", line, ";"), line);
    }

    #[test]
    fn masks_value_at_end_of_string() {
        let out = redact(&["password"], "***", "password=hunter2", ";");
        assert_eq!(out, "password=***");
    }

    #[test]
    fn mask_with_dollar_sign_is_literal() {
        let out = redact(&["password"], "$1", "password=secret;", ";");
        assert_eq!(out, "password=$1;");
    }

    #[test]
    fn redactor_handles_space_separated_tracing_fields() {
        let redactor = Redactor::new(&["email", "password"], "***", " ");
        let line = "INFO register: email=a@b.c password=secret done";
        assert_eq!(
            redactor.apply(line),
            "INFO register: email=*** password=*** done"
        );
    }

    #[test]
    fn json_rules_mask_formatter_output() {
        let redactor = Redactor::new_json(&["email", "password"], "***");
        let line = r#"{"timestamp":"t","level":"INFO","fields":{"email":"a@b.c","password":"secret","message":"user logged in"}}"#;
        assert_eq!(
            redactor.apply(line),
            r#"{"timestamp":"t","level":"INFO","fields":{"email":"***","password":"***","message":"user logged in"}}"#
        );
    }

    #[test]
    fn json_rules_leave_other_keys_alone() {
        let redactor = Redactor::new_json(&["ssn"], "***");
        let line = r#"{"fields":{"user_id":"42","message":"ok"}}"#;
        assert_eq!(redactor.apply(line), line);
    }

    #[test]
    fn text_rules_do_not_apply_to_json_and_vice_versa() {
        let json_line = r#"{"fields":{"email":"a@b.c"}}"#;
        let text = Redactor::new(&["email"], "***", " ");
        assert_eq!(text.apply(json_line), json_line);

        let text_line = "email=a@b.c done";
        let json = Redactor::new_json(&["email"], "***");
        assert_eq!(json.apply(text_line), text_line);
    }
}
