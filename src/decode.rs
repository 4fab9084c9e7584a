use serde::de::DeserializeOwned;

use crate::{CertifierError, LogMessage};

pub(crate) fn decode_json<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, CertifierError> {
    serde_json::from_str::<T>(body)
        .map_err(|err| CertifierError::Decode(format!("invalid {what} JSON: {err}; body: {body}")))
}

/// Decodes the newline-delimited JSON stream served by `/system/logs`.
pub(crate) fn decode_log_stream(body: &str) -> Result<Vec<LogMessage>, CertifierError> {
    serde_json::Deserializer::from_str(body)
        .into_iter::<LogMessage>()
        .enumerate()
        .map(|(index, message)| {
            message.map_err(|err| {
                CertifierError::Decode(format!("failed to parse log message {index}: {err}"))
            })
        })
        .collect()
}

/// Strips the leading timestamp and padding the watchdog writes before each
/// log line, e.g. `2024/01/02 03:04:05 Forking fprocess.`.
pub fn strip_log_timestamp(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '/' | ':' | ' '))
}

#[cfg(test)]
mod tests {
    use super::{decode_json, decode_log_stream, strip_log_timestamp};
    use crate::{CertifierError, FunctionStatus};

    #[test]
    fn log_stream_decodes_every_line() {
        let body = concat!(
            r#"{"name":"test-logger","namespace":"openfaas-fn","instance":"a","timestamp":"t1","text":"Forking fprocess."}"#,
            "\n",
            r#"{"name":"test-logger","text":"Wrote 132 Bytes - Duration: 0.001s"}"#,
            "\n"
        );
        let lines = decode_log_stream(body).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].namespace.as_deref(), Some("openfaas-fn"));
        assert_eq!(lines[1].text, "Wrote 132 Bytes - Duration: 0.001s");
    }

    #[test]
    fn empty_log_stream_is_empty() {
        assert!(decode_log_stream("").unwrap().is_empty());
    }

    #[test]
    fn broken_log_line_reports_index() {
        let body = "{\"name\":\"a\",\"text\":\"x\"}\n{\"name\":";
        match decode_log_stream(body) {
            Err(CertifierError::Decode(message)) => assert!(message.contains("message 1")),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_json_includes_body() {
        let err = decode_json::<FunctionStatus>("nope", "function status").unwrap_err();
        assert!(err.to_string().contains("body: nope"));
    }

    #[test]
    fn timestamp_prefix_is_removed() {
        assert_eq!(
            strip_log_timestamp("2024/01/02 03:04:05 Forking fprocess."),
            "Forking fprocess."
        );
        assert_eq!(strip_log_timestamp("Wrote 132 Bytes"), "Wrote 132 Bytes");
    }
}
