//! Classification of borg output
//!
//! Failure text is matched against three shapes in priority order: the
//! argparse usage banner, the `--log-json` structured error object, and
//! an unknown-output fallback. Success payloads decode into the typed
//! schemas in [`super::types`]; a schema mismatch there is its own
//! error, distinct from a process failure.

use serde::de::DeserializeOwned;

use super::types::ErrorMessage;
use crate::error::{Error, BORG_CODE_PREFIX};

/// Marker line prefix of borg's usage/help banner.
pub const USAGE_MARKER: &str = "usage: borg";

/// Validation error surfaced verbatim rather than generalized.
const ENCRYPTION_ARG_MARKER: &str = "argument -e/--encryption";

const GENERIC_USAGE_MESSAGE: &str = "Invalid command or arguments.";
const UNKNOWN_MESSAGE: &str = "Unknown error.";
const UNKNOWN_MSGID: &str = "Unknown.Error.";

/// Classify stderr from a failed borg invocation.
#[must_use]
pub fn classify_failure(stderr: &str) -> Error {
    if stderr.contains(USAGE_MARKER) {
        return usage_error(stderr);
    }

    if let Some(error) = structured_error(stderr) {
        return error;
    }

    tracing::error!(raw = %stderr, "unrecognized borg failure output");
    Error::UnknownOutput {
        raw: stderr.to_string(),
    }
}

/// Decode stdout from a successful invocation into the expected schema.
///
/// # Errors
/// Returns [`Error::UnexpectedOutput`] when the payload does not match.
pub fn decode<T: DeserializeOwned>(stdout: &str) -> Result<T, Error> {
    serde_json::from_str(stdout).map_err(|err| Error::UnexpectedOutput(err.to_string()))
}

/// The human-relevant line of the banner is the second-to-last `\n`
/// segment. argparse terminates stderr with a newline, so the final
/// segment is empty and the error line sits just before it; the split
/// must keep that trailing empty segment or the selection shifts up a
/// line.
fn usage_error(stderr: &str) -> Error {
    let lines: Vec<&str> = stderr.split('\n').collect();
    let detail = match lines.len() {
        1 => lines[0],
        n => lines[n - 2],
    };

    let message = if detail.contains(ENCRYPTION_ARG_MARKER) {
        detail.to_string()
    } else {
        GENERIC_USAGE_MESSAGE.to_string()
    };
    Error::Usage { message }
}

/// Try the whole payload first, then individual lines: `--log-json`
/// interleaves progress objects with the final error object.
fn structured_error(stderr: &str) -> Option<Error> {
    let trimmed = stderr.trim();
    std::iter::once(trimmed)
        .chain(trimmed.lines())
        .filter_map(|candidate| serde_json::from_str::<ErrorMessage>(candidate).ok())
        .find(|decoded| decoded.message.is_some() || decoded.msgid.is_some())
        .map(|decoded| {
            let message = decoded
                .message
                .unwrap_or_else(|| UNKNOWN_MESSAGE.to_string());
            let msgid = decoded.msgid.unwrap_or_else(|| UNKNOWN_MSGID.to_string());
            tracing::warn!(%message, %msgid, "borg reported failure");
            Error::Borg {
                message,
                code: format!("{BORG_CODE_PREFIX}.{msgid}"),
            }
        })
}
