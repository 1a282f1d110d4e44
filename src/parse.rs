//! Free-text parsing for error messages
//!
//! Error events carry no structured process identity. Workers prefix their
//! messages with `(pid=<pid>, ip=<host>)`, often wrapped in terminal color
//! codes, and this module recovers that identity.

use std::sync::LazyLock;

use regex::Regex;

use crate::store::ProcessKey;

static ANSI_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[\d+m").expect("valid ANSI color pattern"));

static PROCESS_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(pid=(\d+), ip=(.*?)\)").expect("valid process tag pattern"));

/// Remove `ESC [ <digits> m` color sequences
pub fn strip_ansi(message: &str) -> String {
    ANSI_COLOR.replace_all(message, "").into_owned()
}

/// Find the first `(pid=<digits>, ip=<host>)` tag in `message`
pub fn extract_process_key(message: &str) -> Option<ProcessKey> {
    let captures = PROCESS_TAG.captures(message)?;
    let pid = captures.get(1)?.as_str();
    let host = captures.get(2)?.as_str();
    Some(ProcessKey::new(host, pid))
}
