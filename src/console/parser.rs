//! Server log line classification.
//!
//! Vanilla-style console lines look like
//! `[12:34:56] [Server thread/INFO]: <content>`. Content of the form
//! `<player> message` is chat and is flagged as user input. Lines without the
//! prefix are passed through as system lines with the raw text as content.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ConsoleLine;

static LOG_PREFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(?P<time>[0-9:.]+)\] \[(?P<thread>[^\]/]+)/(?P<level>[A-Z]+)\]: (?P<content>.*)$")
        .expect("Invalid log prefix regex")
});
static CHAT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<(?P<player>[^>]+)> ").expect("Invalid chat regex")
});

/// Classify one raw console line.
pub fn parse_server_line(raw: &str) -> ConsoleLine {
    let raw = raw.trim_end_matches(['\r', '\n']);
    match LOG_PREFIX_REGEX.captures(raw) {
        Some(caps) => {
            let content = caps.name("content").map(|m| m.as_str()).unwrap_or_default();
            if CHAT_REGEX.is_match(content) {
                ConsoleLine::user(content)
            } else {
                ConsoleLine::system(content)
            }
        }
        None => ConsoleLine::system(raw),
    }
}
