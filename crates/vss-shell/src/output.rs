//! Rendering of server replies and connection notices.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde_json::Value;
use vss_bridge::Response;

/// Printed after a successful connect.
pub(crate) const CONNECTED: &str = "Websocket connected!!";
/// Printed when a connect attempt fails; the cause follows on stderr.
pub(crate) const NOT_CONNECTED: &str = "Websocket could not be connected!!";
/// Printed after `disconnect`.
pub(crate) const DISCONNECTED: &str = "Websocket disconnected!!";

const INDENT: &str = "  ";

/// How JSON replies are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum ReplyStyle {
    /// Indented JSON without escape sequences.
    #[default]
    Plain,
    /// Indented JSON with ANSI colours.
    Coloured,
}

impl ReplyStyle {
    /// Colours replies when stdout is a terminal and `NO_COLOR` is unset.
    pub(crate) fn detect() -> Self {
        if io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none() {
            Self::Coloured
        } else {
            Self::Plain
        }
    }
}

/// Renders a reply as indented JSON, or verbatim when it is not JSON.
pub(crate) fn render_reply(response: &Response, style: ReplyStyle) -> String {
    let Ok(value) = response.to_json() else {
        return response.as_str().to_owned();
    };
    match style {
        ReplyStyle::Plain => serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| response.as_str().to_owned()),
        ReplyStyle::Coloured => {
            let mut out = String::new();
            write_coloured(&mut out, &value, 0);
            out
        }
    }
}

fn write_coloured(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Object(fields) if !fields.is_empty() => {
            out.push_str("{\n");
            for (index, (key, field)) in fields.iter().enumerate() {
                push_indent(out, depth + 1);
                out.push_str(&Value::from(key.as_str()).to_string().blue().to_string());
                out.push_str(": ");
                write_coloured(out, field, depth + 1);
                push_separator(out, index + 1 < fields.len());
            }
            push_indent(out, depth);
            out.push('}');
        }
        Value::Array(items) if !items.is_empty() => {
            out.push_str("[\n");
            for (index, item) in items.iter().enumerate() {
                push_indent(out, depth + 1);
                write_coloured(out, item, depth + 1);
                push_separator(out, index + 1 < items.len());
            }
            push_indent(out, depth);
            out.push(']');
        }
        Value::Object(_) => out.push_str("{}"),
        Value::Array(_) => out.push_str("[]"),
        Value::String(_) => out.push_str(&value.to_string().green().to_string()),
        Value::Number(_) => out.push_str(&value.to_string().cyan().to_string()),
        Value::Bool(_) | Value::Null => out.push_str(&value.to_string().magenta().to_string()),
    }
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn push_separator(out: &mut String, more: bool) {
    if more {
        out.push(',');
    }
    out.push('\n');
}

/// Writes a rendered reply followed by a newline and flushes.
pub(crate) fn write_reply<W: Write>(
    stdout: &mut W,
    response: &Response,
    style: ReplyStyle,
) -> io::Result<()> {
    writeln!(stdout, "{}", render_reply(response, style))?;
    stdout.flush()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn json_replies_are_indented_in_server_order() {
        let response = Response::new(r#"{"requestId":3,"action":"get","value":"88"}"#);
        assert_eq!(
            render_reply(&response, ReplyStyle::Plain),
            "{\n  \"requestId\": 3,\n  \"action\": \"get\",\n  \"value\": \"88\"\n}"
        );
    }

    #[rstest]
    fn other_replies_are_printed_verbatim() {
        let response = Response::new("server says no");
        assert_eq!(render_reply(&response, ReplyStyle::Coloured), "server says no");
    }

    #[rstest]
    fn written_replies_end_with_a_newline() {
        let mut buffer = Vec::new();
        write_reply(&mut buffer, &Response::new("[1, 2]"), ReplyStyle::Plain)
            .expect("write reply");
        assert_eq!(
            String::from_utf8(buffer).expect("utf8"),
            "[\n  1,\n  2\n]\n"
        );
    }

    fn strip_ansi(text: &str) -> String {
        let mut plain = String::new();
        let mut chars = text.chars();
        while let Some(character) = chars.next() {
            if character == '\u{1b}' {
                for code in chars.by_ref() {
                    if code == 'm' {
                        break;
                    }
                }
            } else {
                plain.push(character);
            }
        }
        plain
    }

    #[rstest]
    #[case(r#"{"requestId":3,"action":"get","value":"88","ok":true,"data":{"list":[1,null],"empty":{}}}"#)]
    #[case("[]")]
    fn coloured_replies_match_plain_layout(#[case] raw: &str) {
        let response = Response::new(raw);
        let coloured = render_reply(&response, ReplyStyle::Coloured);
        assert_eq!(strip_ansi(&coloured), render_reply(&response, ReplyStyle::Plain));
    }

    #[rstest]
    fn coloured_replies_highlight_keys_and_values() {
        let response = Response::new(r#"{"value":"88","requestId":3}"#);
        let coloured = render_reply(&response, ReplyStyle::Coloured);
        assert!(coloured.contains(&"\"value\"".blue().to_string()));
        assert!(coloured.contains(&"\"88\"".green().to_string()));
        assert!(coloured.contains(&"3".cyan().to_string()));
    }
}
