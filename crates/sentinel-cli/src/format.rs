//! Terminal rendering of replies, in the style redis-cli users expect.

use colored::Colorize;
use sentinel_client::Frame;

/// Renders a reply for display.
///
/// Strings are green (bulk strings quoted), errors red with an
/// `(error)` prefix, integers yellow, nulls dimmed, and arrays as
/// numbered lists with nested arrays indented.
pub fn format_response(frame: &Frame) -> String {
    let mut out = String::new();
    render(frame, 0, &mut out);
    out
}

/// One status line for `--watch` mode: which address served the poll
/// and what it answered.
pub fn format_poll(name: &str, addr: &str, frame: &Frame) -> String {
    format!("{} {} {}", name.bold(), addr.cyan(), format_response(frame))
}

fn render(frame: &Frame, indent: usize, out: &mut String) {
    match frame {
        Frame::Simple(s) => out.push_str(&sanitize(s).green().to_string()),
        Frame::Error(e) => {
            out.push_str(&format!("{} {}", "(error)".red(), sanitize(e).red()));
        }
        Frame::Integer(n) => {
            out.push_str(&format!("{} {}", "(integer)".yellow(), n.to_string().yellow()));
        }
        Frame::Bulk(data) => match std::str::from_utf8(data) {
            // multiline payloads (INFO and friends) print unquoted
            Ok(s) if s.contains('\n') => out.push_str(&sanitize(s).green().to_string()),
            Ok(s) => out.push_str(&format!("\"{}\"", sanitize(s)).green().to_string()),
            Err(_) => {
                let hex: String = data.iter().map(|b| format!("{b:02x}")).collect();
                out.push_str(&hex.green().to_string());
            }
        },
        Frame::Null => out.push_str(&"(nil)".dimmed().to_string()),
        Frame::Array(items) if items.is_empty() => {
            out.push_str(&"(empty array)".dimmed().to_string());
        }
        Frame::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                    out.push_str(&" ".repeat(indent));
                }
                let label = format!("{}) ", i + 1);
                out.push_str(&label);
                render(item, indent + label.len(), out);
            }
        }
    }
}

/// Drops ANSI escape sequences and control characters from
/// server-supplied text so a reply can't drive the terminal.
fn sanitize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            if chars.next() == Some('[') {
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
        } else if matches!(ch, '\t' | '\n' | '\r') || !ch.is_control() {
            out.push(ch);
        }
    }
    out
}
