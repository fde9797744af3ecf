//! Content-line scanning for vCard and iCalendar text

use std::sync::LazyLock;

use regex::Regex;

use super::{ParseError, PimItem};
use crate::util::normalize_text_option;

static CONTENT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:[A-Za-z0-9-]+\.)?(?P<name>[A-Za-z0-9-]+)(?:;(?:"[^"]*"|[^";:])*)*:(?P<value>.*)$"#)
        .expect("Invalid regex")
});

/// A property line after unfolding: upper-cased name and raw value.
#[derive(Debug, PartialEq, Eq)]
struct ContentLine<'a> {
    name: String,
    value: &'a str,
}

/// Join folded lines: a line starting with a space or tab continues the
/// previous one, with that single whitespace character removed.
fn unfold(content: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in content.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        match (raw.strip_prefix([' ', '\t']), lines.last_mut()) {
            (Some(continuation), Some(last)) => last.push_str(continuation),
            _ => lines.push(raw.to_string()),
        }
    }
    lines.retain(|line| !line.trim().is_empty());
    lines
}

fn content_line(line: &str) -> Option<ContentLine<'_>> {
    let captures = CONTENT_LINE.captures(line)?;
    let name = captures.name("name")?.as_str().to_ascii_uppercase();
    let value = captures.name("value")?.as_str();
    Some(ContentLine { name, value })
}

fn is_begin(line: &ContentLine<'_>, component: &str) -> bool {
    line.name == "BEGIN" && line.value.trim().eq_ignore_ascii_case(component)
}

/// Properties found directly inside a component (not in nested components).
#[derive(Debug, Default)]
struct Properties {
    uid: Option<String>,
    modified: Option<String>,
}

/// Scan `lines` from the `BEGIN:<component>` at `start` to its matching END,
/// collecting `UID` and the named modification property at depth one.
fn collect_properties(
    lines: &[String],
    start: usize,
    component: &str,
    modified_property: &str,
) -> Result<Properties, ParseError> {
    let mut properties = Properties::default();
    let mut depth = 0usize;

    for line in &lines[start..] {
        let Some(line) = content_line(line) else {
            continue;
        };
        match line.name.as_str() {
            "BEGIN" => depth += 1,
            "END" => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(properties);
                }
            }
            "UID" if depth == 1 && properties.uid.is_none() => {
                properties.uid = normalize_text_option(Some(line.value.to_string()));
            }
            name if depth == 1 && name == modified_property && properties.modified.is_none() => {
                properties.modified = normalize_text_option(Some(line.value.to_string()));
            }
            _ => {}
        }
    }

    Err(ParseError::Unterminated(component.to_string()))
}

/// Parse a vCard (`BEGIN:VCARD`); the modification time comes from `REV`.
pub fn parse_vcard(content: &str) -> Result<PimItem, ParseError> {
    let lines = unfold(content);
    let first = lines.first().ok_or(ParseError::Empty)?;
    if !content_line(first).is_some_and(|line| is_begin(&line, "VCARD")) {
        return Err(ParseError::UnexpectedStart("VCARD"));
    }

    let properties = collect_properties(&lines, 0, "VCARD", "REV")?;
    Ok(PimItem {
        uid: properties.uid,
        last_modified: properties.modified,
        content: content.to_string(),
    })
}

/// Parse a calendar object, reading the first `VEVENT`.
pub fn parse_calendar(content: &str) -> Result<PimItem, ParseError> {
    parse_icalendar(content, "VEVENT")
}

/// Parse a calendar object, reading the first `VTODO`.
pub fn parse_tasks(content: &str) -> Result<PimItem, ParseError> {
    parse_icalendar(content, "VTODO")
}

fn parse_icalendar(content: &str, component: &'static str) -> Result<PimItem, ParseError> {
    let lines = unfold(content);
    let first = lines.first().ok_or(ParseError::Empty)?;
    if !content_line(first).is_some_and(|line| is_begin(&line, "VCALENDAR")) {
        return Err(ParseError::UnexpectedStart("VCALENDAR"));
    }

    let start = lines
        .iter()
        .position(|line| content_line(line).is_some_and(|line| is_begin(&line, component)))
        .ok_or(ParseError::MissingComponent(component))?;

    let properties = collect_properties(&lines, start, component, "LAST-MODIFIED")?;
    Ok(PimItem {
        uid: properties.uid,
        last_modified: properties.modified,
        content: content.to_string(),
    })
}
