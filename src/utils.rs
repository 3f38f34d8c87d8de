//! Some utility functions

use chrono::{DateTime, Timelike, Utc};
use uuid::Uuid;

/// A fresh, random UID for a new incidence
pub fn new_uid() -> String {
    Uuid::new_v4().to_hyphenated().to_string()
}

/// The current instant, truncated to the second.
///
/// iCalendar timestamps have no sub-second part, so this keeps a freshly created incidence equal to its decoded copy.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Reverts the TEXT escaping of RFC 5545 §3.3.11 (`\n`, `\,`, `\;`, `\\`)
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Splits a TEXT list value (e.g. `CATEGORIES`) on the commas that are not escaped
pub fn split_text_list(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            current.push('\\');
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ',' {
            items.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    if escaped {
        current.push('\\');
    }
    items.push(current);

    items.iter()
        .map(|item| unescape_text(item.trim()))
        .filter(|item| item.is_empty() == false)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescaping() {
        assert_eq!(unescape_text(r"Room 1\, 2nd floor\nBring a laptop\; or not\\"), "Room 1, 2nd floor\nBring a laptop; or not\\");
    }

    #[test]
    fn text_lists() {
        assert_eq!(split_text_list(r"Work, Meeting\, weekly,,Home"), vec!["Work", "Meeting, weekly", "Home"]);
    }

    #[test]
    fn uids_are_unique() {
        assert_ne!(new_uid(), new_uid());
        assert_eq!(now().nanosecond(), 0);
    }
}
