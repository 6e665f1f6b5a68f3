//! Extraction of conditions and action items from contribution text.

use serde::{Deserialize, Serialize};

/// Explicit condition markers, captured to end of line.
const CONDITION_TAGS: &[&str] = &["[CONDITION]:", "[BEDINGUNG]:"];

/// Hedge phrases introducing a condition, captured up to the next period
/// or end of line.
const HEDGE_PHRASES: &[&str] = &[
    "unter der bedingung",
    "vorausgesetzt",
    "sofern",
    "wenn wir",
    "condition",
    "provided that",
    "assuming",
];

/// Checklist markers for action items.
const CHECKLIST_MARKERS: &[&str] = &["- [ ]", "* [ ]"];

/// Keyword markers introducing an action item, captured to end of line
/// after the `:`.
const ACTION_MARKERS: &[&str] = &["todo", "task", "action", "next step", "nächster schritt"];

const ASSIGNEE_MARKERS: &[&str] = &["(assigned:", "(zugewiesen:"];

/// Minimum length for an extracted fragment to be worth keeping.
const MIN_FRAGMENT_LEN: usize = 5;

/// A task extracted from a checklist line, with an optional assignee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

/// Collect condition statements from free text: tagged lines plus hedge
/// phrase captures.
pub fn extract_conditions(content: &str) -> Vec<String> {
    let mut conditions = Vec::new();

    for tag in CONDITION_TAGS {
        let mut from = 0;
        while let Some(at) = find_ignore_ascii_case(content, tag, from) {
            let rest = &content[at + tag.len()..];
            let line = rest.lines().next().unwrap_or("").trim();
            if line.chars().count() > MIN_FRAGMENT_LEN {
                conditions.push(line.to_string());
            }
            from = at + tag.len();
        }
    }

    for phrase in HEDGE_PHRASES {
        let mut from = 0;
        while let Some(at) = find_ignore_ascii_case(content, phrase, from) {
            // skip matches inside an explicit [CONDITION] tag
            if at > 0 && content.as_bytes()[at - 1] == b'[' {
                from = at + phrase.len();
                continue;
            }
            let rest = &content[at + phrase.len()..];
            let rest = rest.trim_start_matches([',', ':']).trim_start();
            let line = rest.lines().next().unwrap_or("");
            let fragment = match line.find('.') {
                Some(dot) => &line[..dot],
                None => line,
            };
            let fragment = fragment.trim();
            if fragment.chars().count() > MIN_FRAGMENT_LEN {
                conditions.push(fragment.to_string());
            }
            from = at + phrase.len();
        }
    }

    conditions
}

/// Collect action items: `- [ ]` checklist entries (with an optional
/// trailing `(assigned: name)` marker) plus `TODO:` / `TASK:` / `ACTION:` /
/// "next step:" keyword lines.
pub fn extract_action_items(content: &str) -> Vec<ActionItem> {
    let mut items = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim_start();
        let Some(task) = CHECKLIST_MARKERS
            .iter()
            .find_map(|m| trimmed.strip_prefix(m))
        else {
            if let Some(task) = keyword_task(trimmed) {
                items.push(ActionItem {
                    task,
                    assignee: None,
                });
            }
            continue;
        };
        let mut task = task.trim().to_string();
        let mut assignee = None;

        for marker in ASSIGNEE_MARKERS {
            if let Some(at) = find_ignore_ascii_case(&task, marker, 0) {
                let after = &task[at + marker.len()..];
                if let Some(close) = after.find(')') {
                    assignee = Some(after[..close].trim().to_string());
                    task = task[..at].trim_end().to_string();
                    break;
                }
            }
        }

        if task.chars().count() > MIN_FRAGMENT_LEN {
            items.push(ActionItem { task, assignee });
        }
    }
    items
}

/// Match a `MARKER: task` line, returning the task text.
fn keyword_task(line: &str) -> Option<String> {
    for marker in ACTION_MARKERS {
        let Some(at) = find_ignore_ascii_case(line, marker, 0) else {
            continue;
        };
        let rest = &line[at + marker.len()..];
        let Some(rest) = rest.strip_prefix(':') else {
            continue;
        };
        let task = rest.trim();
        if task.chars().count() > MIN_FRAGMENT_LEN {
            return Some(task.to_string());
        }
    }
    None
}

/// ASCII-case-insensitive substring search starting at byte offset `from`.
/// Returns a byte offset into `haystack`.
fn find_ignore_ascii_case(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || from + needle.len() > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|at| from + at)
}
