use std::collections::{HashMap, VecDeque};

use serde_json::Value;

/// Resolve a path expression against a context's list.
///
/// Supported: optional leading `$`, bracket indices (`[0]`, `[-1]` counting
/// from the end), dot-separated field names, and bare numeric segments as
/// indices. An empty path (or just `$`) yields the whole list. Anything the
/// grammar or the data cannot satisfy yields None, the caller's soft-miss.
pub(crate) fn resolve(list: &VecDeque<HashMap<String, String>>, path: &str) -> Option<Value> {
    let segments = parse(path)?;
    let mut cursor = Cursor::List;
    let mut entry: Option<&HashMap<String, String>> = None;
    let mut value: Option<&str> = None;

    for segment in segments {
        match (cursor, segment) {
            (Cursor::List, Segment::Index(index)) => {
                entry = Some(pick(list, index)?);
                cursor = Cursor::Entry;
            }
            (Cursor::Entry, Segment::Field(field)) => {
                value = Some(entry?.get(&field)?.as_str());
                cursor = Cursor::Value;
            }
            // A field on the list or an index into an entry has no meaning.
            _ => return None,
        }
    }

    match cursor {
        Cursor::List => serde_json::to_value(list).ok(),
        Cursor::Entry => serde_json::to_value(entry?).ok(),
        Cursor::Value => value.map(|v| Value::String(v.to_owned())),
    }
}

#[derive(Clone, Copy)]
enum Cursor {
    List,
    Entry,
    Value,
}

#[derive(Debug, PartialEq)]
enum Segment {
    Index(i64),
    Field(String),
}

fn pick(list: &VecDeque<HashMap<String, String>>, index: i64) -> Option<&HashMap<String, String>> {
    let index = if index < 0 {
        list.len().checked_sub(index.unsigned_abs() as usize)?
    } else {
        index as usize
    };
    list.get(index)
}

fn parse(path: &str) -> Option<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = path.trim().trim_start_matches('$');

    while !rest.is_empty() {
        rest = rest.strip_prefix('.').unwrap_or(rest);
        if rest.is_empty() {
            break;
        }
        if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']')?;
            segments.push(Segment::Index(after[..close].trim().parse().ok()?));
            rest = &after[close + 1..];
        } else {
            let end = rest
                .find(|c| c == '.' || c == '[')
                .unwrap_or(rest.len());
            let raw = &rest[..end];
            match raw.parse::<i64>() {
                Ok(index) => segments.push(Segment::Index(index)),
                Err(_) => segments.push(Segment::Field(raw.to_owned())),
            }
            rest = &rest[end..];
        }
    }
    Some(segments)
}
