use crate::types::JsonValue;
use thiserror::Error;

#[cfg(test)]
#[path = "path_test.rs"]
mod path_test;

/// How the setter combines a new value with an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetOperation {
    #[default]
    Overwrite,
    Append,
    Prepend,
}

/// Errors from writing into a document at a destination path
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("wildcards are not valid in destination paths")]
    WildcardInDest,
}

/// One element of a pattern segment
#[derive(Debug, Clone, PartialEq, Eq)]
enum PatTok {
    Lit(char),
    // '*': any run of characters
    Any,
    // '?': exactly one character
    One,
}

/// One dot-separated path segment, split into the literal and wildcard cases
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Pattern(Vec<PatTok>),
}

/// Split a dotted path into segments.
///
/// `\` escapes the next character, so `a\.b` is a single key `a.b` and
/// `\*` is a literal asterisk. A trailing backslash is taken literally.
fn parse_path(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut toks: Vec<PatTok> = Vec::new();
    let mut has_wildcard = false;
    let mut chars = path.chars();

    let flush = |toks: &mut Vec<PatTok>, has_wildcard: &mut bool, segments: &mut Vec<Segment>| {
        let seg = if *has_wildcard {
            Segment::Pattern(std::mem::take(toks))
        } else {
            Segment::Literal(
                std::mem::take(toks)
                    .into_iter()
                    .map(|t| match t {
                        PatTok::Lit(c) => c,
                        _ => unreachable!(),
                    })
                    .collect(),
            )
        };
        *has_wildcard = false;
        segments.push(seg);
    };

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().unwrap_or('\\');
                toks.push(PatTok::Lit(escaped));
            }
            '.' => flush(&mut toks, &mut has_wildcard, &mut segments),
            '*' => {
                has_wildcard = true;
                toks.push(PatTok::Any);
            }
            '?' => {
                has_wildcard = true;
                toks.push(PatTok::One);
            }
            other => toks.push(PatTok::Lit(other)),
        }
    }
    flush(&mut toks, &mut has_wildcard, &mut segments);
    segments
}

/// Wildcard match of a pattern segment against a key, with backtracking
/// over `*`.
fn pattern_match(pattern: &[PatTok], text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let mut p = 0;
    let mut t = 0;
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while t < chars.len() {
        match pattern.get(p) {
            Some(PatTok::Lit(c)) if *c == chars[t] => {
                p += 1;
                t += 1;
            }
            Some(PatTok::One) => {
                p += 1;
                t += 1;
            }
            Some(PatTok::Any) => {
                star = Some(p);
                mark = t;
                p += 1;
            }
            _ => match star {
                Some(sp) => {
                    p = sp + 1;
                    mark += 1;
                    t = mark;
                }
                None => return false,
            },
        }
    }
    while matches!(pattern.get(p), Some(PatTok::Any)) {
        p += 1;
    }
    p == pattern.len()
}

fn segment_matches(segment: &Segment, key: &str) -> bool {
    match segment {
        Segment::Literal(lit) => lit == key,
        Segment::Pattern(pat) => pattern_match(pat, key),
    }
}

/// Select the first value matching `path`, or `None`.
///
/// Dot-separated segments descend into objects by key and into arrays by
/// numeric index; wildcard segments take the first key (or index) whose
/// remainder of the path also resolves. The input is never mutated.
pub fn select<'a>(doc: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    if path.is_empty() {
        return None;
    }
    select_segments(doc, &parse_path(path))
}

fn select_segments<'a>(doc: &'a JsonValue, segments: &[Segment]) -> Option<&'a JsonValue> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(doc);
    };

    match doc {
        JsonValue::Object(map) => match head {
            Segment::Literal(key) => map.get(key).and_then(|v| select_segments(v, rest)),
            Segment::Pattern(_) => map
                .iter()
                .filter(|(key, _)| segment_matches(head, key))
                .find_map(|(_, v)| select_segments(v, rest)),
        },
        JsonValue::Array(items) => match head {
            Segment::Literal(key) => {
                let index: usize = key.parse().ok()?;
                items.get(index).and_then(|v| select_segments(v, rest))
            }
            Segment::Pattern(_) => items
                .iter()
                .enumerate()
                .filter(|(i, _)| segment_matches(head, &i.to_string()))
                .find_map(|(_, v)| select_segments(v, rest)),
        },
        _ => None,
    }
}

/// A destination path step: object key or array index (`-1` appends)
enum Step {
    Key(String),
    Index(usize),
    AppendSlot,
}

fn dest_steps(path: &str) -> Result<Vec<Step>, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    parse_path(path)
        .into_iter()
        .map(|segment| match segment {
            Segment::Pattern(_) => Err(PathError::WildcardInDest),
            Segment::Literal(lit) => Ok(if lit == "-1" {
                Step::AppendSlot
            } else if let Ok(index) = lit.parse::<usize>() {
                Step::Index(index)
            } else {
                Step::Key(lit)
            }),
        })
        .collect()
}

/// Write `value` into `doc` at `path`, creating missing objects and
/// arrays along the way.
///
/// A numeric segment indexes an array (growing it with nulls), `-1`
/// appends. `Append`/`Prepend` concatenate strings and extend arrays;
/// for any other existing value they behave like `Overwrite`.
pub fn set(
    doc: &mut JsonValue,
    path: &str,
    value: JsonValue,
    op: SetOperation,
) -> Result<(), PathError> {
    let steps = dest_steps(path)?;
    set_steps(doc, &steps, value, op);
    Ok(())
}

fn set_steps(doc: &mut JsonValue, steps: &[Step], value: JsonValue, op: SetOperation) {
    let Some((head, rest)) = steps.split_first() else {
        apply_op(doc, value, op);
        return;
    };

    match head {
        Step::Key(key) => {
            if !doc.is_object() {
                *doc = JsonValue::Object(serde_json::Map::new());
            }
            let map = doc.as_object_mut().unwrap();
            let slot = map.entry(key.clone()).or_insert(JsonValue::Null);
            set_steps(slot, rest, value, op);
        }
        Step::Index(index) => {
            if !doc.is_array() {
                *doc = JsonValue::Array(Vec::new());
            }
            let items = doc.as_array_mut().unwrap();
            while items.len() <= *index {
                items.push(JsonValue::Null);
            }
            set_steps(&mut items[*index], rest, value, op);
        }
        Step::AppendSlot => {
            if !doc.is_array() {
                *doc = JsonValue::Array(Vec::new());
            }
            let items = doc.as_array_mut().unwrap();
            items.push(JsonValue::Null);
            let last = items.len() - 1;
            set_steps(&mut items[last], rest, value, op);
        }
    }
}

fn apply_op(slot: &mut JsonValue, value: JsonValue, op: SetOperation) {
    if matches!(op, SetOperation::Overwrite) {
        *slot = value;
        return;
    }
    let prepend = matches!(op, SetOperation::Prepend);

    if slot.is_string() && value.is_string() {
        let existing = slot.as_str().unwrap_or_default();
        let new = value.as_str().unwrap_or_default();
        let merged = if prepend {
            format!("{new}{existing}")
        } else {
            format!("{existing}{new}")
        };
        *slot = JsonValue::String(merged);
        return;
    }

    if let JsonValue::Array(items) = slot {
        match value {
            JsonValue::Array(new) => {
                if prepend {
                    let mut merged = new;
                    merged.append(items);
                    *items = merged;
                } else {
                    items.extend(new);
                }
            }
            other => {
                if prepend {
                    items.insert(0, other);
                } else {
                    items.push(other);
                }
            }
        }
        return;
    }

    *slot = value;
}
