use crate::error::FilterError;
use crate::event::Event;
use crate::path;
use crate::sensor::{ContextFilter, DataFilter, EventDependencyFilter, TimeFilter};
use crate::types::{Comparator, JsonType, JsonValue};
use chrono::NaiveTime;

#[cfg(test)]
#[path = "filter_test.rs"]
mod filter_test;

/// Apply a dependency's filter to a candidate event.
///
/// Checks run time → context → data; the event passes only if every
/// configured check accepts it. Errors reject the event without failing
/// the sensor; callers count them against the dependency.
pub fn apply_filter(
    filter: &EventDependencyFilter,
    event: &Event,
) -> Result<bool, FilterError> {
    if let Some(time) = &filter.time {
        if !filter_time(time, event)? {
            return Ok(false);
        }
    }
    if let Some(context) = &filter.context {
        if !filter_context(context, event) {
            return Ok(false);
        }
    }
    if !filter.data.is_empty() {
        return filter_data(&filter.data, event);
    }
    Ok(true)
}

fn parse_bound(bound: &str) -> Result<NaiveTime, FilterError> {
    NaiveTime::parse_from_str(bound, "%H:%M:%S")
        .map_err(|_| FilterError::MalformedTime(bound.to_string()))
}

/// Time-of-day window check against the event's UTC timestamp.
/// `stop < start` means the window wraps midnight.
fn filter_time(filter: &TimeFilter, event: &Event) -> Result<bool, FilterError> {
    let tod = event.context.time.time();

    match (filter.start.is_empty(), filter.stop.is_empty()) {
        (true, true) => Ok(true),
        (false, true) => Ok(tod >= parse_bound(&filter.start)?),
        (true, false) => Ok(tod < parse_bound(&filter.stop)?),
        (false, false) => {
            let start = parse_bound(&filter.start)?;
            let stop = parse_bound(&filter.stop)?;
            if stop < start {
                Ok(tod >= start || tod < stop)
            } else {
                Ok(tod >= start && tod < stop)
            }
        }
    }
}

/// Exact string equality on every non-empty context field
fn filter_context(filter: &ContextFilter, event: &Event) -> bool {
    let context = &event.context;
    let checks = [
        (&filter.source, &context.source),
        (&filter.specversion, &context.specversion),
        (&filter.event_type, &context.event_type),
        (&filter.datacontenttype, &context.datacontenttype),
        (&filter.subject, &context.subject),
    ];
    checks
        .iter()
        .all(|(want, got)| want.is_empty() || want == got)
}

/// Data filters: every entry must pass, and an entry passes when any of
/// its listed values matches the event value under the comparator.
fn filter_data(filters: &[DataFilter], event: &Event) -> Result<bool, FilterError> {
    let data = event
        .json_data()
        .map_err(|e| FilterError::DataNotJson(e.to_string()))?;

    for entry in filters {
        let value = path::select(&data, &entry.path).ok_or_else(|| FilterError::PathMissing {
            path: entry.path.clone(),
        })?;
        if !data_entry_matches(entry, value)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn equality_only(entry: &DataFilter) -> Result<bool, FilterError> {
    match entry.comparator {
        Comparator::Empty | Comparator::EqualTo => Ok(true),
        Comparator::NotEqualTo => Ok(false),
        other => Err(FilterError::TypeMismatch {
            path: entry.path.clone(),
            json_type: entry.json_type,
            comparator: serde_json::to_string(&other)
                .unwrap_or_default()
                .trim_matches('"')
                .to_string(),
        }),
    }
}

fn data_entry_matches(entry: &DataFilter, value: &JsonValue) -> Result<bool, FilterError> {
    match entry.json_type {
        JsonType::Bool => {
            let want_equal = equality_only(entry)?;
            let actual = coerce_bool(entry, value)?;
            let mut matched = false;
            for allowed in &entry.value {
                let expected: bool =
                    allowed
                        .parse()
                        .map_err(|_| FilterError::MalformedFilterValue {
                            value: allowed.clone(),
                            expected: JsonType::Bool,
                        })?;
                matched |= actual == expected;
            }
            Ok(matched == want_equal)
        }
        JsonType::Number => {
            let actual = coerce_number(entry, value)?;
            for allowed in &entry.value {
                let expected: f64 =
                    allowed
                        .parse()
                        .map_err(|_| FilterError::MalformedFilterValue {
                            value: allowed.clone(),
                            expected: JsonType::Number,
                        })?;
                let matches = match entry.comparator {
                    Comparator::Empty | Comparator::EqualTo => actual == expected,
                    Comparator::NotEqualTo => actual != expected,
                    Comparator::GreaterThan => actual > expected,
                    Comparator::GreaterThanOrEqualTo => actual >= expected,
                    Comparator::LessThan => actual < expected,
                    Comparator::LessThanOrEqualTo => actual <= expected,
                };
                if matches {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        JsonType::String => {
            let want_equal = equality_only(entry)?;
            let actual = coerce_string(entry, value)?;
            let matched = entry.value.iter().any(|allowed| *allowed == actual);
            Ok(matched == want_equal)
        }
    }
}

fn coerce_bool(entry: &DataFilter, value: &JsonValue) -> Result<bool, FilterError> {
    match value {
        JsonValue::Bool(b) => Ok(*b),
        JsonValue::String(s) => s.parse().map_err(|_| FilterError::ValueMismatch {
            path: entry.path.clone(),
            expected: JsonType::Bool,
        }),
        _ => Err(FilterError::ValueMismatch {
            path: entry.path.clone(),
            expected: JsonType::Bool,
        }),
    }
}

fn coerce_number(entry: &DataFilter, value: &JsonValue) -> Result<f64, FilterError> {
    match value {
        JsonValue::Number(n) => n.as_f64().ok_or_else(|| FilterError::ValueMismatch {
            path: entry.path.clone(),
            expected: JsonType::Number,
        }),
        JsonValue::String(s) => s.parse().map_err(|_| FilterError::ValueMismatch {
            path: entry.path.clone(),
            expected: JsonType::Number,
        }),
        _ => Err(FilterError::ValueMismatch {
            path: entry.path.clone(),
            expected: JsonType::Number,
        }),
    }
}

fn coerce_string(entry: &DataFilter, value: &JsonValue) -> Result<String, FilterError> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        _ => Err(FilterError::ValueMismatch {
            path: entry.path.clone(),
            expected: JsonType::String,
        }),
    }
}
