#[cfg(test)]
mod tests {
    use crate::error::FilterError;
    use crate::event::{Event, EventContext};
    use crate::filter::apply_filter;
    use crate::sensor::{ContextFilter, DataFilter, EventDependencyFilter, TimeFilter};
    use crate::types::{Comparator, JsonType};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn event_at(hour: u32, data: serde_json::Value) -> Event {
        Event::new(
            EventContext {
                id: "e1".to_string(),
                source: "webhook".to_string(),
                specversion: "0.3".to_string(),
                event_type: "webhook".to_string(),
                datacontenttype: "application/json".to_string(),
                subject: "push".to_string(),
                time: Utc.with_ymd_and_hms(2020, 5, 14, hour, 30, 0).unwrap(),
            },
            serde_json::to_vec(&data).unwrap(),
        )
    }

    fn data_filter(path: &str, json_type: JsonType, comparator: Comparator, values: &[&str]) -> EventDependencyFilter {
        EventDependencyFilter {
            data: vec![DataFilter {
                path: path.to_string(),
                json_type,
                value: values.iter().map(|v| v.to_string()).collect(),
                comparator,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_filter_accepts() {
        let filter = EventDependencyFilter::default();
        assert_eq!(apply_filter(&filter, &event_at(10, json!({}))), Ok(true));
    }

    #[test]
    fn test_time_window() {
        let filter = EventDependencyFilter {
            time: Some(TimeFilter {
                start: "09:00:00".to_string(),
                stop: "17:00:00".to_string(),
            }),
            ..Default::default()
        };
        assert_eq!(apply_filter(&filter, &event_at(10, json!({}))), Ok(true));
        assert_eq!(apply_filter(&filter, &event_at(18, json!({}))), Ok(false));
        // start is inclusive, stop exclusive
        let boundary = EventDependencyFilter {
            time: Some(TimeFilter {
                start: "10:30:00".to_string(),
                stop: "10:30:00".to_string(),
            }),
            ..Default::default()
        };
        assert_eq!(apply_filter(&boundary, &event_at(10, json!({}))), Ok(false));
    }

    #[test]
    fn test_time_window_wraps_midnight() {
        let filter = EventDependencyFilter {
            time: Some(TimeFilter {
                start: "22:00:00".to_string(),
                stop: "02:00:00".to_string(),
            }),
            ..Default::default()
        };
        assert_eq!(apply_filter(&filter, &event_at(23, json!({}))), Ok(true));
        assert_eq!(apply_filter(&filter, &event_at(1, json!({}))), Ok(true));
        assert_eq!(apply_filter(&filter, &event_at(12, json!({}))), Ok(false));
    }

    #[test]
    fn test_malformed_time_bound() {
        let filter = EventDependencyFilter {
            time: Some(TimeFilter {
                start: "9am".to_string(),
                stop: String::new(),
            }),
            ..Default::default()
        };
        assert!(matches!(
            apply_filter(&filter, &event_at(10, json!({}))),
            Err(FilterError::MalformedTime(_))
        ));
    }

    #[test]
    fn test_context_filter() {
        let filter = EventDependencyFilter {
            context: Some(ContextFilter {
                source: "webhook".to_string(),
                subject: "push".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(apply_filter(&filter, &event_at(10, json!({}))), Ok(true));

        let mismatched = EventDependencyFilter {
            context: Some(ContextFilter {
                source: "calendar".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(apply_filter(&mismatched, &event_at(10, json!({}))), Ok(false));
    }

    #[test]
    fn test_data_filter_string_equality() {
        let filter = data_filter("user.name", JsonType::String, Comparator::Empty, &["ada", "kay"]);
        assert_eq!(
            apply_filter(&filter, &event_at(10, json!({"user": {"name": "ada"}}))),
            Ok(true)
        );
        assert_eq!(
            apply_filter(&filter, &event_at(10, json!({"user": {"name": "bob"}}))),
            Ok(false)
        );
    }

    #[test]
    fn test_data_filter_number_comparators() {
        let filter = data_filter("count", JsonType::Number, Comparator::GreaterThan, &["100"]);
        assert_eq!(apply_filter(&filter, &event_at(10, json!({"count": 150}))), Ok(true));
        assert_eq!(apply_filter(&filter, &event_at(10, json!({"count": 42}))), Ok(false));
        // strconv-style coercion from a string-typed event value
        assert_eq!(
            apply_filter(&filter, &event_at(10, json!({"count": "42"}))),
            Ok(false)
        );
    }

    #[test]
    fn test_data_filter_bool() {
        let filter = data_filter("ok", JsonType::Bool, Comparator::Empty, &["true"]);
        assert_eq!(apply_filter(&filter, &event_at(10, json!({"ok": true}))), Ok(true));
        assert_eq!(apply_filter(&filter, &event_at(10, json!({"ok": false}))), Ok(false));
    }

    #[test]
    fn test_data_filter_not_equal() {
        let filter = data_filter("env", JsonType::String, Comparator::NotEqualTo, &["prod"]);
        assert_eq!(
            apply_filter(&filter, &event_at(10, json!({"env": "staging"}))),
            Ok(true)
        );
        assert_eq!(apply_filter(&filter, &event_at(10, json!({"env": "prod"}))), Ok(false));
    }

    #[test]
    fn test_data_filter_path_missing() {
        let filter = data_filter("missing", JsonType::String, Comparator::Empty, &["x"]);
        assert_eq!(
            apply_filter(&filter, &event_at(10, json!({"present": 1}))),
            Err(FilterError::PathMissing {
                path: "missing".to_string()
            })
        );
    }

    #[test]
    fn test_ordering_comparator_invalid_for_strings() {
        let filter = data_filter("env", JsonType::String, Comparator::GreaterThan, &["a"]);
        assert!(matches!(
            apply_filter(&filter, &event_at(10, json!({"env": "b"}))),
            Err(FilterError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_entries_are_anded() {
        let filter = EventDependencyFilter {
            data: vec![
                DataFilter {
                    path: "a".to_string(),
                    json_type: JsonType::Number,
                    value: vec!["1".to_string()],
                    comparator: Comparator::Empty,
                },
                DataFilter {
                    path: "b".to_string(),
                    json_type: JsonType::Number,
                    value: vec!["2".to_string()],
                    comparator: Comparator::Empty,
                },
            ],
            ..Default::default()
        };
        assert_eq!(apply_filter(&filter, &event_at(10, json!({"a": 1, "b": 2}))), Ok(true));
        assert_eq!(apply_filter(&filter, &event_at(10, json!({"a": 1, "b": 3}))), Ok(false));
    }

    #[test]
    fn test_filter_monotonicity() {
        // If a stricter filter accepts, the looser subset must accept too
        let loose = data_filter("count", JsonType::Number, Comparator::GreaterThan, &["10"]);
        let mut strict = loose.clone();
        strict.data.push(DataFilter {
            path: "env".to_string(),
            json_type: JsonType::String,
            value: vec!["prod".to_string()],
            comparator: Comparator::Empty,
        });

        let event = event_at(10, json!({"count": 50, "env": "prod"}));
        if apply_filter(&strict, &event) == Ok(true) {
            assert_eq!(apply_filter(&loose, &event), Ok(true));
        }
    }
}
