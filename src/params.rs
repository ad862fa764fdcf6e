use crate::error::ParameterError;
use crate::event::Event;
use crate::path::{self, SetOperation};
use crate::sensor::{TriggerParameter, TriggerParameterOperation, TriggerParameterSource};
use crate::types::JsonValue;
use std::collections::HashMap;

/// Render a template against the event view. Any failure (bad syntax,
/// missing variable) falls through to the next source in precedence.
fn render_template(template: &str, view: &JsonValue) -> Option<String> {
    let mut env = minijinja::Environment::new();
    env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
    env.render_str(template, minijinja::Value::from_serialize(view))
        .ok()
}

/// Stringify a selected JSON value the way templates do: strings as-is,
/// everything else as its JSON form.
fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The `{ context, data }` view of an event that templates and keys
/// resolve against. Non-JSON data appears as null.
fn event_view(event: &Event) -> JsonValue {
    let context = serde_json::to_value(&event.context).unwrap_or(JsonValue::Null);
    let data = event.json_data().unwrap_or(JsonValue::Null);
    serde_json::json!({ "context": context, "data": data })
}

/// Resolve a parameter source against the round's event snapshot.
///
/// Precedence: `data_template` > `data_key` > `context_template` >
/// `context_key` > literal `value`. A source that fails to produce a
/// value falls through to the next; `None` means nothing resolved.
pub fn resolve_parameter_value(
    src: &TriggerParameterSource,
    snapshot: &HashMap<String, Event>,
) -> Option<String> {
    if let Some(event) = snapshot.get(&src.dependency_name) {
        let view = event_view(event);

        if !src.data_template.is_empty() {
            if let Some(rendered) = render_template(&src.data_template, &view) {
                return Some(rendered);
            }
        }
        if !src.data_key.is_empty() {
            if let Some(found) = path::select(&view["data"], &src.data_key) {
                return Some(stringify(found));
            }
        }
        if !src.context_template.is_empty() {
            if let Some(rendered) = render_template(&src.context_template, &view) {
                return Some(rendered);
            }
        }
        if !src.context_key.is_empty() {
            if let Some(found) = path::select(&view["context"], &src.context_key) {
                return Some(stringify(found));
            }
        }
    }

    src.value.clone()
}

fn set_operation(op: TriggerParameterOperation) -> SetOperation {
    match op {
        TriggerParameterOperation::None | TriggerParameterOperation::Overwrite => {
            SetOperation::Overwrite
        }
        TriggerParameterOperation::Append => SetOperation::Append,
        TriggerParameterOperation::Prepend => SetOperation::Prepend,
    }
}

/// Apply parameters to a trigger document in declaration order.
/// Conflicting destinations resolve in that order: later wins (or
/// combines, under append/prepend).
pub fn apply_parameters(
    document: &mut JsonValue,
    parameters: &[TriggerParameter],
    snapshot: &HashMap<String, Event>,
) -> Result<(), ParameterError> {
    for parameter in parameters {
        let value = resolve_parameter_value(&parameter.src, snapshot).ok_or_else(|| {
            if !parameter.src.dependency_name.is_empty()
                && !snapshot.contains_key(&parameter.src.dependency_name)
            {
                ParameterError::UnknownDependency {
                    dependency: parameter.src.dependency_name.clone(),
                }
            } else {
                ParameterError::Unresolved {
                    dest: parameter.dest.clone(),
                }
            }
        })?;

        path::set(
            document,
            &parameter.dest,
            JsonValue::String(value),
            set_operation(parameter.operation),
        )
        .map_err(|e| ParameterError::InvalidDest {
            dest: parameter.dest.clone(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}

/// Build a fresh payload document for a body-carrying trigger
pub fn build_payload(
    payload: &[TriggerParameter],
    snapshot: &HashMap<String, Event>,
) -> Result<JsonValue, ParameterError> {
    let mut document = serde_json::json!({});
    apply_parameters(&mut document, payload, snapshot)?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventContext;
    use crate::sensor::TriggerParameterOperation;
    use chrono::Utc;
    use serde_json::json;

    fn snapshot_with(data: serde_json::Value) -> HashMap<String, Event> {
        let event = Event::new(
            EventContext {
                id: "e1".to_string(),
                source: "webhook".to_string(),
                specversion: "0.3".to_string(),
                event_type: "webhook".to_string(),
                datacontenttype: "application/json".to_string(),
                subject: "push".to_string(),
                time: Utc::now(),
            },
            serde_json::to_vec(&data).unwrap(),
        );
        HashMap::from([("dep-a".to_string(), event)])
    }

    fn source(data_key: &str, value: Option<&str>) -> TriggerParameterSource {
        TriggerParameterSource {
            dependency_name: "dep-a".to_string(),
            data_key: data_key.to_string(),
            value: value.map(|v| v.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_data_key_resolution() {
        let snapshot = snapshot_with(json!({"user": {"name": "ada"}}));
        let resolved = resolve_parameter_value(&source("user.name", Some("anon")), &snapshot);
        assert_eq!(resolved, Some("ada".to_string()));
    }

    #[test]
    fn test_missing_key_falls_back_to_value() {
        let snapshot = snapshot_with(json!({}));
        let resolved = resolve_parameter_value(&source("user.name", Some("anon")), &snapshot);
        assert_eq!(resolved, Some("anon".to_string()));
    }

    #[test]
    fn test_nothing_resolvable_is_none() {
        let snapshot = snapshot_with(json!({}));
        assert_eq!(resolve_parameter_value(&source("user.name", None), &snapshot), None);
    }

    #[test]
    fn test_context_key_resolution() {
        let snapshot = snapshot_with(json!({}));
        let src = TriggerParameterSource {
            dependency_name: "dep-a".to_string(),
            context_key: "id".to_string(),
            ..Default::default()
        };
        assert_eq!(resolve_parameter_value(&src, &snapshot), Some("e1".to_string()));
    }

    #[test]
    fn test_data_template_beats_data_key() {
        let snapshot = snapshot_with(json!({"user": {"name": "ada"}}));
        let src = TriggerParameterSource {
            dependency_name: "dep-a".to_string(),
            data_template: "hello {{ data.user.name }}".to_string(),
            data_key: "user.name".to_string(),
            ..Default::default()
        };
        assert_eq!(
            resolve_parameter_value(&src, &snapshot),
            Some("hello ada".to_string())
        );
    }

    #[test]
    fn test_failing_template_falls_through_to_key() {
        let snapshot = snapshot_with(json!({"user": {"name": "ada"}}));
        let src = TriggerParameterSource {
            dependency_name: "dep-a".to_string(),
            data_template: "{{ data.missing.key }}".to_string(),
            data_key: "user.name".to_string(),
            ..Default::default()
        };
        assert_eq!(resolve_parameter_value(&src, &snapshot), Some("ada".to_string()));
    }

    #[test]
    fn test_apply_parameters_builds_document() {
        let snapshot = snapshot_with(json!({"user": {"name": "ada"}}));
        let params = vec![TriggerParameter {
            src: source("user.name", Some("anon")),
            dest: "payload.name".to_string(),
            operation: TriggerParameterOperation::Overwrite,
        }];

        let mut doc = json!({});
        apply_parameters(&mut doc, &params, &snapshot).unwrap();
        assert_eq!(doc, json!({"payload": {"name": "ada"}}));

        // default fallback when the event carries no data for the key
        let empty = snapshot_with(json!({}));
        let mut doc = json!({});
        apply_parameters(&mut doc, &params, &empty).unwrap();
        assert_eq!(doc, json!({"payload": {"name": "anon"}}));
    }

    #[test]
    fn test_unknown_dependency_errors() {
        let snapshot = snapshot_with(json!({}));
        let params = vec![TriggerParameter {
            src: TriggerParameterSource {
                dependency_name: "nope".to_string(),
                data_key: "x".to_string(),
                ..Default::default()
            },
            dest: "y".to_string(),
            operation: TriggerParameterOperation::None,
        }];

        let mut doc = json!({});
        let err = apply_parameters(&mut doc, &params, &snapshot).unwrap_err();
        assert!(matches!(err, ParameterError::UnknownDependency { .. }));
    }

    #[test]
    fn test_declaration_order_wins() {
        let snapshot = snapshot_with(json!({"a": "first", "b": "second"}));
        let params = vec![
            TriggerParameter {
                src: source("a", None),
                dest: "out".to_string(),
                operation: TriggerParameterOperation::Overwrite,
            },
            TriggerParameter {
                src: source("b", None),
                dest: "out".to_string(),
                operation: TriggerParameterOperation::Overwrite,
            },
        ];

        let mut doc = json!({});
        apply_parameters(&mut doc, &params, &snapshot).unwrap();
        assert_eq!(doc, json!({"out": "second"}));
    }

    #[test]
    fn test_append_operation_concatenates() {
        let snapshot = snapshot_with(json!({"suffix": "-v2"}));
        let params = vec![TriggerParameter {
            src: source("suffix", None),
            dest: "name".to_string(),
            operation: TriggerParameterOperation::Append,
        }];

        let mut doc = json!({"name": "deploy"});
        apply_parameters(&mut doc, &params, &snapshot).unwrap();
        assert_eq!(doc, json!({"name": "deploy-v2"}));
    }
}
