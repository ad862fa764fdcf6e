#[cfg(test)]
mod tests {
    use crate::error::ValidationError;
    use crate::sensor::{
        DependencyGroup, EventDependency, HttpTrigger, Sensor, SensorSpec, Trigger, TriggerBody,
        TriggerSwitch, TriggerTemplate,
    };
    use crate::types::fnv32a;

    fn http_trigger(name: &str) -> Trigger {
        Trigger {
            template: TriggerTemplate {
                name: name.to_string(),
                switch: None,
                body: TriggerBody::Http(HttpTrigger {
                    url: "http://example.com/hook".to_string(),
                    payload: Vec::new(),
                    tls: None,
                    method: String::new(),
                    parameters: Vec::new(),
                    timeout: 0,
                    basic_auth: None,
                    headers: Default::default(),
                }),
            },
            parameters: Vec::new(),
            policy: None,
        }
    }

    fn dependency(name: &str) -> EventDependency {
        EventDependency {
            name: name.to_string(),
            gateway_name: String::new(),
            event_source_name: "webhook".to_string(),
            event_name: "push".to_string(),
            filters: None,
        }
    }

    fn sensor() -> Sensor {
        Sensor::new(
            "test-sensor",
            SensorSpec {
                dependencies: vec![dependency("dep-a")],
                triggers: vec![http_trigger("notify")],
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_node_id_matches_hash_rule() {
        let sensor = sensor();
        assert_eq!(sensor.node_id("test-sensor"), "test-sensor");
        assert_eq!(
            sensor.node_id("dep-a"),
            format!("test-sensor-{}", fnv32a("dep-a"))
        );
        // stable across calls
        assert_eq!(sensor.node_id("dep-a"), sensor.node_id("dep-a"));
    }

    #[test]
    fn test_resolved_source_prefers_event_source_name() {
        let mut dep = dependency("dep-a");
        dep.gateway_name = "legacy-gateway".to_string();
        assert_eq!(dep.resolved_source(), "webhook");

        dep.event_source_name = String::new();
        assert_eq!(dep.resolved_source(), "legacy-gateway");
    }

    #[test]
    fn test_validate_accepts_minimal_sensor() {
        assert!(sensor().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_dependency() {
        let mut sensor = sensor();
        sensor.spec.dependencies.push(dependency("dep-a"));
        assert_eq!(
            sensor.validate(),
            Err(ValidationError::DuplicateDependency("dep-a".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_unknown_group_member() {
        let mut sensor = sensor();
        sensor.spec.dependency_groups.push(DependencyGroup {
            name: "g1".to_string(),
            dependencies: vec!["nope".to_string()],
        });
        assert!(matches!(
            sensor.validate(),
            Err(ValidationError::UnknownGroupDependency { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_circuit_over_unknown_group() {
        let mut sensor = sensor();
        sensor.spec.dependency_groups.push(DependencyGroup {
            name: "g1".to_string(),
            dependencies: vec!["dep-a".to_string()],
        });
        sensor.spec.circuit = "g1 && g2".to_string();
        assert_eq!(
            sensor.validate(),
            Err(ValidationError::UnknownCircuitGroup("g2".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_circuit_without_groups() {
        let mut sensor = sensor();
        sensor.spec.circuit = "g1".to_string();
        assert_eq!(sensor.validate(), Err(ValidationError::CircuitWithoutGroups));
    }

    #[test]
    fn test_validate_rejects_unknown_switch_group() {
        let mut sensor = sensor();
        sensor.spec.triggers[0].template.switch = Some(TriggerSwitch {
            any: vec!["g9".to_string()],
            all: Vec::new(),
        });
        assert!(matches!(
            sensor.validate(),
            Err(ValidationError::UnknownSwitchGroup { .. })
        ));
    }

    #[test]
    fn test_trigger_body_one_of_serialization() {
        let trigger = http_trigger("notify");
        let json = serde_json::to_value(&trigger).unwrap();
        assert_eq!(json["template"]["name"], "notify");
        assert_eq!(json["template"]["http"]["url"], "http://example.com/hook");

        let parsed: Trigger = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.template.body.kind(), "http");
    }

    #[test]
    fn test_sensor_spec_yaml_round_trip() {
        let yaml = r#"
dependencies:
  - name: dep-a
    eventSourceName: webhook
    eventName: push
dependencyGroups:
  - name: g1
    dependencies: [dep-a]
circuit: g1
triggers:
  - template:
      name: notify
      http:
        url: http://example.com/hook
errorOnFailedRound: true
"#;
        let spec: SensorSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.dependencies.len(), 1);
        assert_eq!(spec.circuit, "g1");
        assert!(spec.error_on_failed_round);
        assert_eq!(spec.triggers[0].template.body.kind(), "http");

        let sensor = Sensor::new("s", spec);
        assert!(sensor.validate().is_ok());
    }
}
