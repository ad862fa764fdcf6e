use crate::artifact::{ArtifactReader, SecretResolver};
use crate::error::{ParameterError, TriggerError};
use crate::event::Event;
use crate::params;
use crate::sensor::{BasicAuth, HttpTrigger, Trigger, TriggerBody, TriggerSwitch, TriggerTemplate};
use crate::types::{JsonValue, TriggerCycleState};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default HTTP trigger timeout in seconds
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Result of one backend dispatch. The status code drives status-policy
/// evaluation; `resource` carries the created/updated object for
/// resource-label policies.
#[derive(Debug, Clone)]
pub struct TriggerResult {
    pub status_code: u16,
    pub message: Option<String>,
    pub resource: Option<JsonValue>,
}

/// A trigger backend: executes one materialized trigger.
///
/// `resource` is the parameterized trigger document (the fetched
/// template for resource triggers, the trigger's own configuration
/// otherwise); `payload` is the constructed request payload for
/// body-carrying triggers.
#[async_trait]
pub trait TriggerBackend: Send + Sync {
    /// Registry key; must equal the `TriggerBody` kind it handles
    fn kind(&self) -> &'static str;

    async fn execute(
        &self,
        template: &TriggerTemplate,
        resource: &JsonValue,
        payload: Option<&JsonValue>,
    ) -> Result<TriggerResult, TriggerError>;
}

/// Reads the current labels of a dispatched resource, for resource
/// policies. Implemented by the embedding platform.
#[async_trait]
pub trait ResourceLabelProbe: Send + Sync {
    async fn labels(&self, resource: &JsonValue) -> Result<HashMap<String, String>, TriggerError>;
}

/// How one trigger in a cycle ended
#[derive(Debug)]
pub enum TriggerOutcomeStatus {
    Completed { message: String },
    Skipped { reason: String },
    Failed { error: TriggerError, terminal: bool },
}

#[derive(Debug)]
pub struct TriggerOutcome {
    pub name: String,
    pub status: TriggerOutcomeStatus,
}

/// Result of one trigger cycle, in trigger declaration order
#[derive(Debug)]
pub struct CycleOutcome {
    pub outcomes: Vec<TriggerOutcome>,
    pub cycle_status: TriggerCycleState,
    /// Set when a policy demanded the sensor itself go to Error
    pub terminal_error: Option<String>,
}

/// Whether a trigger's switch admits execution for the satisfied round.
/// `any` is an OR over groups, `all` an AND; an absent switch admits.
pub fn switch_allows(switch: Option<&TriggerSwitch>, group_complete: &HashMap<String, bool>) -> bool {
    let Some(switch) = switch else {
        return true;
    };
    if !switch.any.is_empty() {
        return switch
            .any
            .iter()
            .any(|g| group_complete.get(g).copied().unwrap_or(false));
    }
    if !switch.all.is_empty() {
        return switch
            .all
            .iter()
            .all(|g| group_complete.get(g).copied().unwrap_or(false));
    }
    true
}

/// Executes the triggers of a satisfied round, sequentially and in
/// declaration order, and evaluates each trigger's policy.
///
/// The backend registry is concurrent so backends can be registered on
/// a shared dispatcher after sensors are already running.
pub struct TriggerDispatcher {
    backends: DashMap<&'static str, Arc<dyn TriggerBackend>>,
    artifacts: Arc<dyn ArtifactReader>,
    probe: Option<Arc<dyn ResourceLabelProbe>>,
}

impl TriggerDispatcher {
    pub fn new(artifacts: Arc<dyn ArtifactReader>) -> Self {
        Self {
            backends: DashMap::new(),
            artifacts,
            probe: None,
        }
    }

    pub fn register_backend(&self, backend: Arc<dyn TriggerBackend>) {
        self.backends.insert(backend.kind(), backend);
    }

    pub fn with_backend(self, backend: Arc<dyn TriggerBackend>) -> Self {
        self.register_backend(backend);
        self
    }

    pub fn with_resource_probe(mut self, probe: Arc<dyn ResourceLabelProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Run every trigger for one satisfied round.
    ///
    /// A failing trigger never cancels the ones after it; the cycle
    /// status aggregates to Failure if any trigger failed.
    pub async fn dispatch_cycle(
        &self,
        triggers: &[Trigger],
        snapshot: &HashMap<String, Event>,
        group_complete: &HashMap<String, bool>,
    ) -> CycleOutcome {
        let mut outcomes = Vec::with_capacity(triggers.len());
        let mut any_failed = false;
        let mut terminal_error = None;

        for trigger in triggers {
            let name = trigger.template.name.clone();

            if !switch_allows(trigger.template.switch.as_ref(), group_complete) {
                outcomes.push(TriggerOutcome {
                    name,
                    status: TriggerOutcomeStatus::Skipped {
                        reason: "switch condition not met".to_string(),
                    },
                });
                continue;
            }

            match self.execute_trigger(trigger, snapshot).await {
                Ok(message) => outcomes.push(TriggerOutcome {
                    name,
                    status: TriggerOutcomeStatus::Completed { message },
                }),
                Err(error) => {
                    any_failed = true;
                    let terminal = is_terminal(trigger, &error);
                    if terminal && terminal_error.is_none() {
                        terminal_error = Some(error.to_string());
                    }
                    outcomes.push(TriggerOutcome {
                        name,
                        status: TriggerOutcomeStatus::Failed { error, terminal },
                    });
                }
            }
        }

        CycleOutcome {
            outcomes,
            cycle_status: if any_failed {
                TriggerCycleState::Failure
            } else {
                TriggerCycleState::Success
            },
            terminal_error,
        }
    }

    async fn execute_trigger(
        &self,
        trigger: &Trigger,
        snapshot: &HashMap<String, Event>,
    ) -> Result<String, TriggerError> {
        let template = &trigger.template;
        let name = &template.name;

        // Materialize: fetched template for resource triggers, the
        // trigger's own configuration document otherwise.
        let mut resource = match template.body.source() {
            Some(location) => {
                let bytes = self.artifacts.fetch(location).await.map_err(|e| {
                    TriggerError::DispatchFailed {
                        name: name.clone(),
                        reason: e.to_string(),
                    }
                })?;
                serde_yaml::from_slice(&bytes).map_err(|e| TriggerError::DispatchFailed {
                    name: name.clone(),
                    reason: format!("template body does not parse: {}", e),
                })?
            }
            None => template.body.to_document(),
        };

        let map_param = |e: ParameterError| TriggerError::DispatchFailed {
            name: name.clone(),
            reason: e.to_string(),
        };

        params::apply_parameters(&mut resource, &trigger.parameters, snapshot).map_err(map_param)?;
        params::apply_parameters(&mut resource, template.body.resource_parameters(), snapshot)
            .map_err(map_param)?;

        let payload = match template.body.payload() {
            Some(parameters) => Some(params::build_payload(parameters, snapshot).map_err(map_param)?),
            None => None,
        };

        let backend = self
            .backends
            .get(template.body.kind())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TriggerError::NoBackend(template.body.kind().to_string()))?;

        let result = backend.execute(template, &resource, payload.as_ref()).await?;
        self.evaluate_policy(trigger, &result).await?;

        Ok(result
            .message
            .clone()
            .unwrap_or_else(|| format!("dispatched with status {}", result.status_code)))
    }

    async fn evaluate_policy(
        &self,
        trigger: &Trigger,
        result: &TriggerResult,
    ) -> Result<(), TriggerError> {
        let name = &trigger.template.name;
        let Some(policy) = &trigger.policy else {
            return Ok(());
        };

        if let Some(status) = &policy.status {
            if status.allow.contains(&result.status_code) {
                return Ok(());
            }
            return Err(TriggerError::StatusNotAllowed {
                name: name.clone(),
                status: result.status_code,
            });
        }

        if let Some(k8s) = &policy.k8s {
            let probe = self
                .probe
                .as_ref()
                .ok_or_else(|| TriggerError::NoResourceProbe { name: name.clone() })?
                .clone();
            let resource = result.resource.clone().unwrap_or(JsonValue::Null);
            let wanted = k8s.labels.clone();

            let satisfied = k8s
                .backoff
                .poll(move || {
                    let probe = probe.clone();
                    let resource = resource.clone();
                    let wanted = wanted.clone();
                    async move {
                        match probe.labels(&resource).await {
                            Ok(labels) => wanted
                                .iter()
                                .all(|(k, v)| labels.get(k) == Some(v))
                                .then_some(()),
                            Err(_) => None,
                        }
                    }
                })
                .await;

            if satisfied.is_none() {
                return Err(TriggerError::PolicyTimeout { name: name.clone() });
            }
        }

        Ok(())
    }
}

/// A failing policy is terminal for the sensor only when the trigger's
/// resource policy says timeouts are.
fn is_terminal(trigger: &Trigger, error: &TriggerError) -> bool {
    matches!(error, TriggerError::PolicyTimeout { .. })
        && trigger
            .policy
            .as_ref()
            .and_then(|p| p.k8s.as_ref())
            .map(|k8s| k8s.error_on_backoff_timeout)
            .unwrap_or(false)
}

impl TriggerBody {
    /// The inner configuration document parameters are applied against
    pub fn to_document(&self) -> JsonValue {
        let result = match self {
            TriggerBody::K8s(t) => serde_json::to_value(t),
            TriggerBody::ArgoWorkflow(t) => serde_json::to_value(t),
            TriggerBody::Http(t) => serde_json::to_value(t),
            TriggerBody::AwsLambda(t) => serde_json::to_value(t),
            TriggerBody::Custom(t) => serde_json::to_value(t),
            TriggerBody::Kafka(t) => serde_json::to_value(t),
            TriggerBody::Nats(t) => serde_json::to_value(t),
            TriggerBody::Slack(t) => serde_json::to_value(t),
            TriggerBody::OpenWhisk(t) => serde_json::to_value(t),
        };
        result.unwrap_or(JsonValue::Null)
    }
}

/// Reference backend: dispatches HTTP triggers with reqwest.
///
/// Basic auth credentials resolve through the secret store; the request
/// times out after the trigger's `timeout` (default 60 s).
pub struct HttpTriggerBackend {
    secrets: Option<Arc<dyn SecretResolver>>,
}

impl HttpTriggerBackend {
    pub fn new() -> Self {
        Self { secrets: None }
    }

    pub fn with_secret_resolver(mut self, secrets: Arc<dyn SecretResolver>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    async fn resolve_basic_auth(
        &self,
        name: &str,
        auth: &BasicAuth,
    ) -> Result<(String, String), TriggerError> {
        let secrets = self
            .secrets
            .as_ref()
            .ok_or_else(|| TriggerError::DispatchFailed {
                name: name.to_string(),
                reason: "basic auth configured but no secret resolver available".to_string(),
            })?;

        let mut resolved = [String::new(), String::new()];
        for (i, selector) in [auth.username.as_ref(), auth.password.as_ref()]
            .into_iter()
            .enumerate()
        {
            if let Some(selector) = selector {
                let namespace = if selector.namespace.is_empty() {
                    &auth.namespace
                } else {
                    &selector.namespace
                };
                resolved[i] = secrets
                    .resolve(namespace, &selector.name, &selector.key)
                    .await
                    .map_err(|e| TriggerError::DispatchFailed {
                        name: name.to_string(),
                        reason: e.to_string(),
                    })?;
            }
        }
        let [username, password] = resolved;
        Ok((username, password))
    }
}

impl Default for HttpTriggerBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TriggerBackend for HttpTriggerBackend {
    fn kind(&self) -> &'static str {
        "http"
    }

    async fn execute(
        &self,
        template: &TriggerTemplate,
        resource: &JsonValue,
        payload: Option<&JsonValue>,
    ) -> Result<TriggerResult, TriggerError> {
        let name = &template.name;
        let fail = |reason: String| TriggerError::DispatchFailed {
            name: name.clone(),
            reason,
        };

        // The parameterized document, not the body as declared
        let http: HttpTrigger =
            serde_json::from_value(resource.clone()).map_err(|e| fail(e.to_string()))?;

        let timeout = if http.timeout == 0 {
            DEFAULT_HTTP_TIMEOUT_SECS
        } else {
            http.timeout
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| fail(e.to_string()))?;

        let method = if http.method.is_empty() {
            reqwest::Method::POST
        } else {
            reqwest::Method::from_bytes(http.method.as_bytes())
                .map_err(|_| fail(format!("invalid HTTP method '{}'", http.method)))?
        };

        let mut request = client.request(method, &http.url);
        for (key, value) in &http.headers {
            request = request.header(key, value);
        }
        if let Some(auth) = &http.basic_auth {
            let (username, password) = self.resolve_basic_auth(name, auth).await?;
            request = request.basic_auth(username, Some(password));
        }
        if let Some(body) = payload {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| fail(e.to_string()))?;
        Ok(TriggerResult {
            status_code: response.status().as_u16(),
            message: None,
            resource: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_any_is_or() {
        let phases = HashMap::from([("g1".to_string(), true), ("g2".to_string(), false)]);
        let switch = TriggerSwitch {
            any: vec!["g1".to_string(), "g2".to_string()],
            all: Vec::new(),
        };
        assert!(switch_allows(Some(&switch), &phases));

        let switch = TriggerSwitch {
            any: vec!["g2".to_string()],
            all: Vec::new(),
        };
        assert!(!switch_allows(Some(&switch), &phases));
    }

    #[test]
    fn test_switch_all_is_and() {
        let phases = HashMap::from([("g1".to_string(), true), ("g2".to_string(), false)]);
        let switch = TriggerSwitch {
            any: Vec::new(),
            all: vec!["g1".to_string(), "g2".to_string()],
        };
        assert!(!switch_allows(Some(&switch), &phases));

        let switch = TriggerSwitch {
            any: Vec::new(),
            all: vec!["g1".to_string()],
        };
        assert!(switch_allows(Some(&switch), &phases));
    }

    #[test]
    fn test_absent_switch_admits() {
        assert!(switch_allows(None, &HashMap::new()));
    }

    #[test]
    fn test_unknown_switch_group_does_not_admit() {
        let switch = TriggerSwitch {
            any: vec!["mystery".to_string()],
            all: Vec::new(),
        };
        assert!(!switch_allows(Some(&switch), &HashMap::new()));
    }
}
