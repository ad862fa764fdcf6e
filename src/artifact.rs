use crate::error::ArtifactError;
use crate::types::JsonValue;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Reference to an opaque secret value held by the platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    pub key: String,
}

/// Resolves credentials by `(namespace, name, key)`. Implemented by the
/// embedding platform; the runtime never caches or logs resolved values.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<String, ArtifactError>;
}

/// S3 compliant artifact source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct S3Artifact {
    pub endpoint: String,
    pub bucket: String,
    pub key: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub insecure: bool,
    pub access_key: Option<SecretKeySelector>,
    pub secret_key: Option<SecretKeySelector>,
}

/// Artifact stored in a file reachable from the sensor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileArtifact {
    pub path: String,
}

/// Artifact at an HTTP endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UrlArtifact {
    /// Complete URL
    pub path: String,
    /// Whether to validate the TLS certificate
    #[serde(default)]
    pub verify_cert: bool,
}

/// Artifact held in a platform configmap
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigmapArtifact {
    pub name: String,
    pub namespace: String,
    pub key: String,
}

/// Configuration of a git remote
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GitRemoteConfig {
    pub name: String,
    pub urls: Vec<String>,
}

/// Git username/password credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GitCreds {
    pub username: Option<SecretKeySelector>,
    pub password: Option<SecretKeySelector>,
}

/// Artifact hosted in a git repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GitArtifact {
    pub url: String,
    #[serde(default)]
    pub clone_directory: String,
    pub creds: Option<GitCreds>,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub ssh_key_path: String,
    pub file_path: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default, rename = "ref")]
    pub git_ref: String,
    pub remote: Option<GitRemoteConfig>,
}

/// Source location for a trigger template body. Exactly one variant,
/// keyed the way the resource JSON spells it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactLocation {
    S3(S3Artifact),
    /// Template embedded in the sensor spec as a string
    Inline(String),
    File(FileArtifact),
    Url(UrlArtifact),
    Configmap(ConfigmapArtifact),
    Git(GitArtifact),
    /// Live cluster object reference, fetched by the platform
    Resource(JsonValue),
}

/// Fetches a template body from an artifact location
#[async_trait]
pub trait ArtifactReader: Send + Sync {
    async fn fetch(&self, location: &ArtifactLocation) -> Result<Vec<u8>, ArtifactError>;
}

/// Fetcher for the artifact kinds that live outside the sensor's own
/// process (configmap, S3, git, live resource). Injected by the
/// embedding platform.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, location: &ArtifactLocation) -> Result<Vec<u8>, ArtifactError>;
}

/// Built-in reader: inline, file, and URL artifacts are handled here;
/// the platform-owned kinds delegate to injected fetchers.
pub struct DefaultArtifactReader {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
    configmap: Option<Arc<dyn RemoteFetcher>>,
    s3: Option<Arc<dyn RemoteFetcher>>,
    git: Option<Arc<dyn RemoteFetcher>>,
    resource: Option<Arc<dyn RemoteFetcher>>,
}

impl DefaultArtifactReader {
    pub fn new() -> Result<Self, ArtifactError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ArtifactError::Fetch(e.to_string()))?;
        let insecure_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| ArtifactError::Fetch(e.to_string()))?;
        Ok(Self {
            client,
            insecure_client,
            configmap: None,
            s3: None,
            git: None,
            resource: None,
        })
    }

    pub fn with_configmap_fetcher(mut self, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        self.configmap = Some(fetcher);
        self
    }

    pub fn with_s3_fetcher(mut self, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        self.s3 = Some(fetcher);
        self
    }

    pub fn with_git_fetcher(mut self, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        self.git = Some(fetcher);
        self
    }

    pub fn with_resource_fetcher(mut self, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        self.resource = Some(fetcher);
        self
    }

    async fn delegate(
        &self,
        fetcher: &Option<Arc<dyn RemoteFetcher>>,
        kind: &'static str,
        location: &ArtifactLocation,
    ) -> Result<Vec<u8>, ArtifactError> {
        match fetcher {
            Some(f) => f.fetch(location).await,
            None => Err(ArtifactError::Unsupported(kind)),
        }
    }
}

#[async_trait]
impl ArtifactReader for DefaultArtifactReader {
    async fn fetch(&self, location: &ArtifactLocation) -> Result<Vec<u8>, ArtifactError> {
        match location {
            ArtifactLocation::Inline(body) => Ok(body.as_bytes().to_vec()),
            ArtifactLocation::File(file) => Ok(tokio::fs::read(&file.path).await?),
            ArtifactLocation::Url(url) => {
                let client = if url.verify_cert {
                    &self.client
                } else {
                    &self.insecure_client
                };
                let response = client.get(&url.path).send().await.map_err(|e| {
                    ArtifactError::Url {
                        url: url.path.clone(),
                        reason: e.to_string(),
                    }
                })?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ArtifactError::Url {
                        url: url.path.clone(),
                        reason: format!("status {}", status),
                    });
                }
                let bytes = response.bytes().await.map_err(|e| ArtifactError::Url {
                    url: url.path.clone(),
                    reason: e.to_string(),
                })?;
                Ok(bytes.to_vec())
            }
            ArtifactLocation::Configmap(_) => {
                self.delegate(&self.configmap, "configmap", location).await
            }
            ArtifactLocation::S3(_) => self.delegate(&self.s3, "s3", location).await,
            ArtifactLocation::Git(_) => self.delegate(&self.git, "git", location).await,
            ArtifactLocation::Resource(_) => {
                self.delegate(&self.resource, "resource", location).await
            }
        }
    }
}
