use runvault_artifact::ArtifactObject;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRunRequest {
    #[serde(rename = "runId", default)]
    pub run_id: Option<String>,
    #[serde(rename = "artifactUri")]
    pub artifact_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRunResponse {
    #[serde(rename = "runId")]
    pub run_id: String,
    #[serde(rename = "artifactUri")]
    pub artifact_uri: String,
}

/// Query string shared by the artifact endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactQuery {
    pub run_id: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListArtifactsResponse {
    #[serde(rename = "rootUri")]
    pub root_uri: String,
    pub files: Vec<ArtifactObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
}
