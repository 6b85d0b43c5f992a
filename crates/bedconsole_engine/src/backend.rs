use std::time::Duration;

use bedconsole_core::{
    CompiledBed, FailureKind, JobId, JobSnapshot, ParameterDocument, RequestError, SectionValues,
    StatusEndpoint,
};
use engine_logging::{engine_debug, engine_warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::types::JobAccepted;
use crate::{CaseCreated, ModelGeneration};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Always ends with `/` so endpoint paths join underneath it.
    pub base_url: Url,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    /// Upper bound for a chain step waiting on a backend generation job.
    pub model_wait_timeout: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: parse_base_url(DEFAULT_BACKEND_URL).expect("default backend url"),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            model_wait_timeout: Duration::from_secs(600),
        }
    }
}

impl BackendSettings {
    pub fn with_base_url(base_url: &str) -> Result<Self, RequestError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            ..Self::default()
        })
    }
}

pub fn parse_base_url(raw: &str) -> Result<Url, RequestError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|err| RequestError::new(FailureKind::InvalidUrl, format!("{raw}: {err}")))?;
    if url.cannot_be_a_base() {
        return Err(RequestError::new(
            FailureKind::InvalidUrl,
            format!("{raw}: not a base url"),
        ));
    }
    Ok(url)
}

/// Body of the CFD case endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseRequest<'a> {
    pub json_file: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<&'a str>,
    pub case_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfd: Option<&'a SectionValues>,
}

/// The HTTP surface of the simulation backend.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn compile(&self, document: &ParameterDocument) -> Result<CompiledBed, RequestError>;

    async fn generate_model(
        &self,
        json_file: &str,
        open_viewer: bool,
    ) -> Result<ModelGeneration, RequestError>;

    async fn create_cfd_case(&self, request: &CaseRequest<'_>)
        -> Result<CaseCreated, RequestError>;

    async fn create_cfd_case_only(
        &self,
        request: &CaseRequest<'_>,
    ) -> Result<CaseCreated, RequestError>;

    async fn start_full_pipeline(&self, document: &ParameterDocument)
        -> Result<JobId, RequestError>;

    async fn job_status(
        &self,
        endpoint: StatusEndpoint,
        job_id: &JobId,
    ) -> Result<JobSnapshot, RequestError>;

    async fn list_jobs(&self) -> Result<Vec<JobSnapshot>, RequestError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, RequestError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| RequestError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RequestError> {
        self.base_url
            .join(path)
            .map_err(|err| RequestError::new(FailureKind::InvalidUrl, format!("{path}: {err}")))
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, RequestError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        engine_debug!("POST {}", url);
        let request = self.client.post(url).json(body);
        read_response(request.send().await.map_err(map_reqwest_error)?).await
    }

    /// Status route for `job_id`, with the id percent-encoded as one segment.
    fn job_url(&self, endpoint: StatusEndpoint, job_id: &JobId) -> Result<Url, RequestError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                RequestError::new(
                    FailureKind::InvalidUrl,
                    format!("{} cannot be a base", self.base_url),
                )
            })?
            .pop_if_empty()
            .extend(endpoint.segments())
            .push(job_id.as_str());
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
        self.get_url(self.endpoint(path)?).await
    }

    async fn get_url<T: DeserializeOwned>(&self, url: Url) -> Result<T, RequestError> {
        engine_debug!("GET {}", url);
        read_response(
            self.client
                .get(url)
                .send()
                .await
                .map_err(map_reqwest_error)?,
        )
        .await
    }
}

#[derive(Serialize)]
struct CompileRequest<'a> {
    parameters: &'a ParameterDocument,
}

#[derive(Serialize)]
struct GenerateModelRequest<'a> {
    json_file: &'a str,
    open_viewer: bool,
}

#[async_trait::async_trait]
impl Backend for ReqwestBackend {
    async fn compile(&self, document: &ParameterDocument) -> Result<CompiledBed, RequestError> {
        self.post(
            "bed/compile",
            &CompileRequest {
                parameters: document,
            },
        )
        .await
    }

    async fn generate_model(
        &self,
        json_file: &str,
        open_viewer: bool,
    ) -> Result<ModelGeneration, RequestError> {
        self.post(
            "model/generate",
            &GenerateModelRequest {
                json_file,
                open_viewer,
            },
        )
        .await
    }

    async fn create_cfd_case(
        &self,
        request: &CaseRequest<'_>,
    ) -> Result<CaseCreated, RequestError> {
        self.post("cfd/create-case", request).await
    }

    async fn create_cfd_case_only(
        &self,
        request: &CaseRequest<'_>,
    ) -> Result<CaseCreated, RequestError> {
        self.post("cfd/create-case-only", request).await
    }

    async fn start_full_pipeline(
        &self,
        document: &ParameterDocument,
    ) -> Result<JobId, RequestError> {
        let accepted: JobAccepted = self
            .post("pipeline/full-simulation", &full_simulation_body(document)?)
            .await?;
        Ok(accepted.job_id)
    }

    async fn job_status(
        &self,
        endpoint: StatusEndpoint,
        job_id: &JobId,
    ) -> Result<JobSnapshot, RequestError> {
        self.get_url(self.job_url(endpoint, job_id)?).await
    }

    async fn list_jobs(&self) -> Result<Vec<JobSnapshot>, RequestError> {
        self.get("jobs").await
    }
}

/// The full-simulation route takes the sections at top level and expects an
/// explicit `cfd: null` when the section is left out.
fn full_simulation_body(document: &ParameterDocument) -> Result<Value, RequestError> {
    let mut body = serde_json::to_value(document)
        .map_err(|err| RequestError::new(FailureKind::Decode, err.to_string()))?;
    if let Value::Object(map) = &mut body {
        map.entry("cfd").or_insert(Value::Null);
    }
    Ok(body)
}

async fn read_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, RequestError> {
    let status = response.status();
    let body = response.text().await.map_err(map_reqwest_error)?;
    if !status.is_success() {
        let message = error_detail(&body).unwrap_or_else(|| status.to_string());
        engine_warn!("Backend answered {}: {}", status, message);
        return Err(RequestError::new(
            FailureKind::HttpStatus(status.as_u16()),
            message,
        ));
    }
    serde_json::from_str(&body)
        .map_err(|err| RequestError::new(FailureKind::Decode, err.to_string()))
}

/// FastAPI style `{"detail": ...}` error bodies; falls back to the raw text.
fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(detail)) => Some(detail.clone()),
            Some(other) => Some(other.to_string()),
            None => Some(trimmed.to_string()),
        },
        _ => Some(trimmed.chars().take(200).collect()),
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> RequestError {
    if err.is_timeout() {
        return RequestError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return RequestError::new(FailureKind::Decode, err.to_string());
    }
    RequestError::new(FailureKind::Network, err.to_string())
}
