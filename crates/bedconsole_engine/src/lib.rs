//! Bed console engine: backend HTTP client and submission chain execution.
mod backend;
mod engine;
mod pipeline;
mod types;

pub use backend::{
    parse_base_url, Backend, BackendSettings, CaseRequest, ReqwestBackend, DEFAULT_BACKEND_URL,
};
pub use engine::EngineHandle;
pub use pipeline::{ChainSink, PipelineRunner, WaitSettings};
pub use types::{CaseCreated, EngineError, EngineEvent, ModelGeneration};
