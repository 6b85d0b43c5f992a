use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::JobType;

/// Named pipeline variant; decides which backend calls a submission makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    ModelOnly,
    ModelPlusCfdCase,
    CfdCaseOnly,
    ModelInteractive,
    FullPipeline,
}

impl PipelineMode {
    pub const ALL: [PipelineMode; 5] = [
        PipelineMode::ModelOnly,
        PipelineMode::ModelPlusCfdCase,
        PipelineMode::CfdCaseOnly,
        PipelineMode::ModelInteractive,
        PipelineMode::FullPipeline,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineMode::ModelOnly => "model_only",
            PipelineMode::ModelPlusCfdCase => "model_plus_cfd_case",
            PipelineMode::CfdCaseOnly => "cfd_case_only",
            PipelineMode::ModelInteractive => "model_interactive",
            PipelineMode::FullPipeline => "full_pipeline",
        }
    }

    pub fn job_type(self) -> JobType {
        match self {
            PipelineMode::ModelOnly | PipelineMode::ModelInteractive => JobType::GenerateModel,
            PipelineMode::ModelPlusCfdCase | PipelineMode::CfdCaseOnly => JobType::Simulation,
            PipelineMode::FullPipeline => JobType::FullPipeline,
        }
    }

    /// Question asked after confirmation, before anything past compilation runs.
    pub fn prompt(self) -> Option<Prompt> {
        match self {
            PipelineMode::ModelOnly | PipelineMode::ModelInteractive => {
                Some(Prompt::GenerateModelNow)
            }
            PipelineMode::FullPipeline => Some(Prompt::RunFullPipelineNow),
            PipelineMode::ModelPlusCfdCase | PipelineMode::CfdCaseOnly => None,
        }
    }

    /// Fixed call plan. A declined prompt leaves only the compile call.
    pub fn plan(self, confirmed: bool) -> PipelinePlan {
        let steps = if !confirmed && self.prompt().is_some() {
            vec![PipelineStep::Compile]
        } else {
            match self {
                PipelineMode::ModelOnly => vec![
                    PipelineStep::Compile,
                    PipelineStep::GenerateModel { open_viewer: false },
                ],
                PipelineMode::ModelPlusCfdCase => vec![
                    PipelineStep::Compile,
                    PipelineStep::GenerateModel { open_viewer: false },
                    PipelineStep::CreateCfdCase,
                ],
                PipelineMode::CfdCaseOnly => {
                    vec![PipelineStep::Compile, PipelineStep::CreateCfdCaseOnly]
                }
                PipelineMode::ModelInteractive => vec![
                    PipelineStep::Compile,
                    PipelineStep::GenerateModel { open_viewer: true },
                ],
                PipelineMode::FullPipeline => vec![PipelineStep::FullSimulation],
            }
        };
        PipelinePlan { mode: self, steps }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pipeline mode `{0}`")]
pub struct UnknownMode(pub String);

impl FromStr for PipelineMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        PipelineMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    GenerateModelNow,
    RunFullPipelineNow,
}

impl Prompt {
    pub fn question(self) -> &'static str {
        match self {
            Prompt::GenerateModelNow => "Generate the 3D model now?",
            Prompt::RunFullPipelineNow => {
                "Run the full pipeline now (3D model + CFD simulation)?"
            }
        }
    }
}

/// One backend call in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    Compile,
    GenerateModel { open_viewer: bool },
    CreateCfdCase,
    CreateCfdCaseOnly,
    FullSimulation,
}

impl PipelineStep {
    pub fn label(self) -> &'static str {
        match self {
            PipelineStep::Compile => "compile",
            PipelineStep::GenerateModel { .. } => "generate model",
            PipelineStep::CreateCfdCase => "create cfd case",
            PipelineStep::CreateCfdCaseOnly => "create cfd case only",
            PipelineStep::FullSimulation => "full simulation",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePlan {
    mode: PipelineMode,
    steps: Vec<PipelineStep>,
}

impl PipelinePlan {
    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Compile alone answers synchronously with file references; no job is tracked.
    pub fn is_compile_only(&self) -> bool {
        self.steps == [PipelineStep::Compile]
    }

    /// The backend owns the job; the client only learns its id on acceptance.
    pub fn is_backend_tracked(&self) -> bool {
        self.steps.contains(&PipelineStep::FullSimulation)
    }

    /// Chained plans get one client-side job that records every step.
    pub fn creates_local_job(&self) -> bool {
        !self.is_compile_only() && !self.is_backend_tracked()
    }

    /// Progress reported once step `index` succeeds; steps share 0..100 evenly.
    pub fn progress_after(&self, index: usize) -> u8 {
        let total = self.steps.len().max(1);
        let done = (index + 1).min(total);
        ((done * 100) / total) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse_from_snake_or_kebab_names() {
        for mode in PipelineMode::ALL {
            assert_eq!(mode.as_str().parse::<PipelineMode>(), Ok(mode));
        }
        assert_eq!("full-pipeline".parse(), Ok(PipelineMode::FullPipeline));
        assert!("blender".parse::<PipelineMode>().is_err());
    }

    #[test]
    fn progress_is_split_across_steps() {
        let plan = PipelineMode::ModelPlusCfdCase.plan(true);
        assert_eq!(plan.progress_after(0), 33);
        assert_eq!(plan.progress_after(1), 66);
        assert_eq!(plan.progress_after(2), 100);
    }
}
