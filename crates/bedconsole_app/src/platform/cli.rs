use std::path::PathBuf;

use bedconsole_core::PipelineMode;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bedconsole")]
#[command(about = "Submit packed-bed pipelines and follow their jobs", long_about = None)]
pub struct Cli {
    /// RON config file (defaults to ./bedconsole.ron when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Backend API base URL, overriding the config file
    #[arg(long, global = true)]
    pub backend_url: Option<String>,
    /// Job status poll interval in milliseconds
    #[arg(long, global = true)]
    pub poll_interval_ms: Option<u64>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fill the wizard from a parameter file and submit it
    Submit {
        /// model_only, model_plus_cfd_case, cfd_case_only, model_interactive or full_pipeline
        mode: PipelineMode,
        /// RON parameter file: section -> field -> value
        #[arg(long)]
        params: Option<PathBuf>,
        /// Include the optional CFD section
        #[arg(long)]
        with_cfd: bool,
        /// Model file used by cfd_case_only submissions
        #[arg(long)]
        existing_model: Option<String>,
        /// Answer yes to the mode's confirmation prompt
        #[arg(long)]
        yes: bool,
        /// Return once the submission is dispatched instead of following the job
        #[arg(long)]
        no_follow: bool,
    },
    /// List backend jobs
    Jobs {
        /// Keep polling until every listed job is finished
        #[arg(long)]
        watch: bool,
    },
    /// Follow one backend job until it finishes
    Watch {
        job_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_arguments_parse() {
        let cli = Cli::try_parse_from([
            "bedconsole",
            "--backend-url",
            "http://sim:8000/api",
            "submit",
            "full-pipeline",
            "--params",
            "bed.ron",
            "--yes",
        ])
        .unwrap();
        assert_eq!(cli.backend_url.as_deref(), Some("http://sim:8000/api"));
        match cli.command {
            Command::Submit {
                mode, params, yes, ..
            } => {
                assert_eq!(mode, PipelineMode::FullPipeline);
                assert_eq!(params, Some(PathBuf::from("bed.ron")));
                assert!(yes);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["bedconsole", "submit", "mesh_only"]).is_err());
    }
}
