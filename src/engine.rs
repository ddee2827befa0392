use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::PipelineConfig;
use crate::domain::StageKind;
use crate::error::KiraError;
use crate::geo::GeoClient;
use crate::layout::DatasetLayout;
use crate::oracle::{self, Completion};
use crate::stages::{StageContext, stage_for};

/// Lifecycle of a stage inside one `ensure_complete` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Checking,
    RunningDependency,
    Running,
    Validating,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: StageKind,
    pub state: StageState,
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageAction {
    /// Output already valid; `run()` was not called.
    Skipped,
    Ran,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: StageKind,
    pub action: StageAction,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dataset: String,
    pub target: StageKind,
    pub started_at: String,
    pub stages: Vec<StageOutcome>,
}

impl RunReport {
    pub fn ran(&self) -> Vec<StageKind> {
        self.stages
            .iter()
            .filter(|outcome| outcome.action == StageAction::Ran)
            .map(|outcome| outcome.stage)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageStatus {
    pub stage: StageKind,
    pub output: String,
    pub completion: Completion,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub dataset: String,
    pub stages: Vec<StageStatus>,
}

/// Drives the stage chain for one dataset.
pub struct Engine<G: GeoClient> {
    config: PipelineConfig,
    layout: DatasetLayout,
    geo: G,
    cancel: CancelToken,
}

impl<G: GeoClient> Engine<G> {
    pub fn new(config: PipelineConfig, geo: G) -> Self {
        let layout = DatasetLayout::new(&config);
        Self {
            config,
            layout,
            geo,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    pub fn geo(&self) -> &G {
        &self.geo
    }

    /// Brings `target` and everything it depends on to Done.
    pub fn run(&self, target: StageKind, sink: &dyn ProgressSink) -> Result<RunReport, KiraError> {
        let mut report = RunReport {
            dataset: self.config.dataset_name.to_string(),
            target,
            started_at: chrono::Utc::now().to_rfc3339(),
            stages: Vec::new(),
        };
        info!(dataset = %self.config.dataset_name, %target, "pipeline started");
        self.ensure_complete(target, sink, &mut report)?;
        info!(ran = report.ran().len(), "pipeline finished");
        Ok(report)
    }

    /// Oracle verdict for every stage; nothing is run.
    pub fn status(&self) -> StatusReport {
        let ctx = self.context();
        let stages = StageKind::ALL
            .into_iter()
            .map(|kind| {
                let output = stage_for(kind).output(&ctx);
                StageStatus {
                    stage: kind,
                    output: output.path().to_string(),
                    completion: oracle::check(&output),
                }
            })
            .collect();
        StatusReport {
            dataset: self.config.dataset_name.to_string(),
            stages,
        }
    }

    fn context(&self) -> StageContext<'_> {
        StageContext {
            config: &self.config,
            layout: &self.layout,
            geo: &self.geo,
            cancel: &self.cancel,
        }
    }

    fn ensure_complete(
        &self,
        kind: StageKind,
        sink: &dyn ProgressSink,
        report: &mut RunReport,
    ) -> Result<(), KiraError> {
        self.cancel.check()?;
        let ctx = self.context();
        let stage = stage_for(kind);
        let output = stage.output(&ctx);

        emit(sink, kind, StageState::Checking, "checking output", None);
        let verdict = oracle::check(&output);
        if verdict.is_complete() {
            debug!(stage = %kind, "output valid, skipping");
            emit(sink, kind, StageState::Done, "already complete", None);
            report.stages.push(StageOutcome {
                stage: kind,
                action: StageAction::Skipped,
                elapsed_ms: 0,
            });
            return Ok(());
        }
        debug!(stage = %kind, ?verdict, "output incomplete");

        if let Some(predecessor) = stage.predecessor() {
            emit(
                sink,
                kind,
                StageState::RunningDependency,
                &format!("resolving {predecessor}"),
                None,
            );
            if let Err(err) = self.ensure_complete(predecessor, sink, report) {
                emit(sink, kind, StageState::Failed, "dependency failed", None);
                return Err(err);
            }
        }

        self.cancel.check()?;
        emit(sink, kind, StageState::Running, "running", None);
        info!(stage = %kind, "stage running");
        let start = Instant::now();
        if let Err(err) = stage.run(&ctx) {
            warn!(stage = %kind, error = %err, "stage failed");
            emit(sink, kind, StageState::Failed, &err.to_string(), Some(start.elapsed()));
            return Err(err.in_stage(kind));
        }

        emit(sink, kind, StageState::Validating, "validating output", None);
        let verdict = oracle::check(&output);
        if !verdict.is_complete() {
            warn!(stage = %kind, ?verdict, "output incomplete after run");
            emit(sink, kind, StageState::Failed, "output incomplete after run", None);
            return Err(KiraError::Incomplete { stage: kind });
        }

        let elapsed = start.elapsed();
        info!(stage = %kind, elapsed_ms = elapsed.as_millis() as u64, "stage done");
        emit(sink, kind, StageState::Done, "done", Some(elapsed));
        report.stages.push(StageOutcome {
            stage: kind,
            action: StageAction::Ran,
            elapsed_ms: elapsed.as_millis(),
        });
        Ok(())
    }
}

fn emit(
    sink: &dyn ProgressSink,
    stage: StageKind,
    state: StageState,
    message: &str,
    elapsed: Option<Duration>,
) {
    sink.event(ProgressEvent {
        stage,
        state,
        message: message.to_string(),
        elapsed,
    });
}
