//! LoopController - the two-phase execute/verify loop.
//!
//! Each iteration invokes the worker once. Between invocations the controller
//! only looks at artifacts: a checkpoint file moves the task into review, a
//! pass file ends it, and anything else sends it back to execution. Nothing
//! about the phase is kept only in memory, so a restarted run picks up where
//! the last one stopped.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};

use super::session::{IterationBudget, LoopSession, Phase};
use super::task_info::TaskInfo;
use crate::artifact::{
    ArtifactLayout, ArtifactStore, BLUEPRINT_FILE, RESEARCH_FILE, pending_lines, set_implementation_marker,
};
use crate::error::{Result, TaskloopError};
use crate::escalation::{DEFAULT_FORCE_RESEARCH_AFTER, EscalationPolicy, Scope, ScopeCascade};
use crate::execution::StateRepairValidator;
use crate::insights::{Insight, InsightStore};
use crate::oracle::CompletionOracle;
use crate::prompt::{CLASSIFY_SCOPE_TEMPLATE, EXECUTE_TEMPLATE, PromptContext, PromptLoader, PromptRenderer, VERIFY_TEMPLATE};
use crate::worker::{Worker, WorkerRequest};
use crate::workspace::{WorkspaceContext, validate_task_id};

/// First line of a pass file the controller wrote itself
pub const AUTO_GENERATED_MARKER: &str = "<!-- auto-generated -->";

/// Inputs of one `run()` call
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// What the task should achieve; must not be blank
    pub instruction: String,
    pub budget: IterationBudget,
    /// Wipe the task's artifacts and history before starting; the blueprint is kept
    pub clear_folder: bool,
}

impl RunConfig {
    pub fn new(instruction: impl Into<String>, budget: IterationBudget) -> Self {
        Self {
            instruction: instruction.into(),
            budget,
            clear_folder: false,
        }
    }

    pub fn fresh(mut self) -> Self {
        self.clear_folder = true;
        self
    }
}

/// Outcome of a verified run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub task_id: String,
    pub iterations_used: u32,
    pub pending: usize,
    pub completed: usize,
    /// The review left no verdict and no pending items, so a pass was synthesized
    pub auto_passed: bool,
    pub scope: Option<Scope>,
}

/// Controller behaviour that comes from configuration
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub layout: ArtifactLayout,
    pub auto_pass_on_empty_checklist: bool,
    pub force_research_after: u32,
    /// Resolve a task scope before the first iteration
    pub multi_repo: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            layout: ArtifactLayout::default(),
            auto_pass_on_empty_checklist: true,
            force_research_after: DEFAULT_FORCE_RESEARCH_AFTER,
            multi_repo: false,
        }
    }
}

/// Drives a task to a verified result
pub struct LoopController {
    worker: Arc<dyn Worker>,
    store: Arc<dyn ArtifactStore>,
    workspace: WorkspaceContext,
    oracle: CompletionOracle,
    escalation: EscalationPolicy,
    repairer: StateRepairValidator,
    loader: PromptLoader,
    renderer: PromptRenderer,
    insights: InsightStore,
    options: ControllerOptions,
}

impl LoopController {
    pub fn new(
        worker: Arc<dyn Worker>,
        store: Arc<dyn ArtifactStore>,
        workspace: WorkspaceContext,
        loader: PromptLoader,
        options: ControllerOptions,
    ) -> Result<Self> {
        Ok(Self {
            oracle: CompletionOracle::new(store.clone(), options.layout),
            escalation: EscalationPolicy::new(store.clone(), options.force_research_after),
            repairer: StateRepairValidator::new()?,
            renderer: PromptRenderer::new(),
            insights: InsightStore::new(workspace.insights_path()),
            worker,
            store,
            workspace,
            loader,
            options,
        })
    }

    pub fn oracle(&self) -> &CompletionOracle {
        &self.oracle
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Run the loop until the review passes, the worker fails, or the budget runs out
    pub async fn run(&self, task_id: &str, config: &RunConfig) -> Result<RunSummary> {
        self.check_inputs(task_id, config)?;

        if config.clear_folder {
            let removed = self.store.clear_except(task_id, &[BLUEPRINT_FILE])?;
            info!("Fresh start for task {}: cleared {} artifacts", task_id, removed);
        }

        let mut info = TaskInfo::load(self.store.as_ref(), task_id);
        let mut session = LoopSession::new(task_id, config.budget);

        if self.options.multi_repo {
            session.scope = Some(self.resolve_scope(task_id).await?);
        }

        if self.escalation.escalate(task_id, &mut info)? {
            warn!(
                "Task {} failed {} times, forcing fresh research",
                task_id, info.attempts
            );
            session.force_research = true;
            info.save(self.store.as_ref(), task_id)?;
        }

        while session.has_budget() {
            self.clear_stale_verdicts(&mut session)?;
            session.phase = self.current_phase(task_id);
            tracing::info!(
                task_id = %task_id,
                iteration = session.iteration,
                phase = %session.phase,
                "Starting iteration"
            );

            let prompt = self.render_prompt(&session, config)?;
            let attempt = info.begin_attempt(Utc::now());
            let request = WorkerRequest::new(task_id, prompt, self.workspace.root());

            if let Err(e) = self.worker.invoke(request).await {
                let message = e.to_string();
                tracing::error!(task_id = %task_id, attempt, error = %message, "Worker invocation failed");
                info.record_failure(attempt, &message, Some(&format!("{:?}", e)), Utc::now());
                if let Err(save_err) = info.save(self.store.as_ref(), task_id) {
                    warn!("Failed to save task info for {}: {}", task_id, save_err);
                }
                self.mark_checklist(task_id, false);
                return Err(TaskloopError::WorkerInvocation { attempt, message });
            }

            info.record_success(attempt, Utc::now());
            info.save(self.store.as_ref(), task_id)?;
            session.force_research = false;
            self.maintain_record(task_id);

            match session.phase {
                Phase::Execute => self.after_execute(task_id),
                Phase::Verify => {
                    if let Some(summary) = self.after_verify(&mut session)? {
                        self.record_insight(&summary).await;
                        return Ok(summary);
                    }
                }
            }

            session.advance();
        }

        let iterations = session.iterations_used();
        let checklist = self.oracle.checklist(task_id);
        tracing::error!(task_id = %task_id, iterations, "Iteration budget exhausted");
        Err(TaskloopError::IterationBudgetExhausted {
            iterations,
            remaining: if checklist.trim().is_empty() {
                "(no checklist written)".to_string()
            } else {
                checklist
            },
        })
    }

    fn check_inputs(&self, task_id: &str, config: &RunConfig) -> Result<()> {
        validate_task_id(task_id)?;
        if config.instruction.trim().is_empty() {
            return Err(TaskloopError::InvalidState("instruction must not be empty".to_string()));
        }
        if config.budget == IterationBudget::Limited(0) {
            return Err(TaskloopError::InvalidState("max iterations must be at least 1".to_string()));
        }
        let mut required = vec![EXECUTE_TEMPLATE, VERIFY_TEMPLATE];
        if self.options.multi_repo {
            required.push(CLASSIFY_SCOPE_TEMPLATE);
        }
        self.loader.require(&required)
    }

    async fn resolve_scope(&self, task_id: &str) -> Result<Scope> {
        let template = self.loader.load(CLASSIFY_SCOPE_TEMPLATE)?;
        let cascade = ScopeCascade::standard(
            self.worker.clone(),
            template,
            task_id,
            self.workspace.root().to_path_buf(),
        );
        let scope = self.escalation.resolve_scope(task_id, &cascade).await?;
        tracing::info!(task_id = %task_id, scope = %scope, "Scope resolved");
        Ok(scope)
    }

    /// Remove verdicts left by an earlier review, keeping any findings for the next prompt
    fn clear_stale_verdicts(&self, session: &mut LoopSession) -> Result<()> {
        let task_id = session.task_id.as_str();
        if let Some(findings) = self.oracle.findings(task_id) {
            session.previous_findings = Some(findings);
        }
        for name in self.options.layout.verdicts() {
            if self.store.delete(task_id, name)? {
                debug!("Removed stale {} for task {}", name, task_id);
            }
        }
        Ok(())
    }

    fn current_phase(&self, task_id: &str) -> Phase {
        if self.oracle.is_in_verify_phase(task_id) {
            Phase::Verify
        } else {
            Phase::Execute
        }
    }

    fn render_prompt(&self, session: &LoopSession, config: &RunConfig) -> Result<String> {
        let task_id = session.task_id.as_str();
        let layout = &self.options.layout;
        let path = |name: &str| self.store.path(task_id, name).display().to_string();
        let counts = self.oracle.counts(task_id);

        let context = PromptContext {
            task_id: task_id.to_string(),
            iteration: session.iteration,
            max_iterations: session.budget.to_string(),
            user_prompt: config.instruction.clone(),
            todo_path: path(layout.checklist),
            bugs_path: path(layout.checklist),
            overview_path: path(layout.checkpoint),
            passed_path: path(layout.pass),
            failed_path: path(layout.fail),
            research_path: path(RESEARCH_FILE),
            claudiomiro_folder: self.workspace.folder().display().to_string(),
            task_folder: self.workspace.task_dir(task_id).display().to_string(),
            previous_findings: match session.phase {
                Phase::Execute => session.previous_findings.clone().unwrap_or_default(),
                Phase::Verify => String::new(),
            },
            force_research: session.force_research,
            scope: session.scope.map(|s| s.to_string()).unwrap_or_default(),
            pending_count: counts.pending,
            completed_count: counts.completed,
        };

        let template = match session.phase {
            Phase::Execute => self.loader.load(EXECUTE_TEMPLATE)?,
            Phase::Verify => self.loader.load(VERIFY_TEMPLATE)?,
        };
        self.renderer.render_with(&template, &context)
    }

    fn after_execute(&self, task_id: &str) {
        let counts = self.oracle.counts(task_id);
        if self.oracle.is_in_verify_phase(task_id) {
            tracing::info!(
                task_id = %task_id,
                pending = counts.pending,
                completed = counts.completed,
                "Checkpoint written, reviewing next"
            );
        } else {
            info!(
                "Task {}: {} pending, {} completed",
                task_id, counts.pending, counts.completed
            );
        }
    }

    /// Judge a review iteration; `Some` ends the run with success
    fn after_verify(&self, session: &mut LoopSession) -> Result<Option<RunSummary>> {
        let task_id = session.task_id.clone();
        let counts = self.oracle.counts(&task_id);

        if self.oracle.is_verified(&task_id) {
            return Ok(Some(self.finish(session, false)));
        }

        let rejected = self.oracle.is_rejected(&task_id);
        if counts.pending == 0 && !rejected {
            if self.options.auto_pass_on_empty_checklist {
                warn!(
                    "Review of task {} wrote no verdict and left nothing pending, recording an automatic pass",
                    task_id
                );
                self.write_auto_pass(session, counts.completed)?;
                return Ok(Some(self.finish(session, true)));
            }
            warn!("Review of task {} wrote no verdict, reviewing again", task_id);
            return Ok(None);
        }

        let checklist = self.oracle.checklist(&task_id);
        session.previous_findings = self.oracle.findings(&task_id).or_else(|| {
            let pending = pending_lines(&checklist);
            (!pending.is_empty()).then(|| pending.join("\n"))
        });
        self.store.delete(&task_id, self.options.layout.checkpoint)?;
        tracing::info!(
            task_id = %task_id,
            pending = counts.pending,
            "Review rejected, back to execution"
        );
        Ok(None)
    }

    fn write_auto_pass(&self, session: &LoopSession, completed: usize) -> Result<()> {
        let content = format!(
            "{}\n# Review passed\n\nThe review on iteration {} wrote no verdict and left no pending items.\n\n- Completed items: {}\n",
            AUTO_GENERATED_MARKER, session.iteration, completed
        );
        self.store.write(&session.task_id, self.options.layout.pass, &content)
    }

    fn finish(&self, session: &LoopSession, auto_passed: bool) -> RunSummary {
        let task_id = session.task_id.as_str();
        let counts = self.oracle.counts(task_id);
        self.mark_checklist(task_id, true);

        let summary = RunSummary {
            task_id: task_id.to_string(),
            iterations_used: session.iteration,
            pending: counts.pending,
            completed: counts.completed,
            auto_passed,
            scope: session.scope,
        };
        tracing::info!(
            task_id = %task_id,
            iterations = summary.iterations_used,
            auto_passed,
            "Task verified"
        );
        summary
    }

    /// Record a completion insight; failures are logged, never fatal
    async fn record_insight(&self, summary: &RunSummary) {
        let insight = Insight {
            id: summary.task_id.clone(),
            summary: format!(
                "Verified after {} iterations ({} completed, {} pending{})",
                summary.iterations_used,
                summary.completed,
                summary.pending,
                if summary.auto_passed { ", automatic pass" } else { "" }
            ),
            iterations: summary.iterations_used,
            completed_at: Utc::now(),
        };
        if let Err(e) = self.insights.record(&insight).await {
            warn!("Failed to record insight for {}: {}", summary.task_id, e);
        }
    }

    /// Set the checklist's `Fully implemented` line when the checklist exists
    fn mark_checklist(&self, task_id: &str, implemented: bool) {
        let name = self.options.layout.checklist;
        match self.store.read(task_id, name) {
            Ok(Some(doc)) => {
                if let Err(e) = self.store.write(task_id, name, &set_implementation_marker(&doc, implemented)) {
                    warn!("Failed to update {} for task {}: {}", name, task_id, e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to read {} for task {}: {}", name, task_id, e),
        }
    }

    fn maintain_record(&self, task_id: &str) {
        match self.repairer.maintain(self.store.as_ref(), task_id, false) {
            Ok(Some(outcome)) if !outcome.report.valid => {
                warn!(
                    "Execution record for {} is still invalid: {}",
                    task_id,
                    outcome.report.errors.join("; ")
                );
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to maintain execution record for {}: {}", task_id, e),
        }
    }
}
