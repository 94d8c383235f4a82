//! Scope classification for multi-repository routing.
//!
//! Classifiers are tried in order and the first conclusive answer wins:
//! a keyword heuristic first, then a fast worker call. The answer is written
//! back into `BLUEPRINT.md` as an `@scope` line so it is computed once per task.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactStore, BLUEPRINT_FILE};
use crate::error::{Result, TaskloopError};
use crate::prompt::PromptRenderer;
use crate::worker::{Worker, WorkerRequest};

/// Execution domain of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Backend,
    Frontend,
    /// Touches both sides; the superset scope
    Integration,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Backend => "backend",
            Scope::Frontend => "frontend",
            Scope::Integration => "integration",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = TaskloopError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "backend" => Ok(Scope::Backend),
            "frontend" => Ok(Scope::Frontend),
            "integration" => Ok(Scope::Integration),
            other => Err(TaskloopError::ScopeValidation(format!("unknown scope: {}", other))),
        }
    }
}

/// One link in the classification chain
#[async_trait]
pub trait ScopeClassifier: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// `None` when this classifier cannot decide
    async fn classify(&self, blueprint: &str) -> Option<Scope>;
}

static BACKEND_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:backend|back-end|api|apis|endpoints?|server|database|db|sql|schema|migrations?|queries|query|orm|repository|controllers?|middleware|services?|queue|webhooks?|cron|graphql|rest)\b",
    )
    .expect("backend vocabulary is a valid pattern")
});

static FRONTEND_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:frontend|front-end|ui|ux|components?|react|vue|angular|svelte|css|scss|tailwind|styles?|styling|layout|pages?|buttons?|forms?|modal|responsive|html|jsx|tsx|browser)\b",
    )
    .expect("frontend vocabulary is a valid pattern")
});

static INTEGRATION_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:integration|integrate|end-to-end|e2e|full-stack|fullstack|cross-repo|contract tests?)\b")
        .expect("integration vocabulary is a valid pattern")
});

/// Keyword tallies for one blueprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeywordScores {
    pub backend: usize,
    pub frontend: usize,
    pub integration: usize,
}

impl KeywordScores {
    pub fn of(text: &str) -> Self {
        Self {
            backend: BACKEND_TERMS.find_iter(text).count(),
            frontend: FRONTEND_TERMS.find_iter(text).count(),
            integration: INTEGRATION_TERMS.find_iter(text).count(),
        }
    }

    /// Dominance rule, then the mixed rule; `None` when inconclusive
    pub fn decide(&self) -> Option<Scope> {
        let (b, f, i) = (self.backend, self.frontend, self.integration);
        if f == 0 && (b > f + 2 || b >= 3) {
            return Some(Scope::Backend);
        }
        if b == 0 && (f > b + 2 || f >= 3) {
            return Some(Scope::Frontend);
        }
        if (b > 0 && f > 0) || i >= 2 {
            return Some(Scope::Integration);
        }
        None
    }
}

/// Keyword-count classifier; no external calls
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

#[async_trait]
impl ScopeClassifier for HeuristicClassifier {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn classify(&self, blueprint: &str) -> Option<Scope> {
        let scores = KeywordScores::of(blueprint);
        let decision = scores.decide();
        debug!("Scope heuristic {:?} -> {:?}", scores, decision);
        decision
    }
}

/// Asks the worker in fast mode; always answers, falling back to `integration`
pub struct WorkerClassifier {
    worker: Arc<dyn Worker>,
    template: String,
    task_id: String,
    working_dir: PathBuf,
    renderer: PromptRenderer,
}

impl WorkerClassifier {
    pub fn new(
        worker: Arc<dyn Worker>,
        template: impl Into<String>,
        task_id: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            worker,
            template: template.into(),
            task_id: task_id.into(),
            working_dir: working_dir.into(),
            renderer: PromptRenderer::new(),
        }
    }

    async fn ask(&self, blueprint: &str) -> Option<Scope> {
        let context = serde_json::json!({ "blueprint": blueprint });
        let prompt = match self.renderer.render_with(&self.template, &context) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!("Failed to render scope prompt: {}", e);
                return None;
            }
        };
        let request = WorkerRequest::new(&self.task_id, prompt, &self.working_dir).fast();
        match self.worker.invoke(request).await {
            Ok(output) => parse_answer(&output.stdout),
            Err(e) => {
                warn!("Scope classification call failed: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl ScopeClassifier for WorkerClassifier {
    fn name(&self) -> &str {
        "worker"
    }

    async fn classify(&self, blueprint: &str) -> Option<Scope> {
        Some(self.ask(blueprint).await.unwrap_or_else(|| {
            info!("Scope answer unusable, defaulting to {}", Scope::Integration);
            Scope::Integration
        }))
    }
}

/// First word of a model answer, if it names a scope
pub fn parse_answer(answer: &str) -> Option<Scope> {
    let word = answer.split_whitespace().next()?;
    let word: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
    word.parse().ok()
}

/// Ordered chain of classifiers
#[derive(Default)]
pub struct ScopeCascade {
    classifiers: Vec<Box<dyn ScopeClassifier>>,
}

impl ScopeCascade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, classifier: impl ScopeClassifier + 'static) -> Self {
        self.classifiers.push(Box::new(classifier));
        self
    }

    /// Heuristic first, then the worker
    pub fn standard(worker: Arc<dyn Worker>, template: String, task_id: &str, working_dir: PathBuf) -> Self {
        Self::new()
            .with(HeuristicClassifier)
            .with(WorkerClassifier::new(worker, template, task_id, working_dir))
    }

    pub async fn classify(&self, blueprint: &str) -> Option<Scope> {
        for classifier in &self.classifiers {
            if let Some(scope) = classifier.classify(blueprint).await {
                info!("Scope classified as {} by {}", scope, classifier.name());
                return Some(scope);
            }
        }
        None
    }
}

static ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^@scope[ \t]+(backend|frontend|integration)[ \t]*$").expect("annotation is a valid pattern")
});

/// Scope already recorded in a blueprint
pub fn read_annotation(blueprint: &str) -> Option<Scope> {
    ANNOTATION
        .captures(blueprint)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Blueprint text with the `@scope` line set to `scope`.
///
/// An existing annotation is replaced; otherwise the line goes after the first
/// markdown heading, or at the top when there is none.
pub fn write_annotation(blueprint: &str, scope: Scope) -> String {
    let line = format!("@scope {}", scope);
    if ANNOTATION.is_match(blueprint) {
        return ANNOTATION.replace(blueprint, line.as_str()).into_owned();
    }

    let mut lines: Vec<&str> = blueprint.lines().collect();
    match lines.iter().position(|l| l.starts_with('#')) {
        Some(heading) => {
            lines.insert(heading + 1, "");
            lines.insert(heading + 2, &line);
            let mut out = lines.join("\n");
            if blueprint.ends_with('\n') {
                out.push('\n');
            }
            out
        }
        None => format!("{}\n\n{}", line, blueprint),
    }
}

/// Scope of a task: the recorded annotation, or a fresh classification that is then recorded
pub async fn resolve_scope(store: &dyn ArtifactStore, task_id: &str, cascade: &ScopeCascade) -> Result<Scope> {
    let blueprint = store
        .read(task_id, BLUEPRINT_FILE)
        .map_err(|e| TaskloopError::ScopeValidation(format!("cannot read {} for {}: {}", BLUEPRINT_FILE, task_id, e)))?
        .ok_or_else(|| TaskloopError::ScopeValidation(format!("{} not found for task {}", BLUEPRINT_FILE, task_id)))?;

    if let Some(scope) = read_annotation(&blueprint) {
        debug!("Task {} already annotated with scope {}", task_id, scope);
        return Ok(scope);
    }

    let scope = cascade
        .classify(&blueprint)
        .await
        .ok_or_else(|| TaskloopError::ScopeValidation(format!("could not determine scope for task {}", task_id)))?;
    store.write(task_id, BLUEPRINT_FILE, &write_annotation(&blueprint, scope))?;
    Ok(scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MemoryArtifactStore;
    use crate::worker::{MockWorker, WorkerOutput};

    const BACKEND_PLAN: &str = "# Plan\n\nAdd a REST endpoint, a database migration and a query for the server.";
    const FRONTEND_PLAN: &str = "# Plan\n\nBuild a React component with a modal and responsive CSS.";

    #[test]
    fn test_keyword_scores() {
        let scores = KeywordScores::of(BACKEND_PLAN);
        assert!(scores.backend >= 3);
        assert_eq!(scores.frontend, 0);
        assert_eq!(scores.decide(), Some(Scope::Backend));
        assert_eq!(KeywordScores::of(FRONTEND_PLAN).decide(), Some(Scope::Frontend));
    }

    #[test]
    fn test_word_boundaries() {
        // "rapid" contains "api", "build" contains "ui"
        assert_eq!(KeywordScores::of("rapid build guide"), KeywordScores::default());
    }

    #[test]
    fn test_decide_rules() {
        let scores = |backend, frontend, integration| KeywordScores {
            backend,
            frontend,
            integration,
        };
        assert_eq!(scores(3, 0, 0).decide(), Some(Scope::Backend));
        assert_eq!(scores(0, 4, 0).decide(), Some(Scope::Frontend));
        assert_eq!(scores(5, 1, 0).decide(), Some(Scope::Integration));
        assert_eq!(scores(0, 0, 2).decide(), Some(Scope::Integration));
        assert_eq!(scores(2, 0, 0).decide(), None);
        assert_eq!(scores(0, 0, 1).decide(), None);
        assert_eq!(scores(0, 0, 0).decide(), None);
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("Backend"), Some(Scope::Backend));
        assert_eq!(parse_answer("  frontend.\nbecause"), Some(Scope::Frontend));
        assert_eq!(parse_answer("**integration**"), Some(Scope::Integration));
        assert_eq!(parse_answer("mobile"), None);
        assert_eq!(parse_answer(""), None);
    }

    #[tokio::test]
    async fn test_heuristic_wins_without_worker_call() {
        let worker = Arc::new(MockWorker::new().then_reply("frontend"));
        let cascade = ScopeCascade::standard(worker.clone(), "{{blueprint}}".to_string(), "T1", PathBuf::from("/repo"));

        assert_eq!(cascade.classify(BACKEND_PLAN).await, Some(Scope::Backend));
        assert_eq!(worker.invocations(), 0);
    }

    #[tokio::test]
    async fn test_worker_fallback_uses_fast_mode() {
        let worker = Arc::new(MockWorker::new().then_reply("frontend"));
        let cascade = ScopeCascade::standard(worker.clone(), "Classify: {{blueprint}}".to_string(), "T1", PathBuf::from("/repo"));

        assert_eq!(cascade.classify("Tidy up the docs").await, Some(Scope::Frontend));
        let requests = worker.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].mode, crate::worker::InvocationMode::Fast);
        assert_eq!(requests[0].prompt, "Classify: Tidy up the docs");
    }

    #[tokio::test]
    async fn test_worker_fallback_defaults_to_integration() {
        let garbled = Arc::new(MockWorker::new().then(|_| Ok(WorkerOutput::text("I am not sure"))));
        let classifier = WorkerClassifier::new(garbled, "{{blueprint}}", "T1", "/repo");
        assert_eq!(classifier.classify("docs").await, Some(Scope::Integration));

        let failing = Arc::new(MockWorker::new().then_fail("rate limited"));
        let classifier = WorkerClassifier::new(failing, "{{blueprint}}", "T1", "/repo");
        assert_eq!(classifier.classify("docs").await, Some(Scope::Integration));
    }

    #[tokio::test]
    async fn test_empty_cascade_is_inconclusive() {
        let cascade = ScopeCascade::new().with(HeuristicClassifier);
        assert_eq!(cascade.classify("docs").await, None);
    }

    #[test]
    fn test_annotation_round_trip() {
        let annotated = write_annotation("# Task 3\n\nDo things.\n", Scope::Backend);
        assert_eq!(annotated, "# Task 3\n\n@scope backend\n\nDo things.\n");
        assert_eq!(read_annotation(&annotated), Some(Scope::Backend));

        let replaced = write_annotation(&annotated, Scope::Frontend);
        assert_eq!(replaced, "# Task 3\n\n@scope frontend\n\nDo things.\n");
        assert_eq!(replaced.matches("@scope").count(), 1);
    }

    #[test]
    fn test_annotation_without_heading() {
        assert_eq!(write_annotation("Plain plan", Scope::Integration), "@scope integration\n\nPlain plan");
    }

    #[tokio::test]
    async fn test_resolve_scope_writes_annotation_once() {
        let store = MemoryArtifactStore::new();
        store.write("T1", BLUEPRINT_FILE, BACKEND_PLAN).unwrap();
        let worker = Arc::new(MockWorker::new());
        let cascade = ScopeCascade::standard(worker.clone(), "{{blueprint}}".to_string(), "T1", PathBuf::from("/repo"));

        assert_eq!(resolve_scope(&store, "T1", &cascade).await.unwrap(), Scope::Backend);
        let blueprint = store.read("T1", BLUEPRINT_FILE).unwrap().unwrap();
        assert!(blueprint.contains("@scope backend"));

        // Annotation wins over a fresh classification
        store
            .write("T1", BLUEPRINT_FILE, &blueprint.replace("database", "react css modal"))
            .unwrap();
        assert_eq!(resolve_scope(&store, "T1", &cascade).await.unwrap(), Scope::Backend);
        assert_eq!(worker.invocations(), 0);
    }

    #[tokio::test]
    async fn test_resolve_scope_without_blueprint() {
        let store = MemoryArtifactStore::new();
        let cascade = ScopeCascade::new().with(HeuristicClassifier);
        let err = resolve_scope(&store, "T9", &cascade).await.unwrap_err();
        assert!(matches!(err, TaskloopError::ScopeValidation(_)));
    }
}
