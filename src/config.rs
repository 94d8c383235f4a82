use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use taskloop::artifact::{ArtifactLayout, LayoutKind};
use taskloop::escalation::DEFAULT_FORCE_RESEARCH_AFTER;
use taskloop::runner::{ControllerOptions, DEFAULT_MAX_ITERATIONS, IterationBudget};
use taskloop::worker::CliWorkerConfig;
use taskloop::workspace::{DEFAULT_FOLDER, WorkspaceContext};

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    #[serde(rename = "loop")]
    pub loop_: LoopConfig,
    pub worker: WorkerConfig,
    pub workspace: WorkspaceConfig,
    pub scope: ScopeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub max_iterations: u32,
    pub unbounded: bool,
    pub auto_pass_on_empty_checklist: bool,
    pub force_research_after: u32,
    pub layout: LayoutKind,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            unbounded: false,
            auto_pass_on_empty_checklist: true,
            force_research_after: DEFAULT_FORCE_RESEARCH_AFTER,
            layout: LayoutKind::Standard,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub fast_args: Vec<String>,
    pub timeout_ms: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let defaults = CliWorkerConfig::default();
        Self {
            command: defaults.command,
            args: defaults.args,
            fast_args: defaults.fast_args,
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub folder: PathBuf,
    pub templates_dir: Option<PathBuf>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from(DEFAULT_FOLDER),
            templates_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub multi_repo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some(DEFAULT_LOG_FILTER.to_string()),
            loop_: LoopConfig::default(),
            worker: WorkerConfig::default(),
            workspace: WorkspaceConfig::default(),
            scope: ScopeConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Log filter for env_logger (`info` when unset or blank)
    pub fn log_filter(&self) -> &str {
        match self.log_level.as_deref().map(str::trim) {
            Some(level) if !level.is_empty() => level,
            _ => DEFAULT_LOG_FILTER,
        }
    }

    pub fn workspace_context(&self, root: &Path) -> WorkspaceContext {
        WorkspaceContext::with_folder(root, &self.workspace.folder)
    }

    pub fn worker_config(&self) -> CliWorkerConfig {
        CliWorkerConfig {
            command: self.worker.command.clone(),
            args: self.worker.args.clone(),
            fast_args: self.worker.fast_args.clone(),
            timeout: self.worker.timeout_ms.map(Duration::from_millis),
        }
    }

    /// Controller options, with an optional layout override from the command line
    pub fn controller_options(&self, layout: Option<LayoutKind>) -> ControllerOptions {
        ControllerOptions {
            layout: ArtifactLayout::for_kind(layout.unwrap_or(self.loop_.layout)),
            auto_pass_on_empty_checklist: self.loop_.auto_pass_on_empty_checklist,
            force_research_after: self.loop_.force_research_after,
            multi_repo: self.scope.multi_repo,
        }
    }

    /// Iteration budget, with optional overrides from the command line
    pub fn budget(&self, max_iterations: Option<u32>, unbounded: bool) -> IterationBudget {
        IterationBudget::from_options(
            Some(max_iterations.unwrap_or(self.loop_.max_iterations)),
            unbounded || self.loop_.unbounded,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.loop_.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert!(config.loop_.auto_pass_on_empty_checklist);
        assert_eq!(config.loop_.force_research_after, 3);
        assert_eq!(config.workspace.folder, PathBuf::from(".taskloop"));
        assert!(!config.scope.multi_repo);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("taskloop.yml");
        fs::write(
            &path,
            "loop:\n  max_iterations: 7\n  layout: critical-review\nworker:\n  command: agent\n  timeout_ms: 1500\nscope:\n  multi_repo: true\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.loop_.max_iterations, 7);
        assert!(config.loop_.auto_pass_on_empty_checklist);
        assert_eq!(config.worker.command, "agent");
        assert_eq!(config.worker_config().timeout, Some(Duration::from_millis(1500)));
        assert!(config.scope.multi_repo);

        let options = config.controller_options(None);
        assert_eq!(options.layout, ArtifactLayout::critical_review());
        assert!(options.multi_repo);
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let missing = PathBuf::from("/definitely/not/here/taskloop.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_budget_overrides() {
        let config = Config::default();
        assert_eq!(config.budget(Some(4), false), IterationBudget::Limited(4));
        assert_eq!(config.budget(None, false), IterationBudget::Limited(DEFAULT_MAX_ITERATIONS));
        assert_eq!(config.budget(None, true), IterationBudget::Unbounded);
    }

    #[test]
    fn test_layout_override() {
        let options = Config::default().controller_options(Some(LayoutKind::PromptRefinement));
        assert_eq!(options.layout, ArtifactLayout::prompt_refinement());
    }

    #[test]
    fn test_log_filter() {
        let mut config = Config::default();
        assert_eq!(config.log_filter(), "info");

        config.log_level = Some("taskloop=debug".to_string());
        assert_eq!(config.log_filter(), "taskloop=debug");

        config.log_level = Some("  ".to_string());
        assert_eq!(config.log_filter(), "info");

        config.log_level = None;
        assert_eq!(config.log_filter(), "info");
    }

    #[test]
    fn test_log_level_from_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("taskloop.yml");
        fs::write(&path, "log_level: warn\n").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().log_filter(), "warn");
    }
}
