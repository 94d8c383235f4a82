//! Prompt Loader - Load and cache prompt templates
//!
//! Templates come either from a directory of `<name>.md` files or from the
//! copies compiled into the binary. A loop checks for every template it needs
//! before its first iteration so a missing file fails fast.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{Result, TaskloopError};

/// Template for Execute-phase iterations
pub const EXECUTE_TEMPLATE: &str = "execute";

/// Template for Verify-phase iterations
pub const VERIFY_TEMPLATE: &str = "verify";

/// Template for the AI scope classifier
pub const CLASSIFY_SCOPE_TEMPLATE: &str = "classify-scope";

const BUILTIN: &[(&str, &str)] = &[
    (EXECUTE_TEMPLATE, include_str!("../../prompts/execute.md")),
    (VERIFY_TEMPLATE, include_str!("../../prompts/verify.md")),
    (CLASSIFY_SCOPE_TEMPLATE, include_str!("../../prompts/classify-scope.md")),
];

/// Loads and caches prompt templates
pub struct PromptLoader {
    /// Directory containing template files; `None` serves built-ins only
    templates_dir: Option<PathBuf>,
    /// In-memory cache of loaded templates
    cache: RwLock<HashMap<String, String>>,
}

impl PromptLoader {
    /// Create a loader reading `<name>.md` files from a directory
    pub fn new(templates_dir: impl AsRef<Path>) -> Self {
        Self {
            templates_dir: Some(templates_dir.as_ref().to_path_buf()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Create a loader serving the templates compiled into the binary
    pub fn builtin() -> Self {
        let cache = BUILTIN
            .iter()
            .map(|(name, content)| (name.to_string(), content.to_string()))
            .collect();
        Self {
            templates_dir: None,
            cache: RwLock::new(cache),
        }
    }

    /// Load a template by name (without .md extension)
    pub fn load(&self, name: &str) -> Result<String> {
        {
            let cache = self
                .cache
                .read()
                .map_err(|e| TaskloopError::Storage(format!("Failed to acquire read lock: {}", e)))?;
            if let Some(content) = cache.get(name) {
                return Ok(content.clone());
            }
        }

        let path = self
            .template_path(name)
            .ok_or_else(|| TaskloopError::MissingTemplate(name.to_string()))?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TaskloopError::MissingTemplate(format!("{} ({})", name, path.display())));
            }
            Err(e) => {
                return Err(TaskloopError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to load template '{}' from {:?}: {}", name, path, e),
                )));
            }
        };

        let mut cache = self
            .cache
            .write()
            .map_err(|e| TaskloopError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        cache.insert(name.to_string(), content.clone());

        Ok(content)
    }

    /// Load every named template, failing on the first one that is missing
    pub fn require(&self, names: &[&str]) -> Result<()> {
        for name in names {
            self.load(name)?;
        }
        Ok(())
    }

    /// Whether a template can be served
    pub fn exists(&self, name: &str) -> bool {
        let cached = self.cache.read().map(|c| c.contains_key(name)).unwrap_or(false);
        cached || self.template_path(name).is_some_and(|p| p.is_file())
    }

    fn template_path(&self, name: &str) -> Option<PathBuf> {
        self.templates_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.md", name)))
    }

    /// Get the templates directory path
    pub fn templates_dir(&self) -> Option<&Path> {
        self.templates_dir.as_deref()
    }
}
