//! Repository cloning and source classification

use crate::command::{CommandRunner, ProcessRunner};
use async_trait::async_trait;
use mender_core::config::SandboxConfig;
use mender_core::fail_open::fail_open_sync;
use mender_core::{Analysis, Analyzer, Language, MenderError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use walkdir::{DirEntry, WalkDir};

/// Clones into a fresh directory per call, so concurrent runs never share
/// a working tree. The directory is deleted when the run releases it,
/// unless `keep_clones` is set.
#[derive(Clone)]
pub struct GitCloneAnalyzer {
    runner: Arc<dyn CommandRunner>,
    clone_root: PathBuf,
    keep_clones: bool,
}

impl GitCloneAnalyzer {
    pub fn new(runner: Arc<dyn CommandRunner>, clone_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            clone_root: clone_root.into(),
            keep_clones: false,
        }
    }

    /// Real git, cloning under `clone_root` or the system temp dir
    pub fn from_config(config: &SandboxConfig) -> Self {
        let clone_root = config
            .clone_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("mender"));
        Self::new(Arc::new(ProcessRunner), clone_root).keep_clones(config.keep_clones)
    }

    /// Leave released clones on disk
    pub fn keep_clones(mut self, keep: bool) -> Self {
        self.keep_clones = keep;
        self
    }

    fn remove_clone(&self, repo_path: &Path) -> Result<()> {
        // Only ever delete what this analyzer created
        if !repo_path.starts_with(&self.clone_root) || repo_path == self.clone_root {
            debug!("Not removing {:?}: outside {:?}", repo_path, self.clone_root);
            return Ok(());
        }
        match std::fs::remove_dir_all(repo_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Analyzer for GitCloneAnalyzer {
    #[instrument(skip(self))]
    async fn analyze(&self, repository_url: &str) -> Result<Analysis> {
        tokio::fs::create_dir_all(&self.clone_root).await?;
        let repo_path = self.clone_root.join(format!("repo-{}", Uuid::new_v4()));

        // "--" keeps a url starting with '-' from being read as an option
        let args = vec![
            "clone".to_string(),
            "--".to_string(),
            repository_url.to_string(),
            repo_path.display().to_string(),
        ];
        let output = match self.runner.run("git", &args, None).await {
            Ok(output) => output,
            Err(e) => {
                fail_open_sync("clone_cleanup", self.remove_clone(&repo_path));
                return Err(MenderError::Clone(e.to_string()));
            }
        };
        if !output.success() {
            fail_open_sync("clone_cleanup", self.remove_clone(&repo_path));
            return Err(MenderError::Clone(format!(
                "git clone {} failed: {}",
                repository_url,
                output.stderr.trim()
            )));
        }

        let root = repo_path.clone();
        let (language, test_files) = tokio::task::spawn_blocking(move || classify_tree(&root))
            .await
            .map_err(|e| MenderError::Analysis(format!("classification task failed: {}", e)))?;

        info!(
            "Cloned {} into {:?}: {} with {} test files",
            repository_url,
            repo_path,
            language,
            test_files.len()
        );

        Ok(Analysis {
            repo_path,
            language,
            test_files,
        })
    }

    fn release(&self, repo_path: &Path) -> Result<()> {
        if self.keep_clones {
            info!("Keeping clone {:?}", repo_path);
            return Ok(());
        }
        debug!("Removing clone {:?}", repo_path);
        self.remove_clone(repo_path)
    }
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == ".git"
}

/// Walk a checkout and report its language and test files.
///
/// `.py` files mark the tree as python and are tests when the name contains
/// "test". `.js`/`.ts` mark it javascript and are tests when the name
/// contains "test" or "spec". The last source file visited decides the
/// language. Entries are visited in file-name order.
pub fn classify_tree(root: &Path) -> (Language, Vec<PathBuf>) {
    let mut language = Language::Unknown;
    let mut test_files = Vec::new();

    let files = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_git_dir(entry))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file());

    for entry in files {
        let name = entry.file_name().to_string_lossy();
        let extension = entry.path().extension().and_then(|ext| ext.to_str());

        let is_test = match extension {
            Some("py") => {
                language = Language::Python;
                name.contains("test")
            }
            Some("js") | Some("ts") => {
                language = Language::JavaScript;
                name.contains("test") || name.contains("spec")
            }
            _ => false,
        };

        if is_test {
            test_files.push(entry.into_path());
        }
    }

    (language, test_files)
}
