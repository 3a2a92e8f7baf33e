use anyhow::{bail, Context as _, Result};
use glob::Pattern;
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use crate::{config::DiscoveryConfig, unit::FileId};

#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    pub extensions: BTreeSet<String>,
    pub recursive: bool,
    pub exclude_dirs: Vec<Pattern>,
}

impl DiscoverOptions {
    pub fn from_config(cfg: &DiscoveryConfig) -> Result<Self> {
        let mut exclude_dirs = Vec::with_capacity(cfg.exclude_dirs.len());
        for raw in &cfg.exclude_dirs {
            let pat = Pattern::new(raw.trim_matches('/'))
                .with_context(|| format!("invalid exclude-dir pattern: {raw}"))?;
            exclude_dirs.push(pat);
        }

        Ok(Self {
            extensions: cfg
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
            recursive: cfg.recursive,
            exclude_dirs,
        })
    }

    fn has_source_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(e))
            .unwrap_or(false)
    }

    fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|p| p.matches(name))
    }
}

/// Enumerate candidate source files under `root`, sorted by relative path.
pub fn discover(root: &Path, opts: &DiscoverOptions) -> Result<Vec<FileId>> {
    if !root.is_dir() {
        bail!("source directory does not exist: {}", root.display());
    }

    let mut found: Vec<PathBuf> = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("failed to list directory {}", dir.display()))?;

        for entry in entries {
            let entry =
                entry.with_context(|| format!("failed to list directory {}", dir.display()))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .with_context(|| format!("failed to stat {}", path.display()))?;

            if file_type.is_dir() {
                if !opts.recursive {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                if opts.is_excluded_dir(&name) {
                    tracing::debug!(dir = %path.display(), "skipping excluded directory");
                    continue;
                }
                pending.push(path);
            } else if opts.has_source_extension(&path) {
                found.push(path);
            }
        }
    }

    let mut files: Vec<FileId> = found.iter().map(|p| FileId::from_path(root, p)).collect();
    files.sort();
    files.dedup();

    tracing::debug!(count = files.len(), root = %root.display(), "discovered source files");
    Ok(files)
}
