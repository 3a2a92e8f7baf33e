use anyhow::{bail, Result};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::{cli::Args, config::Config};

pub const CONFIG_ENV: &str = "FORDEP_CONFIG";
pub const LOCAL_CONFIG_NAME: &str = ".fordep.toml";

/// Where a run reads its configuration from, plus the settings after CLI
/// overrides have been applied.
#[derive(Debug, Clone)]
pub struct ContextEnv {
    vars: BTreeMap<String, String>,
    source_root: PathBuf,
    user_config_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

impl ContextEnv {
    pub fn new(source_root: &Path) -> Self {
        Self {
            vars: std::env::vars().collect(),
            source_root: source_root.to_path_buf(),
            user_config_dir: dirs::config_dir(),
            config_path: None,
        }
    }

    /// Build a context from explicit values instead of the process environment.
    pub fn with_vars(
        source_root: &Path,
        vars: BTreeMap<String, String>,
        user_config_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            vars,
            source_root: source_root.to_path_buf(),
            user_config_dir,
            config_path: None,
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Config path precedence:
    /// 1) CLI --config (must exist)
    /// 2) FORDEP_CONFIG (must exist)
    /// 3) <source>/.fordep.toml (if present)
    /// 4) user config dir fordep/config.toml (if present)
    /// 5) none: built-in defaults
    pub fn locate_config(&mut self, cli_config: Option<&PathBuf>) -> Result<Option<PathBuf>> {
        if let Some(p) = cli_config {
            if !p.is_file() {
                bail!("--config was provided but file does not exist: {}", p.display());
            }
            self.config_path = Some(p.clone());
            return Ok(self.config_path.clone());
        }

        if let Some(p) = self.get_env_path(CONFIG_ENV) {
            if !p.is_file() {
                bail!("{CONFIG_ENV} is set but file does not exist: {}", p.display());
            }
            self.config_path = Some(p);
            return Ok(self.config_path.clone());
        }

        let local = self.source_root.join(LOCAL_CONFIG_NAME);
        if local.is_file() {
            self.config_path = Some(local);
            return Ok(self.config_path.clone());
        }

        if let Some(dir) = &self.user_config_dir {
            let user = dir.join("fordep").join("config.toml");
            if user.is_file() {
                self.config_path = Some(user);
                return Ok(self.config_path.clone());
            }
        }

        self.config_path = None;
        Ok(None)
    }

    /// Locate and load the config file, then fold the CLI flags over it.
    pub fn load_config(&mut self, args: &Args) -> Result<Config> {
        let mut cfg = match self.locate_config(args.config.as_ref())? {
            Some(p) => {
                tracing::debug!(path = %p.display(), "loading config");
                Config::load_from_path(&p)?
            }
            None => Config::default(),
        };

        apply_args(&mut cfg, args);
        Ok(cfg)
    }

    fn get_env_path(&self, key: &str) -> Option<PathBuf> {
        self.vars
            .get(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }
}

/// Flags only ever switch behaviour on; list flags extend the configured lists.
pub fn apply_args(cfg: &mut Config, args: &Args) {
    if args.recursive {
        cfg.discovery.recursive = true;
    }
    if args.stop_after_start {
        cfg.resolve.stop_after_start = true;
    }

    if let Some(list) = args.exclude.as_deref() {
        cfg.resolve.exclude.extend(split_exclude_list(list));
    }

    cfg.discovery
        .exclude_dirs
        .extend(args.exclude_dir.iter().filter(|d| !d.trim().is_empty()).cloned());
}

/// Split a colon-separated exclusion list, dropping empty entries.
pub fn split_exclude_list(raw: &str) -> Vec<String> {
    raw.split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
