use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::path::Path;

/// Fortran intrinsic modules: always available, never backed by a source file.
pub const DEFAULT_BUILTIN_UNITS: &[&str] = &[
    "iso_c_binding",
    "iso_fortran_env",
    "openacc",
    "omp_lib",
    "omp_lib_kinds",
    "ieee_arithmetic",
    "ieee_features",
    "ieee_exceptions",
];

/// Words that can follow `MODULE` without naming a module
/// (`module procedure`, `module subroutine`, ...).
pub const DEFAULT_PLACEHOLDERS: &[&str] = &[
    "procedure",
    "subroutine",
    "function",
    "pure",
    "impure",
    "elemental",
    "recursive",
];

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "f90", "F90", "f95", "F95", "f03", "F03", "f08", "F08", "for", "f", "F",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub units: UnitsConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub resolve: ResolveConfig,
}

impl Config {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(text)?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitsConfig {
    #[serde(default = "default_builtin")]
    pub builtin: Vec<String>,

    #[serde(default = "default_placeholders")]
    pub placeholders: Vec<String>,
}

impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            builtin: default_builtin(),
            placeholders: default_placeholders(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub recursive: bool,

    /// Directory names (or glob patterns) skipped during a recursive walk.
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            recursive: false,
            exclude_dirs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveConfig {
    /// Files, relative to the source root, that are skipped entirely.
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub stop_after_start: bool,
}

fn default_builtin() -> Vec<String> {
    to_strings(DEFAULT_BUILTIN_UNITS)
}

fn default_placeholders() -> Vec<String> {
    to_strings(DEFAULT_PLACEHOLDERS)
}

fn default_extensions() -> Vec<String> {
    to_strings(DEFAULT_EXTENSIONS)
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
