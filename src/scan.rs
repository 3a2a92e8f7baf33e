use anyhow::{Context as _, Result};
use regex::Regex;
use std::{
    collections::BTreeSet,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::unit::{FileId, UnitName};

/// Supplies the two facts the resolver needs about each file.
pub trait SourceScanner {
    /// Units declared by `file`, in source order.
    fn defined_units(&self, file: &FileId) -> Result<Vec<UnitName>>;

    /// Units `file` refers to.
    fn referenced_units(&self, file: &FileId) -> Result<BTreeSet<UnitName>>;

    /// Units whose own body refers to themselves. Only consulted when a
    /// file declares several units and cannot tell the owner of a `use`.
    fn self_referencing_units(&self, _file: &FileId) -> Result<BTreeSet<UnitName>> {
        Ok(BTreeSet::new())
    }
}

/// Line-oriented scanner for Fortran `MODULE` and `USE` statements.
#[derive(Debug, Clone)]
pub struct FortranScanner {
    root: PathBuf,
    module_re: Regex,
    use_re: Regex,
    end_module_re: Regex,
    placeholders: BTreeSet<UnitName>,
}

impl FortranScanner {
    pub fn new(root: &Path, placeholders: &[String]) -> Result<Self> {
        let module_re = Regex::new(r"(?i)^\s*module\s+([a-z0-9_]+)")
            .context("failed to compile module regex")?;
        let use_re = Regex::new(
            r"(?i)^\s*use\b\s*(?:,\s*(?:non_)?intrinsic\s*)?(?:::)?\s*([a-z_][a-z0-9_]*)",
        )
        .context("failed to compile use regex")?;
        let end_module_re = Regex::new(r"(?i)^\s*end\s*module\b")
            .context("failed to compile end module regex")?;

        Ok(Self {
            root: root.to_path_buf(),
            module_re,
            use_re,
            end_module_re,
            placeholders: placeholders.iter().map(|p| UnitName::new(p)).collect(),
        })
    }

    fn scan_lines<F>(&self, file: &FileId, mut on_line: F) -> Result<()>
    where
        F: FnMut(&str),
    {
        let path = file.to_path(&self.root);
        let handle = File::open(&path)
            .with_context(|| format!("failed to open source file {}", path.display()))?;
        let mut reader = BufReader::new(handle);

        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .with_context(|| format!("failed to read source file {}", path.display()))?;
            if n == 0 {
                break;
            }
            on_line(&String::from_utf8_lossy(&buf));
        }

        Ok(())
    }

    fn definition_in(&self, line: &str) -> Option<UnitName> {
        let caps = self.module_re.captures(line)?;
        let name = UnitName::new(caps.get(1)?.as_str());
        if self.placeholders.contains(&name) {
            return None;
        }
        Some(name)
    }

    fn reference_in(&self, line: &str) -> Option<UnitName> {
        let caps = self.use_re.captures(line)?;
        Some(UnitName::new(caps.get(1)?.as_str()))
    }
}

impl SourceScanner for FortranScanner {
    fn defined_units(&self, file: &FileId) -> Result<Vec<UnitName>> {
        let mut out = Vec::new();
        self.scan_lines(file, |line| {
            if let Some(name) = self.definition_in(line) {
                if !out.contains(&name) {
                    out.push(name);
                }
            }
        })?;
        Ok(out)
    }

    fn referenced_units(&self, file: &FileId) -> Result<BTreeSet<UnitName>> {
        let mut out = BTreeSet::new();
        self.scan_lines(file, |line| {
            if let Some(name) = self.reference_in(line) {
                out.insert(name);
            }
        })?;
        Ok(out)
    }

    fn self_referencing_units(&self, file: &FileId) -> Result<BTreeSet<UnitName>> {
        let mut out = BTreeSet::new();
        let mut current: Option<UnitName> = None;
        self.scan_lines(file, |line| {
            if self.end_module_re.is_match(line) {
                current = None;
            } else if let Some(name) = self.definition_in(line) {
                current = Some(name);
            } else if let (Some(owner), Some(used)) = (&current, self.reference_in(line)) {
                if *owner == used {
                    out.insert(used);
                }
            }
        })?;
        Ok(out)
    }
}
