use anyhow::{bail, Context as _, Result};
use std::{collections::BTreeSet, path::Path};

use crate::{
    config::Config,
    diagnostics::Diagnostic,
    discover::{discover, DiscoverOptions},
    index::UnitIndex,
    report::Report,
    resolve::{Builtins, Resolver},
    scan::{FortranScanner, SourceScanner},
    unit::{FileId, UnitName},
};

/// Orchestrates one run over an already discovered and indexed source set.
pub struct Driver<'a, S: SourceScanner + ?Sized> {
    files: &'a [FileId],
    index: &'a UnitIndex,
    scanner: &'a S,
    builtins: &'a Builtins,
    exclusions: &'a BTreeSet<FileId>,
    stop_after_start: bool,
}

impl<'a, S: SourceScanner + ?Sized> Driver<'a, S> {
    pub fn new(
        files: &'a [FileId],
        index: &'a UnitIndex,
        scanner: &'a S,
        builtins: &'a Builtins,
        exclusions: &'a BTreeSet<FileId>,
    ) -> Self {
        Self {
            files,
            index,
            scanner,
            builtins,
            exclusions,
            stop_after_start: false,
        }
    }

    pub fn stop_after_start(mut self, stop: bool) -> Self {
        self.stop_after_start = stop;
        self
    }

    pub fn run(&self, entry: &FileId, early: Vec<Diagnostic>) -> Result<Report> {
        if self.exclusions.contains(entry) {
            bail!("start file {entry} is listed in the exclusions");
        }

        let mut resolver = Resolver::new(self.index, self.scanner, self.builtins);

        // 1) entry dependencies, then the entry itself
        let start_units = self
            .scanner
            .referenced_units(entry)
            .with_context(|| format!("failed to read start file {entry}"))?;
        tracing::info!(entry = %entry, references = start_units.len(), "resolving start file");
        resolver.resolve(start_units)?;
        resolver.emit(entry);
        // the entry's references are already walked; its own units must not be swept again
        resolver.mark_file_processed(entry);

        if self.stop_after_start {
            return Ok(Report::new(early, resolver.into_state(), self.builtins));
        }

        // 2) units never reached from the entry; the index holds no excluded files
        let unreached: Vec<UnitName> = self
            .index
            .iter()
            .filter(|(unit, _)| !resolver.state().is_processed(unit))
            .map(|(unit, _)| unit.clone())
            .collect();
        for unit in unreached {
            if resolver.state().is_processed(&unit) {
                continue;
            }
            tracing::debug!(unit = %unit, "sweeping unreached unit");
            resolver.resolve([unit])?;
        }

        // 3) files that define no reached unit (programs, plain procedures)
        for file in self.files {
            if !self.exclusions.contains(file) && resolver.emit(file) {
                tracing::debug!(file = %file, "appended file without reached unit");
            }
        }

        Ok(Report::new(early, resolver.into_state(), self.builtins))
    }
}

/// Discover, index and resolve the sources under `root`, starting at `start`.
pub fn run(root: &Path, start: &str, cfg: &Config) -> Result<Report> {
    let entry = FileId::new(start);
    let entry_path = entry.to_path(root);
    if !entry_path.is_file() {
        bail!("start file does not exist: {}", entry_path.display());
    }

    let exclusions: BTreeSet<FileId> = cfg.resolve.exclude.iter().map(|e| FileId::new(e)).collect();
    let opts = DiscoverOptions::from_config(&cfg.discovery)?;
    let files = discover(root, &opts)?;

    let scanner = FortranScanner::new(root, &cfg.units.placeholders)?;
    let (index, early) = UnitIndex::build(&files, &scanner, &exclusions)?;
    let builtins = Builtins::new(&cfg.units.builtin);

    Driver::new(&files, &index, &scanner, &builtins, &exclusions)
        .stop_after_start(cfg.resolve.stop_after_start)
        .run(&entry, early)
}

/// Build only the unit index, for `--dump-index`.
pub fn build_index(root: &Path, cfg: &Config) -> Result<(UnitIndex, Vec<Diagnostic>)> {
    let exclusions: BTreeSet<FileId> = cfg.resolve.exclude.iter().map(|e| FileId::new(e)).collect();
    let opts = DiscoverOptions::from_config(&cfg.discovery)?;
    let files = discover(root, &opts)?;
    let scanner = FortranScanner::new(root, &cfg.units.placeholders)?;
    UnitIndex::build(&files, &scanner, &exclusions)
}
