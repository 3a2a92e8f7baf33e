use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    diagnostics::Diagnostic,
    scan::SourceScanner,
    unit::{FileId, UnitName},
};

/// Result of looking a unit up in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Defined(&'a FileId),
    /// Defined, but only in files the caller excluded.
    Excluded,
    Missing,
}

/// Unit name -> defining file. Built once, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct UnitIndex {
    units: BTreeMap<UnitName, FileId>,
    by_file: BTreeMap<FileId, BTreeSet<UnitName>>,
    excluded: BTreeSet<UnitName>,
}

impl UnitIndex {
    /// Scan every candidate file for unit definitions.
    ///
    /// A name defined twice keeps the later file (candidate order) and the
    /// replacement is reported as a [`Diagnostic::DuplicateDefinition`].
    /// Definitions in excluded files never enter the index.
    pub fn build<S: SourceScanner + ?Sized>(
        files: &[FileId],
        scanner: &S,
        exclusions: &BTreeSet<FileId>,
    ) -> Result<(Self, Vec<Diagnostic>)> {
        let mut index = Self::default();
        let mut diagnostics = Vec::new();

        for file in files {
            let defined = scanner.defined_units(file)?;

            if exclusions.contains(file) {
                index.excluded.extend(defined);
                continue;
            }

            for unit in defined {
                if let Some(prev) = index.units.insert(unit.clone(), file.clone()) {
                    if &prev == file {
                        continue;
                    }
                    if let Some(set) = index.by_file.get_mut(&prev) {
                        set.remove(&unit);
                        if set.is_empty() {
                            index.by_file.remove(&prev);
                        }
                    }
                    diagnostics.push(Diagnostic::DuplicateDefinition {
                        unit: unit.clone(),
                        kept: file.clone(),
                        replaced: prev,
                    });
                }
                index.by_file.entry(file.clone()).or_default().insert(unit);
            }
        }

        let units = &index.units;
        index.excluded.retain(|u| !units.contains_key(u));

        tracing::debug!(
            units = index.units.len(),
            files = index.by_file.len(),
            excluded = index.excluded.len(),
            "built unit index"
        );
        Ok((index, diagnostics))
    }

    pub fn lookup(&self, unit: &UnitName) -> Lookup<'_> {
        match self.units.get(unit) {
            Some(file) => Lookup::Defined(file),
            None if self.excluded.contains(unit) => Lookup::Excluded,
            None => Lookup::Missing,
        }
    }

    /// Units defined in `file`.
    pub fn units_in(&self, file: &FileId) -> impl Iterator<Item = &UnitName> {
        self.by_file.get(file).into_iter().flatten()
    }

    /// All indexed units in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&UnitName, &FileId)> {
        self.units.iter()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
