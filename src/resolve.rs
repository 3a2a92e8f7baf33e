use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    diagnostics::Diagnostic,
    index::{Lookup, UnitIndex},
    scan::SourceScanner,
    unit::{FileId, UnitName},
};

/// Units that are always available and never backed by a source file.
#[derive(Debug, Clone, Default)]
pub struct Builtins {
    names: Vec<UnitName>,
}

impl Builtins {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<UnitName> = Vec::new();
        for n in names {
            let name = UnitName::new(n.as_ref());
            if !name.as_str().is_empty() && !out.contains(&name) {
                out.push(name);
            }
        }
        Self { names: out }
    }

    pub fn contains(&self, unit: &UnitName) -> bool {
        self.names.contains(unit)
    }

    /// Names in configured order.
    pub fn names(&self) -> &[UnitName] {
        &self.names
    }
}

/// Mutable state of one resolution run.
#[derive(Debug, Clone, Default)]
pub struct ResolveState {
    processed: BTreeSet<UnitName>,
    in_progress: BTreeSet<UnitName>,
    emitted: BTreeSet<FileId>,
    output: Vec<FileId>,
    builtin_usage: BTreeMap<UnitName, usize>,
    diagnostics: Vec<Diagnostic>,
}

impl ResolveState {
    pub fn output(&self) -> &[FileId] {
        &self.output
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn builtin_count(&self, unit: &UnitName) -> usize {
        self.builtin_usage.get(unit).copied().unwrap_or(0)
    }

    pub fn is_processed(&self, unit: &UnitName) -> bool {
        self.processed.contains(unit)
    }

    pub fn is_emitted(&self, file: &FileId) -> bool {
        self.emitted.contains(file)
    }

    pub fn into_parts(self) -> (Vec<FileId>, Vec<Diagnostic>, BTreeMap<UnitName, usize>) {
        (self.output, self.diagnostics, self.builtin_usage)
    }
}

/// A unit whose dependencies are still being walked.
#[derive(Debug)]
struct Frame {
    unit: UnitName,
    file: FileId,
    /// Remaining dependencies, reverse-sorted so `pop` yields name order.
    pending: Vec<UnitName>,
}

/// Depth-first dependency walk over a [`UnitIndex`].
///
/// Every file reached is appended to the output only after all files it
/// depends on. A unit met again while its own dependencies are still being
/// walked is skipped, which is how cycles terminate.
pub struct Resolver<'a, S: SourceScanner + ?Sized> {
    index: &'a UnitIndex,
    scanner: &'a S,
    builtins: &'a Builtins,
    state: ResolveState,
}

impl<'a, S: SourceScanner + ?Sized> Resolver<'a, S> {
    pub fn new(index: &'a UnitIndex, scanner: &'a S, builtins: &'a Builtins) -> Self {
        Self {
            index,
            scanner,
            builtins,
            state: ResolveState::default(),
        }
    }

    pub fn state(&self) -> &ResolveState {
        &self.state
    }

    pub fn into_state(self) -> ResolveState {
        self.state
    }

    /// Resolve `units` and everything they transitively depend on.
    /// Names are visited in sorted order so output is reproducible.
    pub fn resolve<I>(&mut self, units: I) -> Result<()>
    where
        I: IntoIterator<Item = UnitName>,
    {
        let roots: BTreeSet<UnitName> = units.into_iter().collect();
        for unit in roots {
            self.walk(&unit)?;
        }
        Ok(())
    }

    /// Append `file` to the output unless it is already there.
    pub fn emit(&mut self, file: &FileId) -> bool {
        if !self.state.emitted.insert(file.clone()) {
            return false;
        }
        tracing::debug!(file = %file, position = self.state.output.len(), "emit");
        self.state.output.push(file.clone());
        true
    }

    fn walk(&mut self, root: &UnitName) -> Result<()> {
        let mut stack: Vec<Frame> = Vec::new();
        if let Some(frame) = self.enter(root)? {
            stack.push(frame);
        }

        while let Some(top) = stack.last_mut() {
            if let Some(next) = top.pending.pop() {
                if let Some(frame) = self.enter(&next)? {
                    stack.push(frame);
                }
                continue;
            }

            if let Some(done) = stack.pop() {
                self.finish(done);
            }
        }

        Ok(())
    }

    /// Start on `unit`. Returns `None` when there is nothing to walk.
    fn enter(&mut self, unit: &UnitName) -> Result<Option<Frame>> {
        let index = self.index;
        let file = match index.lookup(unit) {
            Lookup::Defined(file) => file,
            Lookup::Excluded => {
                tracing::trace!(unit = %unit, "skipping unit from excluded file");
                return Ok(None);
            }
            Lookup::Missing => {
                if !self.count_builtin(unit) {
                    self.state.diagnostics.push(Diagnostic::UnresolvedUnit {
                        unit: unit.clone(),
                    });
                }
                return Ok(None);
            }
        };

        if self.state.processed.contains(unit) {
            return Ok(None);
        }
        if self.state.in_progress.contains(unit) {
            tracing::debug!(unit = %unit, file = %file, "cycle: unit already on the walk stack");
            return Ok(None);
        }

        let pending = self.dependencies_of(unit, file)?;
        tracing::trace!(unit = %unit, file = %file, deps = pending.len(), "enter");

        self.state.in_progress.insert(unit.clone());
        Ok(Some(Frame {
            unit: unit.clone(),
            file: file.clone(),
            pending,
        }))
    }

    /// References of `file` that lead to other files, reverse-sorted.
    fn dependencies_of(&mut self, unit: &UnitName, file: &FileId) -> Result<Vec<UnitName>> {
        let mut refs = self.scanner.referenced_units(file)?;
        let index = self.index;

        // With several units in one file a sibling may own the `use`, so the
        // scanner has to place it inside the unit's own body.
        if refs.remove(unit) {
            let is_self_use = index.units_in(file).count() <= 1
                || self.scanner.self_referencing_units(file)?.contains(unit);
            if is_self_use {
                self.state.diagnostics.push(Diagnostic::SelfReference {
                    unit: unit.clone(),
                    file: file.clone(),
                });
            }
        }

        for co_located in index.units_in(file) {
            refs.remove(co_located);
        }

        refs.retain(|r| !self.count_builtin(r));

        Ok(refs.into_iter().rev().collect())
    }

    /// Record every unit defined in `file` as resolved without walking it.
    pub fn mark_file_processed(&mut self, file: &FileId) {
        let index = self.index;
        self.state
            .processed
            .extend(index.units_in(file).cloned());
    }

    fn finish(&mut self, frame: Frame) {
        self.state.in_progress.remove(&frame.unit);
        self.state.processed.insert(frame.unit);
        self.mark_file_processed(&frame.file);
        self.emit(&frame.file);
    }

    fn count_builtin(&mut self, unit: &UnitName) -> bool {
        if !self.builtins.contains(unit) {
            return false;
        }
        *self.state.builtin_usage.entry(unit.clone()).or_insert(0) += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::memory::MemoryScanner;

    fn index_of(s: &MemoryScanner) -> UnitIndex {
        UnitIndex::build(&s.files(), s, &BTreeSet::new()).unwrap().0
    }

    fn names(items: &[&str]) -> Vec<UnitName> {
        items.iter().map(|s| UnitName::new(s)).collect()
    }

    fn order(state: &ResolveState) -> Vec<&str> {
        state.output().iter().map(FileId::as_str).collect()
    }

    fn position(state: &ResolveState, file: &str) -> usize {
        state
            .output()
            .iter()
            .position(|f| f.as_str() == file)
            .unwrap()
    }

    #[test]
    fn dependencies_come_first() {
        let s = MemoryScanner::new()
            .file("a.f90", &["a"], &["b", "c"])
            .file("b.f90", &["b"], &["c"])
            .file("c.f90", &["c"], &[]);
        let idx = index_of(&s);
        let builtins = Builtins::default();

        let mut r = Resolver::new(&idx, &s, &builtins);
        r.resolve(names(&["a"])).unwrap();

        assert_eq!(order(r.state()), vec!["c.f90", "b.f90", "a.f90"]);
        assert!(r.state().diagnostics().is_empty());
    }

    #[test]
    fn diamond_emits_shared_dependency_once() {
        let s = MemoryScanner::new()
            .file("top.f90", &["top"], &["left", "right"])
            .file("left.f90", &["left"], &["base"])
            .file("right.f90", &["right"], &["base"])
            .file("base.f90", &["base"], &[]);
        let idx = index_of(&s);
        let builtins = Builtins::default();

        let mut r = Resolver::new(&idx, &s, &builtins);
        r.resolve(names(&["top"])).unwrap();

        let st = r.state();
        assert_eq!(order(st), vec!["base.f90", "left.f90", "right.f90", "top.f90"]);
    }

    #[test]
    fn cycle_terminates_with_each_file_once() {
        let s = MemoryScanner::new()
            .file("a.f90", &["a"], &["b"])
            .file("b.f90", &["b"], &["a"]);
        let idx = index_of(&s);
        let builtins = Builtins::default();

        let mut r = Resolver::new(&idx, &s, &builtins);
        r.resolve(names(&["a"])).unwrap();

        assert_eq!(order(r.state()), vec!["b.f90", "a.f90"]);
        assert!(r.state().is_processed(&"a".into()));
        assert!(r.state().is_processed(&"b".into()));
    }

    #[test]
    fn self_reference_is_reported_and_dropped() {
        let s = MemoryScanner::new().file("a.f90", &["a"], &["A"]);
        let idx = index_of(&s);
        let builtins = Builtins::default();

        let mut r = Resolver::new(&idx, &s, &builtins);
        r.resolve(names(&["a"])).unwrap();

        assert_eq!(order(r.state()), vec!["a.f90"]);
        assert_eq!(
            r.state().diagnostics(),
            &[Diagnostic::SelfReference {
                unit: "a".into(),
                file: FileId::new("a.f90"),
            }]
        );
    }

    #[test]
    fn co_located_units_do_not_create_edges() {
        let s = MemoryScanner::new()
            .file("types.f90", &["kinds", "types"], &["kinds", "util"])
            .file("util.f90", &["util"], &[]);
        let idx = index_of(&s);
        let builtins = Builtins::default();

        let mut r = Resolver::new(&idx, &s, &builtins);
        r.resolve(names(&["types", "kinds"])).unwrap();

        let st = r.state();
        assert_eq!(order(st), vec!["util.f90", "types.f90"]);
        assert!(st.is_processed(&"kinds".into()));
        assert!(st.diagnostics().is_empty());
    }

    #[test]
    fn self_use_among_co_located_units_is_reported() {
        let s = MemoryScanner::new()
            .file("pair.f90", &["a", "b"], &["a"])
            .self_use("pair.f90", "a");
        let idx = index_of(&s);
        let builtins = Builtins::default();

        let mut r = Resolver::new(&idx, &s, &builtins);
        r.resolve(names(&["a"])).unwrap();

        assert_eq!(order(r.state()), vec!["pair.f90"]);
        assert_eq!(
            r.state().diagnostics(),
            &[Diagnostic::SelfReference {
                unit: "a".into(),
                file: FileId::new("pair.f90"),
            }]
        );
    }

    #[test]
    fn marked_file_is_not_walked_again() {
        let s = MemoryScanner::new()
            .file("main.f90", &["app"], &["iso_c_binding", "netcdf"])
            .file("other.f90", &["other"], &[]);
        let idx = index_of(&s);
        let builtins = Builtins::new(["iso_c_binding"]);

        let mut r = Resolver::new(&idx, &s, &builtins);
        r.mark_file_processed(&FileId::new("main.f90"));
        r.resolve(names(&["app", "other"])).unwrap();

        let st = r.state();
        assert!(st.is_processed(&"app".into()));
        assert_eq!(order(st), vec!["other.f90"]);
        assert_eq!(st.builtin_count(&"iso_c_binding".into()), 0);
        assert!(st.diagnostics().is_empty());
    }

    #[test]
    fn builtins_are_counted_not_resolved() {
        let s = MemoryScanner::new()
            .file("a.f90", &["a"], &["iso_c_binding", "b"])
            .file("b.f90", &["b"], &["ISO_C_BINDING", "omp_lib"]);
        let idx = index_of(&s);
        let builtins = Builtins::new(["iso_c_binding", "omp_lib"]);

        let mut r = Resolver::new(&idx, &s, &builtins);
        r.resolve(names(&["a", "iso_c_binding"])).unwrap();

        let st = r.state();
        assert_eq!(order(st), vec!["b.f90", "a.f90"]);
        assert_eq!(st.builtin_count(&"iso_c_binding".into()), 3);
        assert_eq!(st.builtin_count(&"omp_lib".into()), 1);
        assert!(st.diagnostics().is_empty());
    }

    #[test]
    fn unresolved_units_warn_and_continue() {
        let s = MemoryScanner::new()
            .file("a.f90", &["a"], &["netcdf", "b"])
            .file("b.f90", &["b"], &[]);
        let idx = index_of(&s);
        let builtins = Builtins::default();

        let mut r = Resolver::new(&idx, &s, &builtins);
        r.resolve(names(&["a"])).unwrap();

        assert_eq!(order(r.state()), vec!["b.f90", "a.f90"]);
        assert_eq!(
            r.state().diagnostics(),
            &[Diagnostic::UnresolvedUnit {
                unit: "netcdf".into()
            }]
        );
    }

    #[test]
    fn excluded_units_are_silently_skipped() {
        let s = MemoryScanner::new()
            .file("a.f90", &["a"], &["legacy"])
            .file("legacy.f90", &["legacy"], &["deep"])
            .file("deep.f90", &["deep"], &[]);
        let exclusions: BTreeSet<FileId> = [FileId::new("legacy.f90")].into_iter().collect();
        let (idx, _) = UnitIndex::build(&s.files(), &s, &exclusions).unwrap();
        let builtins = Builtins::default();

        let mut r = Resolver::new(&idx, &s, &builtins);
        r.resolve(names(&["a"])).unwrap();

        let st = r.state();
        assert_eq!(order(st), vec!["a.f90"]);
        assert!(st.diagnostics().is_empty());
        assert!(!st.is_emitted(&FileId::new("deep.f90")));
    }

    #[test]
    fn repeated_calls_do_not_reemit() {
        let s = MemoryScanner::new()
            .file("a.f90", &["a"], &["c"])
            .file("b.f90", &["b"], &["c"])
            .file("c.f90", &["c"], &[]);
        let idx = index_of(&s);
        let builtins = Builtins::default();

        let mut r = Resolver::new(&idx, &s, &builtins);
        r.resolve(names(&["a"])).unwrap();
        r.resolve(names(&["b", "a"])).unwrap();

        let st = r.state();
        assert_eq!(order(st), vec!["c.f90", "a.f90", "b.f90"]);
        assert!(position(st, "c.f90") < position(st, "b.f90"));
    }

    #[test]
    fn long_chains_do_not_recurse() {
        let mut s = MemoryScanner::new();
        let n = 5_000;
        let file_names: Vec<String> = (0..n).map(|i| format!("m{i:05}.f90")).collect();
        let unit_names: Vec<String> = (0..n).map(|i| format!("m{i:05}")).collect();
        for i in 0..n {
            let uses: Vec<&str> = if i + 1 < n {
                vec![unit_names[i + 1].as_str()]
            } else {
                vec![]
            };
            s = s.file(&file_names[i], &[unit_names[i].as_str()], &uses);
        }
        let idx = index_of(&s);
        let builtins = Builtins::default();

        let mut r = Resolver::new(&idx, &s, &builtins);
        r.resolve(names(&["m00000"])).unwrap();

        let st = r.state();
        assert_eq!(st.output().len(), n);
        assert_eq!(st.output()[0].as_str(), "m04999.f90");
        assert_eq!(st.output()[n - 1].as_str(), "m00000.f90");
    }

    #[test]
    fn scanner_errors_are_fatal() {
        let s = MemoryScanner::new().file("a.f90", &["a"], &[]);
        let idx = index_of(&s);
        // An index built from another source set points at files the scanner cannot read.
        let other = MemoryScanner::new().file("x.f90", &["x"], &[]);
        let builtins = Builtins::default();

        let mut r = Resolver::new(&idx, &other, &builtins);
        assert!(r.resolve(names(&["a"])).is_err());
    }

    #[test]
    fn builtin_names_are_deduplicated() {
        let b = Builtins::new(["OMP_LIB", "omp_lib", "", "openacc"]);
        assert_eq!(b.names(), &names(&["omp_lib", "openacc"])[..]);
    }
}
