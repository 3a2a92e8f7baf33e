use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    diagnostics::Diagnostic,
    resolve::{Builtins, ResolveState},
    unit::{FileId, UnitName},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltinCount {
    pub unit: UnitName,
    pub count: usize,
}

/// Outcome of a run: the emission order plus everything worth telling the user.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub files: Vec<FileId>,
    pub diagnostics: Vec<Diagnostic>,
    pub builtin_usage: Vec<BuiltinCount>,
}

impl Report {
    /// `early` diagnostics (from indexing) are listed before those of the walk.
    pub fn new(early: Vec<Diagnostic>, state: ResolveState, builtins: &Builtins) -> Self {
        let (files, walk_diags, usage) = state.into_parts();

        let mut diagnostics = early;
        diagnostics.extend(walk_diags);

        Self {
            files,
            diagnostics,
            builtin_usage: usage_in_order(&usage, builtins),
        }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_warning())
    }

    /// Lines for stderr: warnings, then the builtin usage summary.
    pub fn diagnostic_lines(&self) -> Vec<String> {
        let mut out: Vec<String> = self.diagnostics.iter().map(|d| d.to_string()).collect();
        for b in &self.builtin_usage {
            let d = Diagnostic::BuiltinUsage {
                unit: b.unit.clone(),
                count: b.count,
            };
            out.push(d.to_string());
        }
        out
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for f in &self.files {
            out.push_str(f.as_str());
            out.push('\n');
        }
        out
    }

    pub fn render_json(&self) -> Result<String> {
        let mut s = serde_json::to_string_pretty(self)?;
        s.push('\n');
        Ok(s)
    }
}

fn usage_in_order(usage: &BTreeMap<UnitName, usize>, builtins: &Builtins) -> Vec<BuiltinCount> {
    builtins
        .names()
        .iter()
        .filter_map(|name| {
            let count = usage.get(name).copied().unwrap_or(0);
            (count > 0).then(|| BuiltinCount {
                unit: name.clone(),
                count,
            })
        })
        .collect()
}
