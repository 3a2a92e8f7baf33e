use serde::Serialize;
use thiserror::Error;

use crate::unit::{FileId, UnitName};

/// Non-fatal conditions found while indexing and resolving.
///
/// None of these stop a run; they are collected in order and handed back
/// with the emission order so the caller decides how to report them.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    #[error("Warning: no file found for module {unit}")]
    UnresolvedUnit { unit: UnitName },

    #[error("Warning: Module {unit} use itself! ({file})")]
    SelfReference { unit: UnitName, file: FileId },

    #[error("Warning: module {unit} defined in {replaced} is redefined in {kept}; using {kept}")]
    DuplicateDefinition {
        unit: UnitName,
        kept: FileId,
        replaced: FileId,
    },

    #[error("Info: intrinsic module {unit} used {count} times")]
    BuiltinUsage { unit: UnitName, count: usize },
}

impl Diagnostic {
    pub fn is_warning(&self) -> bool {
        !matches!(self, Diagnostic::BuiltinUsage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_cli_wording() {
        let d = Diagnostic::UnresolvedUnit {
            unit: UnitName::new("Netcdf"),
        };
        assert_eq!(d.to_string(), "Warning: no file found for module netcdf");

        let d = Diagnostic::BuiltinUsage {
            unit: UnitName::new("iso_c_binding"),
            count: 3,
        };
        assert_eq!(d.to_string(), "Info: intrinsic module iso_c_binding used 3 times");
        assert!(!d.is_warning());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let d = Diagnostic::SelfReference {
            unit: UnitName::new("a"),
            file: FileId::new("a.f90"),
        };
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["kind"], "self_reference");
        assert_eq!(v["unit"], "a");
        assert_eq!(v["file"], "a.f90");
    }
}
