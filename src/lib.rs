pub mod cli;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod discover;
pub mod driver;
pub mod index;
pub mod logging;
pub mod report;
pub mod resolve;
pub mod scan;
pub mod unit;

pub use config::Config;
pub use context::ContextEnv;
pub use diagnostics::Diagnostic;
pub use driver::{run, Driver};
pub use index::{Lookup, UnitIndex};
pub use report::Report;
pub use resolve::{Builtins, ResolveState, Resolver};
pub use scan::{FortranScanner, SourceScanner};
pub use unit::{FileId, UnitName};
