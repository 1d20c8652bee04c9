/// Script dependency tracking
///
/// Computes source and executable contexts of scripts from static imports and
/// `INPUTS` declarations, persists them as timestamped markers, and gates
/// static analysis and tests on those markers so they only rerun when
/// something they depend on changed.
pub mod discover;
pub mod executor;
pub mod freshness;
pub mod gate;
pub mod graph;
pub mod grouped;
pub mod language;
pub mod makefile;
pub mod paths;
pub mod project;
pub mod scanner;
pub mod store;
pub mod uses;

pub use gate::{CheckKind, CheckOutcome, CheckReport, Gatekeeper};
pub use graph::{DepGraph, GraphBuilder, Node};
pub use grouped::{GroupedTarget, HealOutcome};
pub use language::{Language, SourceFile};
pub use project::Project;
pub use scanner::{ScanError, ScanRecord, Scanner};
pub use store::{ArtifactKind, ContextStore};
