//! Domain models for skillmap
//!
//! Contains the core validation and graph logic without any I/O concerns.

mod id;
mod finding;
mod unit;
mod schema;
mod graph;
pub mod references;
pub mod integrity;

pub use id::{is_kebab_case, IdError, UnitId};
pub use finding::{Finding, FindingCode, Report, Severity};
pub use unit::{string_list, Frontmatter, Platform, Unit, UnitKind};
pub use schema::{dedup_ids, validate_unit, KindSchema, ToolAllowList};
pub use graph::{ConflictPair, Edge, EdgeOrigin, UnitGraph, UnitNode};
pub use references::References;
pub use integrity::GraphValidation;
