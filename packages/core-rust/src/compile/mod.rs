//! Compilers from collection schemas to editor configurations.
//!
//! All compilers borrow a [`ReferenceCatalog`](crate::catalog::ReferenceCatalog)
//! and are pure: the same schema, variant, and catalog always produce the same
//! output.

pub mod config;
pub mod field;
pub mod header;
pub mod options;
pub mod search;

pub use config::{ConfigCompiler, EditorConfig};
pub use field::{EditorField, FieldCompiler, Validation, WidgetKind};
pub use header::{DataTableHeader, HeaderCompiler, HeaderKind, ReferenceCell};
pub use options::CompilerOptions;
pub use search::{build_search_filter, SearchCompiler, SearchField, SearchOperator};
