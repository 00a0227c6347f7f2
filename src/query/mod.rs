// Compilation stages, leaves first
pub mod filter;
pub mod operator;
pub mod options;
pub mod update;

mod builder;
mod exec;
mod record;
mod types;

// Public API re-exports
pub use builder::Builder;
pub use filter::{DatePart, compile_filter};
pub use operator::{Operator, compile_operator, like_to_regex, parse_regex};
pub use options::{compile_find_options, compile_pipeline, compile_projection, compile_sort};
pub use record::{Record, materialize};
pub use types::{Boolean, Clause, ClauseKind, Mutation, Order, Selection, SortSpec};
pub use update::{compile_update, mutations_from_document};
