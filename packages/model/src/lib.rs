//! # Folio Document Model
//!
//! The immutable document model behind the editor:
//!
//! - **Grammar**: node and mark types compiled from declarative specs
//! - **Tree**: persistent nodes with token-counted positions
//! - **Steps**: validated, invertible edits that report position maps
//! - **Transactions**: atomic step sequences with selection and metadata
//!
//! Nothing in this crate mutates a document in place. Every edit produces a
//! new tree that shares untouched subtrees with the old one.

pub mod attrs;
pub mod content;
pub mod error;
pub mod mapping;
pub mod mark;
pub mod node;
pub mod resolve;
pub mod schema;
pub mod selection;
pub mod step;
pub mod transaction;

#[cfg(test)]
mod test_support;

pub use attrs::{attrs, Attrs};
pub use content::ContentExpr;
pub use error::{ContentExprError, SchemaError, StepError};
pub use mapping::{Assoc, MapResult, Mapping, StepMap};
pub use mark::Mark;
pub use node::{char_slice, Fragment, Node, NodeFlags, TEXT_NODE};
pub use resolve::ResolvedPos;
pub use schema::{AttrSpec, MarkSpec, MarkType, NodeSpec, NodeType, Schema};
pub use selection::{nearest_text_pos, textblock_ranges, Selection};
pub use step::{Step, StepResult};
pub use transaction::{AppliedTransaction, Transaction, TransactionMeta};
