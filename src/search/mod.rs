//! Search engine: filter vocabulary, cursor model, query compiler and
//! executor, and the smart-collection evaluator built on the same
//! filter/SQL plumbing.

mod cursor;
mod filter;
mod query;
mod smart;

pub use cursor::*;
pub use filter::*;
pub use query::*;
pub use smart::*;
