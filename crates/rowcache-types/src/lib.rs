//! Rowcache Types - Pure type definitions
//!
//! Schema-agnostic rows, the tagged scalar values they carry, and the cache
//! keys derived from them. No async runtime or store dependencies live here.

pub mod key;
pub mod row;
pub mod value;

pub use key::*;
pub use row::*;
pub use value::*;
