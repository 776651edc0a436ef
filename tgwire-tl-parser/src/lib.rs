//! Parser for Telegram's [Type Language] (TL) schema files.
//!
//! This crate converts raw `.tl` text into a structured [`Definition`] AST
//! which the runtime codec (`tgwire-tl`) compiles into its constructor and
//! method registries.
//!
//! Beyond plain declarations the parser understands the annotations found in
//! real schema files: `---functions---` / `---types---` section markers,
//! `===N===` layer markers, and `//@key value` documentation directives
//! (used by the TDLib flavour of the schema to describe declarations and
//! their parameters).
//!
//! # Quick start
//!
//! ```rust
//! use tgwire_tl_parser::parse_tl_file;
//!
//! let src = "user#d23c81a3 id:int first_name:string last_name:string = User;";
//! for def in parse_tl_file(src) {
//!     println!("{:#?}", def.unwrap());
//! }
//! ```
//!
//! [Type Language]: https://core.telegram.org/mtproto/TL

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Parse error types for TL schema parsing.
pub mod errors;
pub mod tl;
mod iterator;
mod utils;

use errors::ParseError;
use tl::Definition;

pub use utils::{normalize_signature, tl_id};

/// Parses a complete TL schema file, yielding [`Definition`]s one by one.
///
/// Lines starting with `//` are treated as comments and skipped, except for
/// `//@key value` directive lines whose descriptions attach to the next
/// declaration. The special `---functions---` and `---types---` markers
/// switch the [`tl::Category`] applied to the following definitions, and
/// `===N===` markers set their layer.
///
/// Old-style `?=` declarations are skipped without error, matching the
/// official schema files which still carry them.
///
/// Returns an iterator of `Result<Definition, ParseError>` so callers can
/// decide whether to skip or hard-fail on bad lines.
pub fn parse_tl_file(contents: &str) -> impl Iterator<Item = Result<Definition, ParseError>> + '_ {
    iterator::TlIterator::new(contents)
}
