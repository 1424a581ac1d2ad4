//! Structural model of LaTeX sources for delta debugging.
//!
//! This crate turns a LaTeX source (or any fragment of one) into an ordered
//! sequence of typed [`DeltaUnit`]s and provides the operations a minimizer
//! needs to move through that structure:
//!
//! - [`decompose`]: split a text around a boundary marker into skeleton and
//!   center content
//! - [`check_balanced`] / [`check_closed`]: closure validation run before
//!   anything is compiled
//! - [`skeleton`]: the fixed frame assembled around candidate content
//! - [`unwrap_delta`]: strip the shell of a nested unit
//! - [`enter_definition_argument`]: step into the bracket arguments of
//!   `\newcommand`, `\newenvironment` and hook definitions
//!
//! Every decomposition is lossless: concatenating the units reproduces the
//! input exactly.

pub mod balance;
pub mod decompose;
pub mod definition;
pub mod delta;
pub mod error;
pub mod lexer;
pub mod skeleton;
pub mod unwrap;

pub use balance::{check_balanced, check_closed};
pub use decompose::{decompose, decompose_document, Boundary, Decomposition, Opening};
pub use definition::{defined_command, enter_definition_argument, DefinitionEntry, DefinitionKind, DefinitionShape};
pub use delta::{concat, relabel, ChunkKey, DeltaId, DeltaKind, DeltaUnit, Provenance};
pub use error::{BoundaryKind, RegionKind, Result, StructureError};
pub use lexer::{command_name, find_environment_begin, lex_units};
pub use skeleton::{split, Frame};
pub use unwrap::{detect_opening, unwrap_delta, Unwrapped};
