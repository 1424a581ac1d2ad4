//! # texmin-minimizer
//!
//! Hierarchical delta debugging of failing LaTeX documents.
//!
//! Given a document that fails to compile, the [`Driver`] reduces it to a
//! small compilable document that fails with the same first fatal
//! diagnostic. It works top-down through the document structure:
//!
//! - ddmin over the units of the document body ([`SearchPass`])
//! - the preamble, once the body can be emptied without losing the error
//! - the shell and interior of each isolated nested unit ([`attribute`])
//! - the bracket arguments of `\newcommand`-style definitions
//!
//! ## Example
//!
//! ```rust,ignore
//! use texmin_minimizer::{Driver, MinimizerConfig};
//! use texmin_oracle::{ProcessOracle, ProcessOracleConfig};
//!
//! let oracle = ProcessOracle::new(ProcessOracleConfig::default());
//! let driver = Driver::new(MinimizerConfig::default());
//!
//! let result = driver.minimize(&source, &oracle).await?;
//! println!("{}", result.document);
//! println!("{}", result.stats);
//! ```

pub mod attribution;
pub mod config;
pub mod driver;
pub mod error;
pub mod probe;
pub mod result;
pub mod search;

pub use attribution::{attribute, Attribution};
pub use config::MinimizerConfig;
pub use driver::Driver;
pub use error::{MinimizerError, Result};
pub use probe::OracleProbe;
pub use result::{MinimizationStats, Minimized, Resolution};
pub use search::{chunk_size, PassOutcome, Scope, ScopeLevel, SearchPass};
