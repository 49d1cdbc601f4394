//! Definition file parser
//!
//! Definition files describe joints and constraints:
//!
//! ```text
//! units mm;
//! joint elbow {
//!     path = base/upper-lower;
//!     location = (0, 5, 0);
//!     rotate { direction = (0, 0, 1); limits = -90, 90, 0; }
//! };
//! constraint reach {
//!     joints { start = elbow; }
//!     effector = grip { arc = base/upper/lower/tip; };
//!     point = fixed (10, 0, 0);
//!     priority = 10;
//! };
//! ```
//!
//! Parsing never stops at the first error: a block that fails to parse is
//! reported and skipped, and its siblings are still loaded.
//!
//! ```
//! use articulate::{parse::parse_str, units::Scale};
//! let p = parse_str("demo", "joint a { }\nunits cm;", Scale::default());
//! assert!(p.joints.is_empty());
//! assert_eq!(p.diagnostics.len(), 1);
//! assert_eq!(p.scale.mm_per_unit(), 10.0);
//! ```
use crate::{
    Error,
    model::{Hold, Joint},
    units::Scale,
};
use log::{debug, warn};
use std::path::Path;

mod diagnostic;
mod grammar;
mod lexer;

pub use diagnostic::{Diagnostic, Severity};
pub use lexer::{Symbol, Token, TokenKind, tokenize};

/// Everything read from one definition file
#[derive(Debug)]
pub struct Parsed {
    /// Joints that parsed successfully, in file order
    pub joints: Vec<Joint>,
    /// Constraints that parsed successfully, in file order
    pub holds: Vec<Hold>,
    /// Warnings and errors, with file name and line text attached
    pub diagnostics: Vec<Diagnostic>,
    /// Units in effect at the end of the file
    pub scale: Scale,
}

impl Parsed {
    /// Iterates over error diagnostics
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    /// Checks whether any block was discarded
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

/// Parses definition text
///
/// `file` is only used to label diagnostics; `scale` gives the units that
/// are in effect until the text declares its own.
pub fn parse_str(file: &str, text: &str, scale: Scale) -> Parsed {
    let (tokens, mut diagnostics, end) = tokenize(text);
    let mut ctx = grammar::Context::new(scale, end);
    let (joints, holds) = grammar::file(&tokens, &mut ctx);
    diagnostics.extend(ctx.diagnostics);
    diagnostics.sort_by_key(|d| (d.line, d.col));

    let diagnostics: Vec<_> = diagnostics
        .into_iter()
        .map(|d| d.attach(file, text))
        .collect();
    for d in &diagnostics {
        warn!("{d}");
    }
    debug!(
        "{file}: {} joints, {} constraints, {} diagnostics",
        joints.len(),
        holds.len(),
        diagnostics.len()
    );
    Parsed {
        joints,
        holds,
        diagnostics,
        scale: ctx.scale,
    }
}

/// Reads and parses a definition file
pub fn parse_file<P: AsRef<Path>>(
    path: P,
    scale: Scale,
) -> Result<Parsed, Error> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    Ok(parse_str(&path.display().to_string(), &text, scale))
}
