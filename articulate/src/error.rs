//! Module containing the universal error type
use crate::parse::Diagnostic;
use thiserror::Error;

/// Universal error type for `articulate`
#[derive(Error, Debug)]
pub enum Error {
    /// Joint handle is not present in this registry
    #[error("joint handle is not present in this registry")]
    BadJoint,

    /// Hold handle is not present in this registry
    #[error("hold handle is not present in this registry")]
    BadHold,

    /// No joint with the given name
    #[error("joint {0} not found")]
    UnknownJoint(String),

    /// No hold with the given name
    #[error("constraint {0} not found")]
    UnknownHold(String),

    /// A joint with this name is already registered
    #[error("joint {0} is already defined")]
    DuplicateJoint(String),

    /// Degree-of-freedom index outside of `0..6`
    #[error("degree of freedom index {0} is out of range")]
    BadDofIndex(usize),

    /// The joint does not use the given degree of freedom
    #[error("joint {0} has no degree of freedom {1}")]
    UnusedDof(String, usize),

    /// Requested value lies outside of a degree of freedom's limits
    #[error("value {value} is outside of [{lower}, {upper}]")]
    OutOfRange {
        /// Requested value
        value: f64,
        /// Lower limit of the degree of freedom
        lower: f64,
        /// Upper limit of the degree of freedom
        upper: f64,
    },

    /// A path segment could not be found in the database
    #[error("object {0} not found")]
    UnknownObject(String),

    /// An object is not a member of its parent in the database
    #[error("{child} is not a member of {parent}")]
    NotAMember {
        /// Name of the parent object
        parent: String,
        /// Name of the child object
        child: String,
    },

    /// Path is too short for the requested operation
    #[error("path of length {0} is too short (need at least {1} segments)")]
    ShortPath(usize, usize),

    /// Object does not carry a grip or sphere center
    #[error("object {0} has no attachment point")]
    NoGeometry(String),

    /// Definition file could not be parsed
    #[error("parse failed with {} error(s)", .0.len())]
    ParseError(Vec<Diagnostic>),

    /// IO error; see inner code for details
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Rhai error; see inner code for details
    #[cfg(feature = "rhai")]
    #[error("Rhai parse error")]
    RhaiParseError(#[from] rhai::ParseError),

    /// Rhai error; see inner code for details
    #[cfg(feature = "rhai")]
    #[error("Rhai evaluation error")]
    RhaiEvalError(#[from] rhai::EvalAltResult),
}

#[cfg(feature = "rhai")]
impl From<Box<rhai::EvalAltResult>> for Error {
    fn from(e: Box<rhai::EvalAltResult>) -> Self {
        Error::RhaiEvalError(*e)
    }
}
