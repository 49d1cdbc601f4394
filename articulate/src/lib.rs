//! Articulate is a constraint solver for articulated joint chains.
//!
//! A **joint** connects a body to its parent in a geometry database and moves
//! it with up to three rotations and three translations, each bounded by
//! limits.  A **constraint** (called a *hold* internally) asks that a point
//! on one body (the effector) reach a goal point, which may be fixed in space
//! or attached to another body.
//!
//! # Definition files
//! Joints and constraints are read from a small text grammar, described in
//! the [`parse`] module, and written back out by [`save`].
//!
//! # Solving
//! Each constraint has a priority from 0 (most important) to 100.  The
//! [`Solver`](solver::Solver) nudges one degree of freedom at a time, using a
//! golden-section line search to find the value that most reduces a
//! constraint's *pull* (its weighted distance to the goal).  A move that
//! helps a less important constraint is kept only if no more important
//! constraint gets worse; otherwise it is rolled back.
//!
//! # Databases
//! Geometry lives behind the [`Database`](db::Database) trait, which looks up
//! objects by name and composes the matrices along a path.  Joints never
//! modify the database; instead, each joint publishes an *animation
//! override* that is applied on top of the member matrix at its arc.  The
//! in-memory [`MemoryDatabase`](db::MemoryDatabase) can be built by hand or
//! from a [Rhai](https://rhai.rs) script (see the [`rhai`] module).
//!
//! # Sessions
//! [`Session`](session::Session) ties everything together:
//!
//! ```
//! use articulate::{
//!     db::MemoryDatabase,
//!     session::{LoadOptions, Session},
//!     solver::{SolveSettings, SolveStatus},
//! };
//! use nalgebra::{Matrix4, Point3};
//!
//! let mut db = MemoryDatabase::new();
//! db.combination("base");
//! db.combination("carriage");
//! db.grip("g", Point3::origin());
//! db.add_member("base", "carriage", Matrix4::identity())?;
//! db.add_member("carriage", "g", Matrix4::identity())?;
//!
//! let mut s = Session::new(db);
//! let report = s.load_str("demo", "
//!     joint slide {
//!         path = base-carriage;
//!         location = (0, 0, 0);
//!         translate { direction = (1, 0, 0); limits = -10, 10, 0; }
//!     };
//!     constraint reach {
//!         joints { joints = slide; }
//!         effector = grip { path = base/carriage-g; };
//!         point = fixed (3, 0, 0);
//!     };
//! ", LoadOptions::default());
//! assert!(!report.has_errors());
//!
//! let r = s.solve(SolveSettings::default());
//! assert_eq!(r.status, SolveStatus::Converged);
//! assert!(s.evaluate("reach")? < 0.1);
//! # Ok::<(), articulate::Error>(())
//! ```
//!
//! # Feature flags
#![doc = document_features::document_features!()]
#![warn(missing_docs)]

pub mod db;
mod error;
pub mod eval;
pub mod kinematics;
pub mod model;
pub mod parse;
pub mod save;
pub mod session;
pub mod solver;
pub mod units;

pub use error::Error;

#[cfg(feature = "rhai")]
pub mod rhai;
