//! Constraint solving: single-hold descent and the priority cascade
//!
//! The [`Solver`] borrows a [`Registry`] for the duration of a solve.  Joint
//! moves are recorded in a [`SolveLog`] so that speculative steps can be
//! rolled back; the log is committed (emptied) before [`Solver::solve`] and
//! [`Solver::solve_hold`] return.
use crate::{
    db::{Animations, Database},
    eval, kinematics,
    model::{DofIndex, Hold, HoldId, Joint, JointId, Registry, handle::Arena},
};
use log::trace;

pub mod golden;
mod local;
mod schedule;
mod undo;

pub use schedule::{Outcome, SolveReport, SolveStatus};
pub use undo::{Checkpoint, Entry, SolveLog};

/// Tuning parameters for a solve
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SolveSettings {
    /// Maximum number of driver iterations
    pub loops: usize,
    /// Initial half-width of each line search
    pub delta: f64,
    /// Convergence tolerance on pull
    pub epsilon: f64,
}

impl Default for SolveSettings {
    fn default() -> Self {
        Self {
            loops: 1000,
            delta: 16.0,
            epsilon: 0.1,
        }
    }
}

/// Solver state borrowed from a registry
pub struct Solver<'a, D: Database + ?Sized> {
    db: &'a D,
    joints: &'a mut Arena<Joint, JointId>,
    holds: &'a mut Arena<Hold, HoldId>,
    anims: &'a mut Animations,
    log: SolveLog,
    settings: SolveSettings,
}

impl<'a, D: Database + ?Sized> Solver<'a, D> {
    /// Borrows a registry and its animation overrides
    pub fn new(
        db: &'a D,
        reg: &'a mut Registry,
        anims: &'a mut Animations,
        settings: SolveSettings,
    ) -> Self {
        let Registry { joints, holds, .. } = reg;
        Self {
            db,
            joints,
            holds,
            anims,
            log: SolveLog::new(),
            settings,
        }
    }

    /// Returns the active settings
    pub fn settings(&self) -> &SolveSettings {
        &self.settings
    }

    /// Returns the transaction log
    pub fn log(&self) -> &SolveLog {
        &self.log
    }

    /// Computes a hold's pull without storing it
    fn pull(&mut self, h: HoldId) -> f64 {
        eval::pull(self.db, self.joints, self.anims, &mut self.holds[h])
    }

    /// Sets one degree of freedom and refreshes the joint's animation
    fn set(&mut self, j: JointId, dof: DofIndex, v: f64) {
        set_dof(self.db, self.joints, self.anims, j, dof, v);
    }

    /// Undoes the most recent move
    pub fn undo(&mut self) -> Option<Entry> {
        let e = self.log.pop()?;
        trace!("undo {:?} {} {} -> {}", e.joint, e.dof, e.new, e.old);
        self.set(e.joint, e.dof, e.old);
        Some(e)
    }

    /// Undoes every move made after a checkpoint
    pub fn rollback_to(&mut self, c: Checkpoint) -> usize {
        let undone = self.log.rollback_to(c);
        for e in &undone {
            trace!("rollback {:?} {} {} -> {}", e.joint, e.dof, e.new, e.old);
            self.set(e.joint, e.dof, e.old);
        }
        undone.len()
    }
}

/// Writes a degree of freedom directly and refreshes the joint's animation
///
/// Unused degrees of freedom and stale handles are ignored.
fn set_dof<D: Database + ?Sized>(
    db: &D,
    joints: &mut Arena<Joint, JointId>,
    anims: &mut Animations,
    j: JointId,
    dof: DofIndex,
    v: f64,
) {
    let Some(joint) = joints.get_mut(j) else {
        return;
    };
    if let Some(d) = joint.dof_mut(dof) {
        d.current = v;
        kinematics::adjust(db, j, joint, anims);
    }
}
