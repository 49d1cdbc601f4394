//! Single-hold descent
//!
//! Each step line-searches every searchable degree of freedom of every joint
//! participating in a hold, then applies the one move that reduces the hold's
//! pull the most.
use super::{Entry, SolveSettings, Solver, golden, set_dof};
use crate::{
    Error,
    db::Database,
    eval,
    model::{
        DofIndex, HoldId, JointHandle, JointId, JointSelection, find_run,
    },
};
use log::{debug, trace, warn};

impl<D: Database + ?Sized> Solver<'_, D> {
    /// Finds the joints that participate in a hold
    ///
    /// Joints upstream of the hold's start joint are dropped, as are joints
    /// named in its `except` list.  Unused degrees of freedom start out
    /// excluded.
    pub(crate) fn populate(&mut self, h: HoldId) {
        let hold = &self.holds[h];
        let candidates: Option<&[String]> = match &hold.joints.selection {
            JointSelection::Names(..) => None,
            JointSelection::Arc(p) => Some(&p.segments),
            JointSelection::Effector => hold
                .effector
                .path()
                .or_else(|| hold.objective.path())
                .map(|p| &p.segments[..]),
        };

        // (joint, position of the joint along the candidate arc)
        let mut found: Vec<(JointId, Option<usize>)> = vec![];
        for (id, j) in self.joints.iter() {
            match (&hold.joints.selection, candidates) {
                (JointSelection::Names(names), _) => {
                    if names.contains(&j.name) {
                        found.push((id, None));
                    }
                }
                (_, Some(arc)) => {
                    if let Some(loc) = find_run(arc, &j.path.segments) {
                        trace!("{}: found {} at {loc}", hold.label(), j.name);
                        found.push((id, Some(loc)));
                    }
                }
                (_, None) => (),
            }
        }

        let start = hold.joints.start.as_ref().and_then(|s| {
            let loc = found
                .iter()
                .find(|(id, _)| self.joints[*id].name == *s)
                .and_then(|(_, loc)| *loc);
            if loc.is_none() {
                warn!("{}: joint {s} is not on the arc", hold.label());
            }
            loc
        });

        let handles: Vec<JointHandle> = found
            .into_iter()
            .filter(|(id, loc)| {
                let j = &self.joints[*id];
                if hold.joints.except.contains(&j.name) {
                    return false;
                }
                match (start, loc) {
                    (Some(s), Some(l)) if *l < s => {
                        debug!("{}: dropping {}", hold.label(), j.name);
                        false
                    }
                    _ => true,
                }
            })
            .map(|(joint, _)| JointHandle {
                joint,
                excluded: self.joints[joint].unused_mask(),
            })
            .collect();
        if handles.is_empty() {
            debug!("{}: no joints to move", hold.label());
        }
        self.holds[h].handles = handles;
    }

    /// Makes the single best move for one hold
    ///
    /// Returns the recorded move, or `None` if the hold is already satisfied
    /// or no move improves it by at least `epsilon / 100`.
    pub fn part_solve(
        &mut self,
        h: HoldId,
        delta: f64,
        epsilon: f64,
    ) -> Result<Option<Entry>, Error> {
        if self.holds.get(h).is_none() {
            return Err(Error::BadHold);
        }
        if self.holds[h].handles.is_empty() {
            self.populate(h);
        }

        let orig = self.pull(h);
        if orig.abs() < epsilon {
            trace!("{}: satisfied ({orig} < {epsilon})", self.holds[h].label());
            return Ok(None);
        }

        let mut best: Option<Entry> = None;
        let mut best_eval = orig;
        let Self {
            db,
            joints,
            holds,
            anims,
            ..
        } = self;
        let hold = &mut holds[h];

        for k in 0..hold.handles.len() {
            let handle = hold.handles[k];
            for dof in DofIndex::all() {
                if handle.is_excluded(dof) {
                    continue;
                }
                let Some(d) = joints[handle.joint].dof(dof) else {
                    hold.handles[k].exclude(dof);
                    continue;
                };
                let (start, lower, upper) = (d.current, d.lower, d.upper);

                let m = golden::minimize(
                    |x| {
                        set_dof(*db, joints, anims, handle.joint, dof, x);
                        eval::pull(*db, joints, anims, hold)
                    },
                    start,
                    delta,
                    lower,
                    upper,
                );
                set_dof(*db, joints, anims, handle.joint, dof, start);

                if m.f < best_eval {
                    trace!(
                        "{}: new min {}:{dof} = {} ({} < {best_eval})",
                        hold.label(),
                        joints[handle.joint].name,
                        m.x,
                        m.f
                    );
                    best_eval = m.f;
                    best = Some(Entry {
                        joint: handle.joint,
                        dof,
                        old: start,
                        new: m.x,
                    });
                }
            }
        }

        let Some(e) = best else {
            trace!("{}: no better configuration", self.holds[h].label());
            return Ok(None);
        };
        if orig - best_eval < epsilon / 100.0 {
            trace!("{}: no reasonable improvement", self.holds[h].label());
            return Ok(None);
        }
        debug!(
            "{}: moving {}:{} {} -> {} (pull {orig} -> {best_eval})",
            self.holds[h].label(),
            self.joints[e.joint].name,
            e.dof,
            e.old,
            e.new
        );
        self.log.push(e);
        self.set(e.joint, e.dof, e.new);
        Ok(Some(e))
    }

    /// Repeats [`part_solve`](Self::part_solve) on one hold, committing each
    /// move, until it stops improving or `loops` runs out
    ///
    /// Returns the number of moves made.
    pub fn solve_hold(&mut self, h: HoldId) -> Result<usize, Error> {
        let SolveSettings {
            loops,
            delta,
            epsilon,
        } = self.settings;
        self.holds.get_mut(h).ok_or(Error::BadHold)?.tried = false;
        let mut count = 0;
        while count < loops && self.part_solve(h, delta, epsilon)?.is_some() {
            self.log.commit();
            count += 1;
        }
        self.log.commit();
        let v = self.pull(h);
        self.holds[h].eval = v;
        Ok(count)
    }
}
