//! Priority cascade over every hold
//!
//! Holds are grouped by priority level (0 is the most important).  The
//! scheduler works on the least important level that still has pull, and
//! every move it keeps is followed by a recursive pass over the more
//! important levels.  A move that makes any more important level worse is
//! rolled back and its degree of freedom is excluded for that hold.
use super::{Checkpoint, Entry, SolveSettings, Solver};
use crate::{
    Error,
    db::Database,
    model::{HoldId, MAX_PRIORITY},
};
use log::{debug, info, trace};

const LEVELS: usize = MAX_PRIORITY as usize + 1;

/// Result of one pass of the priority cascade
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Nothing at this level or above could be improved further
    Converged,
    /// A move was kept and this level is now satisfied
    Improved,
    /// A move was kept but this level still has pull
    Undetermined,
    /// Every move tried made a more important level worse
    Regressed,
}

/// Final status of a solve
#[derive(Copy, Clone, Debug, Eq, PartialEq, strum::Display)]
pub enum SolveStatus {
    /// Every priority level has total pull below epsilon
    #[strum(to_string = "converged")]
    Converged,
    /// Ran out of iterations, or no further progress is possible
    #[strum(to_string = "not converged")]
    StoppedNotConverged,
    /// The search window shrank below epsilon
    #[strum(to_string = "will not converge")]
    WillNotConverge,
}

/// Summary of a solve
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SolveReport {
    /// Final status
    pub status: SolveStatus,
    /// Number of driver iterations run
    pub iterations: usize,
    /// Number of moves kept
    pub moves: usize,
    /// Search half-width at the end of the solve
    pub delta: f64,
    /// Total pull over every hold at the end of the solve
    pub pull: f64,
}

impl<D: Database + ?Sized> Solver<'_, D> {
    /// Evaluates every hold, storing each pull and summing by priority level
    fn level_sums(&mut self) -> [f64; LEVELS] {
        let mut sums = [0.0; LEVELS];
        for h in self.holds.handles() {
            let v = self.pull(h);
            let hold = &mut self.holds[h];
            hold.eval = v;
            sums[hold.level()] += v;
        }
        sums
    }

    /// Sum of pull over the holds at one priority level
    fn level_sum(&mut self, pri: usize) -> f64 {
        let mut sum = 0.0;
        for h in self.holds.handles() {
            if self.holds[h].level() == pri {
                sum += self.pull(h);
            }
        }
        sum
    }

    /// Holds sorted by priority, then by descending pull
    fn ordered(&self) -> Vec<HoldId> {
        let mut out = self.holds.handles();
        out.sort_by(|a, b| {
            let (a, b) = (&self.holds[*a], &self.holds[*b]);
            a.priority
                .cmp(&b.priority)
                .then(b.eval.total_cmp(&a.eval))
        });
        out
    }

    /// Excludes the degree of freedom used by a move from further search
    fn exclude(&mut self, h: HoldId, e: &Entry) {
        let hold = &mut self.holds[h];
        hold.exclude(e.joint, e.dof);
        trace!("{}: excluding {}", hold.label(), e.dof);
    }

    /// Runs the priority cascade from level `pri` down to level 0
    pub fn system_solve(
        &mut self,
        pri: usize,
        delta: f64,
        epsilon: f64,
    ) -> Outcome {
        let mut pri = pri.min(MAX_PRIORITY as usize) as isize;
        let before = self.level_sums();
        let order = self.ordered();

        loop {
            while pri >= 0 && before[pri as usize] < epsilon {
                pri -= 1;
            }
            if pri < 0 {
                trace!("nothing left to improve");
                return Outcome::Converged;
            }
            let level = pri as usize;

            // first untried hold at this level that can be moved
            let mut moved = None;
            for &h in &order {
                let hold = &self.holds[h];
                if hold.level() != level || hold.tried {
                    continue;
                }
                match self.part_solve(h, delta, epsilon) {
                    Ok(Some(e)) => {
                        moved = Some((h, e));
                        break;
                    }
                    Ok(None) => self.holds[h].tried = true,
                    Err(e) => debug!("{e}"),
                }
            }
            let Some((h, e)) = moved else {
                pri -= 1;
                continue;
            };

            let after = self.level_sum(level);
            trace!("level {level}: {} -> {after}", before[level]);
            if after > before[level] + epsilon {
                self.exclude(h, &e);
                self.undo();
                continue;
            }

            // keep the move only if no more important level gets worse
            let checkpoint = self.log.checkpoint();
            let mut inner = Outcome::Undetermined;
            for _ in 0..self.settings.loops.max(1) {
                inner = match level.checked_sub(1) {
                    Some(up) => self.system_solve(up, delta, epsilon),
                    None => Outcome::Converged,
                };
                if inner != Outcome::Undetermined {
                    break;
                }
            }
            let now = self.level_sums();
            let worse = (0..=level).find(|&i| now[i] > before[i] + epsilon);
            if inner == Outcome::Regressed || worse.is_some() {
                debug!(
                    "level {level}: rolling back \
                     ({inner:?}, level {worse:?} worse)"
                );
                self.reject(checkpoint, h, &e);
                return Outcome::Regressed;
            }
            return if now[level] < epsilon {
                Outcome::Improved
            } else {
                Outcome::Undetermined
            };
        }
    }

    /// Rolls back to just before a move, then excludes it
    fn reject(&mut self, checkpoint: Checkpoint, h: HoldId, e: &Entry) {
        self.rollback_to(checkpoint);
        self.exclude(h, e);
        self.undo();
    }

    /// Clears per-iteration state on every hold
    fn reset(&mut self) {
        for h in self.holds.handles() {
            let hold = &mut self.holds[h];
            let joints = &*self.joints;
            hold.reset(|j| joints.get(j).map(|j| j.unused_mask()).unwrap_or(0));
        }
    }

    /// Runs the priority cascade until every hold is satisfied, progress
    /// stops, or the iteration budget runs out
    pub fn solve(&mut self) -> SolveReport {
        let SolveSettings {
            loops,
            mut delta,
            epsilon,
        } = self.settings;
        self.log.commit();

        let mut moves = 0;
        let mut iterations = 0;
        let mut status = SolveStatus::StoppedNotConverged;
        while iterations < loops {
            iterations += 1;
            self.reset();
            let top = self
                .holds
                .iter()
                .map(|(_, h)| h.level())
                .max()
                .unwrap_or(0);
            let outcome = self.system_solve(top, delta, epsilon);
            let n = self.log.commit();
            moves += n;
            trace!("iteration {iterations}: {outcome:?} after {n} moves");

            match outcome {
                Outcome::Converged | Outcome::Improved => {
                    if self.level_sums().iter().all(|&v| v < epsilon) {
                        status = SolveStatus::Converged;
                        break;
                    } else if n == 0 {
                        break;
                    }
                }
                Outcome::Undetermined => (),
                Outcome::Regressed => {
                    delta /= 2.0;
                    debug!("splitting delta ({delta})");
                    if delta < epsilon {
                        status = SolveStatus::WillNotConverge;
                        break;
                    }
                }
            }
        }
        let pull = self.total();
        info!("system {status} after {iterations} iterations (pull {pull})");
        SolveReport {
            status,
            iterations,
            moves,
            delta,
            pull,
        }
    }

    /// Total pull over every hold, refreshing each hold's stored value
    fn total(&mut self) -> f64 {
        self.level_sums().iter().sum()
    }

    /// Looks up a hold by name and solves it alone
    pub fn solve_named(&mut self, name: &str) -> Result<usize, Error> {
        let h = self
            .holds
            .iter()
            .find(|(_, h)| h.name.as_deref() == Some(name))
            .map(|(id, _)| id)
            .ok_or_else(|| Error::UnknownHold(name.to_owned()))?;
        self.solve_hold(h)
    }
}
