//! Hold point resolution and constraint evaluation
//!
//! A hold's *pull* is its weight times the distance between its effector and
//! its objective.  A point that cannot be located (missing object, missing
//! joint, missing grip geometry) contributes nothing: the hold evaluates to
//! zero, so that holds referring to geometry which does not exist yet are
//! treated as satisfied rather than as errors.
use crate::{
    Error,
    db::{Animations, Database},
    model::{
        Hold, HoldId, HoldPoint, HoldPointKind, Joint, JointId, Registry,
        handle::Arena, lookup_all,
    },
};
use log::{debug, trace};
use nalgebra::Point3;

/// Computes the world-space location of a hold point
///
/// Returns `None` if any part of the point cannot be found.  Successful path
/// lookups and attachment points are cached in the hold point.
pub(crate) fn locate<D: Database + ?Sized>(
    db: &D,
    joints: &Arena<Joint, JointId>,
    anims: &Animations,
    p: &mut HoldPoint,
) -> Option<Point3<f64>> {
    let path = match &p.kind {
        HoldPointKind::Fixed(pt) => return Some(*pt),
        HoldPointKind::Solid { path, .. } => &path.segments[..],
        HoldPointKind::Joint { path } => {
            let n = path.segments.len().checked_sub(1)?;
            &path.segments[..n]
        }
    };

    if p.resolved.is_none() {
        match lookup_all(db, path) {
            Ok(ids) => p.resolved = Some(ids),
            Err(missing) => {
                debug!("object {missing} not found");
                return None;
            }
        }
    }
    let ids = p.resolved.as_deref()?;

    if p.local.is_none() {
        let local = match &p.kind {
            HoldPointKind::Fixed(pt) => *pt,
            HoldPointKind::Solid { .. } => {
                let leaf = ids.last().copied()?;
                match db.read_geometry(leaf) {
                    Ok(c) => c,
                    Err(e) => {
                        debug!("{e}");
                        return None;
                    }
                }
            }
            HoldPointKind::Joint { path } => {
                let name = path.leaf()?;
                match joints.iter().find(|(_, j)| j.name == name) {
                    Some((_, j)) => j.location,
                    None => {
                        debug!("joint {name} not found");
                        return None;
                    }
                }
            }
        };
        p.local = Some(local);
    }
    let local = p.local?;

    match db.path_to_matrix(ids, 1.min(ids.len()), anims) {
        Ok(m) => Some(m.transform_point(&local)),
        Err(e) => {
            debug!("{e}");
            None
        }
    }
}

/// Computes a hold's pull, without storing it
pub(crate) fn pull<D: Database + ?Sized>(
    db: &D,
    joints: &Arena<Joint, JointId>,
    anims: &Animations,
    h: &mut Hold,
) -> f64 {
    let Some(e) = locate(db, joints, anims, &mut h.effector) else {
        debug!("{}: unable to locate effector", h.label());
        return 0.0;
    };
    let Some(o) = locate(db, joints, anims, &mut h.objective) else {
        debug!("{}: unable to locate objective", h.label());
        return 0.0;
    };
    let v = h.weight * (e - o).norm();
    trace!("{}: pull {v}", h.label());
    v
}

/// Computes a hold's pull and stores it in [`Hold::eval`]
pub fn evaluate<D: Database + ?Sized>(
    reg: &mut Registry,
    db: &D,
    anims: &Animations,
    id: HoldId,
) -> Result<f64, Error> {
    let Registry { joints, holds, .. } = reg;
    let h = holds.get_mut(id).ok_or(Error::BadHold)?;
    let v = pull(db, joints, anims, h);
    h.eval = v;
    Ok(v)
}

/// Locates both ends of a hold, as `(effector, objective)`
pub fn locate_ends<D: Database + ?Sized>(
    reg: &mut Registry,
    db: &D,
    anims: &Animations,
    id: HoldId,
) -> Result<(Option<Point3<f64>>, Option<Point3<f64>>), Error> {
    let Registry { joints, holds, .. } = reg;
    let h = holds.get_mut(id).ok_or(Error::BadHold)?;
    let e = locate(db, joints, anims, &mut h.effector);
    let o = locate(db, joints, anims, &mut h.objective);
    Ok((e, o))
}
