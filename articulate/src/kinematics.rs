//! Turns a joint's current values into a rigid-body transform
//!
//! The transform of a joint with pivot `p` is
//! `T(p) · Dₖ⋯D₁ · Rₖ⋯R₁ · T(−p)`: points are moved to the pivot, rotated
//! by each rotation in declaration order, translated by each translation in
//! declaration order, then moved back.
use crate::{
    db::{Animation, Animations, Database},
    model::{Joint, JointId},
};
use log::{debug, trace, warn};
use nalgebra::Matrix4;

/// Computes the transform implied by a joint's current values
pub fn joint_matrix(j: &Joint) -> Matrix4<f64> {
    let mut m = Matrix4::new_translation(&-j.location.coords);
    for r in &j.rotations {
        trace!(
            "{}: rotating {} about {:?}",
            j.name,
            r.current,
            r.direction.as_ref()
        );
        m = r.rotation().to_homogeneous() * m;
    }
    for t in &j.translations {
        trace!("{}: moving {:?}", j.name, t.translation());
        m = Matrix4::new_translation(&t.translation()) * m;
    }
    Matrix4::new_translation(&j.location.coords) * m
}

/// Recomputes a joint's animation override
///
/// If the joint's path cannot be resolved against the database, any previous
/// override is removed, the cached resolution is dropped, and `false` is
/// returned; the joint is simply not present in this database.
pub fn adjust<D: Database + ?Sized>(
    db: &D,
    id: JointId,
    j: &mut Joint,
    anims: &mut Animations,
) -> bool {
    if j.resolved.is_none() {
        match j.path.lookup(db) {
            Ok(p) if !p.is_empty() => j.resolved = Some(p),
            Ok(_) => {
                warn!("joint {} has an empty path", j.name);
                anims.remove(id);
                return false;
            }
            Err(missing) => {
                debug!("joint {}: object {missing} not found", j.name);
                anims.remove(id);
                return false;
            }
        }
    }
    let Some(path) = &j.resolved else {
        return false;
    };
    let matrix = joint_matrix(j);
    trace!("{}: animation {matrix}", j.name);
    anims.insert(
        id,
        Animation {
            path: path.clone(),
            matrix,
        },
    );
    true
}
