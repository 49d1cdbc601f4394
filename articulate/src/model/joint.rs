//! Joints and their degrees of freedom
use crate::{Error, db::ObjectId, model::path::ArcPath};
use arrayvec::ArrayVec;
use nalgebra::{Point3, Unit, UnitQuaternion, Vector3};

/// Maximum number of rotations (and, separately, translations) per joint
pub const MAX_DOFS: usize = 3;

/// Index of a degree of freedom within a joint
///
/// Indices `0..3` select rotations and `3..6` select translations, matching
/// the numbering used by the transaction log and by exclusion masks.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct DofIndex(u8);

impl DofIndex {
    /// Total number of addressable degrees of freedom
    pub const COUNT: usize = 2 * MAX_DOFS;

    /// Builds a rotation index
    ///
    /// # Panics
    /// If `i >= 3`
    pub fn rotation(i: usize) -> Self {
        assert!(i < MAX_DOFS);
        Self(i as u8)
    }

    /// Builds a translation index
    ///
    /// # Panics
    /// If `i >= 3`
    pub fn translation(i: usize) -> Self {
        assert!(i < MAX_DOFS);
        Self((i + MAX_DOFS) as u8)
    }

    /// Checks whether this index selects a rotation
    pub fn is_rotation(&self) -> bool {
        (self.0 as usize) < MAX_DOFS
    }

    /// Position within the rotation or translation list
    pub fn slot(&self) -> usize {
        self.0 as usize % MAX_DOFS
    }

    /// Raw index in `0..6`
    pub fn get(&self) -> usize {
        self.0 as usize
    }

    /// Single-bit mask for this index
    pub fn bit(&self) -> u8 {
        1 << self.0
    }

    /// Iterates over all six indices, rotations first
    pub fn all() -> impl Iterator<Item = DofIndex> {
        (0..Self::COUNT as u8).map(DofIndex)
    }
}

impl TryFrom<usize> for DofIndex {
    type Error = Error;
    fn try_from(i: usize) -> Result<Self, Error> {
        if i < Self::COUNT {
            Ok(Self(i as u8))
        } else {
            Err(Error::BadDofIndex(i))
        }
    }
}

impl std::fmt::Display for DofIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_rotation() { "rot" } else { "trans" };
        write!(f, "{kind}[{}]", self.slot())
    }
}

/// A single bounded degree of freedom
///
/// For rotations, `direction` is the rotation axis and values are degrees;
/// for translations it is the direction of travel and values are millimeters.
#[derive(Clone, Debug, PartialEq)]
pub struct Dof {
    /// Unit axis or direction
    pub direction: Unit<Vector3<f64>>,
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
    /// Value used by the kinematic evaluator
    pub current: f64,
    /// Last committed value
    pub accepted: f64,
}

impl Dof {
    /// Builds a degree of freedom at rest (`current = accepted = 0`, clamped)
    ///
    /// Returns `None` if the direction has zero length.  Inverted bounds are
    /// swapped.
    pub fn new(
        direction: Vector3<f64>,
        lower: f64,
        upper: f64,
    ) -> Option<Self> {
        let direction = Unit::try_new(direction, f64::EPSILON)?;
        let (lower, upper) = if lower > upper {
            (upper, lower)
        } else {
            (lower, upper)
        };
        let rest = 0.0f64.clamp(lower, upper);
        Some(Self {
            direction,
            lower,
            upper,
            current: rest,
            accepted: rest,
        })
    }

    /// Sets both `current` and `accepted`, clamping into bounds
    pub fn with_value(mut self, v: f64) -> Self {
        self.current = self.clamp(v);
        self.accepted = self.current;
        self
    }

    /// Clamps a value into `[lower, upper]`
    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.lower, self.upper)
    }

    /// Checks whether a value lies within the bounds
    pub fn contains(&self, v: f64) -> bool {
        v >= self.lower && v <= self.upper
    }

    /// Quaternion for a rotation of `current` degrees about this axis
    ///
    /// The vector part is `axis·sin(θ/2)` and the scalar part `cos(θ/2)`.
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        let theta = self.current.to_radians();
        UnitQuaternion::from_axis_angle(&self.direction, theta)
    }

    /// Offset for a translation of `current` millimeters
    pub fn translation(&self) -> Vector3<f64> {
        self.direction.into_inner() * self.current
    }
}

/// A mechanical connection with up to three rotations and three translations
#[derive(Clone, Debug)]
pub struct Joint {
    /// Unique name
    pub name: String,
    /// Arc (or symbolic path) to the body moved by this joint
    pub path: ArcPath,
    /// Pivot, in the parent's local space (millimeters)
    pub location: Point3<f64>,
    /// Rotations, composed in declaration order
    pub rotations: ArrayVec<Dof, MAX_DOFS>,
    /// Translations, composed in declaration order
    pub translations: ArrayVec<Dof, MAX_DOFS>,

    /// Objects on `path`, once it has been resolved against a database
    pub(crate) resolved: Option<Vec<ObjectId>>,
}

impl Joint {
    /// Builds a joint with no degrees of freedom
    pub fn new<S: Into<String>>(
        name: S,
        path: ArcPath,
        location: Point3<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            path,
            location,
            rotations: ArrayVec::new(),
            translations: ArrayVec::new(),
            resolved: None,
        }
    }

    /// Adds a rotation, returning it back if all three slots are taken
    pub fn push_rotation(&mut self, d: Dof) -> Result<(), Dof> {
        self.rotations.try_push(d).map_err(|e| e.element())
    }

    /// Adds a translation, returning it back if all three slots are taken
    pub fn push_translation(&mut self, d: Dof) -> Result<(), Dof> {
        self.translations.try_push(d).map_err(|e| e.element())
    }

    /// Looks up a degree of freedom, returning `None` if it is unused
    pub fn dof(&self, i: DofIndex) -> Option<&Dof> {
        if i.is_rotation() {
            self.rotations.get(i.slot())
        } else {
            self.translations.get(i.slot())
        }
    }

    /// Looks up a degree of freedom mutably
    pub fn dof_mut(&mut self, i: DofIndex) -> Option<&mut Dof> {
        if i.is_rotation() {
            self.rotations.get_mut(i.slot())
        } else {
            self.translations.get_mut(i.slot())
        }
    }

    /// Iterates over the indices of every used degree of freedom
    pub fn active(&self) -> impl Iterator<Item = DofIndex> + '_ {
        DofIndex::all().filter(|i| self.dof(*i).is_some())
    }

    /// Checks whether at least one degree of freedom is in use
    pub fn is_movable(&self) -> bool {
        !(self.rotations.is_empty() && self.translations.is_empty())
    }

    /// Bitmask of *unused* degrees of freedom
    pub fn unused_mask(&self) -> u8 {
        DofIndex::all()
            .filter(|i| self.dof(*i).is_none())
            .fold(0, |m, i| m | i.bit())
    }

    /// Reads the current value of a degree of freedom
    pub fn value(&self, i: DofIndex) -> Result<f64, Error> {
        self.dof(i)
            .map(|d| d.current)
            .ok_or_else(|| Error::UnusedDof(self.name.clone(), i.get()))
    }

    /// Sets the current value of a degree of freedom
    ///
    /// Values outside of the bounds are rejected; the joint's cached
    /// animation is left for the caller to refresh.
    pub fn set_value(&mut self, i: DofIndex, v: f64) -> Result<(), Error> {
        let name = &self.name;
        let d = match i.is_rotation() {
            true => self.rotations.get_mut(i.slot()),
            false => self.translations.get_mut(i.slot()),
        }
        .ok_or_else(|| Error::UnusedDof(name.clone(), i.get()))?;
        if !d.contains(v) {
            return Err(Error::OutOfRange {
                value: v,
                lower: d.lower,
                upper: d.upper,
            });
        }
        d.current = v;
        Ok(())
    }

    /// Commits every current value
    pub fn accept(&mut self) {
        for d in self.dofs_mut() {
            d.accepted = d.current;
        }
    }

    /// Restores every current value from its committed value
    pub fn reject(&mut self) {
        for d in self.dofs_mut() {
            d.current = d.accepted;
        }
    }

    fn dofs_mut(&mut self) -> impl Iterator<Item = &mut Dof> {
        self.rotations.iter_mut().chain(self.translations.iter_mut())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn hinge() -> Joint {
        let mut j = Joint::new(
            "hinge",
            ArcPath::arc(["base", "arm"]),
            Point3::origin(),
        );
        j.push_rotation(Dof::new(Vector3::z(), -90.0, 90.0).unwrap())
            .unwrap();
        j
    }

    #[test]
    fn dof_indices() {
        let r = DofIndex::rotation(2);
        let t = DofIndex::translation(0);
        assert!(r.is_rotation());
        assert!(!t.is_rotation());
        assert_eq!(t.get(), 3);
        assert_eq!(t.slot(), 0);
        assert_eq!(t.bit(), 0b1000);
        assert!(DofIndex::try_from(6).is_err());
        assert_eq!(DofIndex::all().count(), 6);
    }

    #[test]
    fn dof_construction() {
        let d = Dof::new(Vector3::new(0.0, 0.0, 2.0), 10.0, 5.0).unwrap();
        assert_eq!((d.lower, d.upper), (5.0, 10.0));
        assert_eq!(d.current, 5.0);
        assert_eq!(d.accepted, 5.0);
        assert_eq!(d.direction.into_inner(), Vector3::z());
        assert!(Dof::new(Vector3::zeros(), 0.0, 1.0).is_none());
    }

    #[test]
    fn set_and_commit() {
        let mut j = hinge();
        let r0 = DofIndex::rotation(0);
        j.set_value(r0, 45.0).unwrap();
        assert!(j.set_value(r0, 100.0).is_err());
        assert!(j.set_value(DofIndex::rotation(1), 1.0).is_err());
        assert_eq!(j.value(r0).unwrap(), 45.0);
        j.reject();
        assert_eq!(j.value(r0).unwrap(), 0.0);
        j.set_value(r0, 30.0).unwrap();
        j.accept();
        j.set_value(r0, -30.0).unwrap();
        j.reject();
        assert_eq!(j.value(r0).unwrap(), 30.0);
    }

    #[test]
    fn unused_slots() {
        let mut j = hinge();
        assert_eq!(j.unused_mask(), 0b111110);
        assert_eq!(j.active().collect::<Vec<_>>(), vec![DofIndex::rotation(0)]);
        for _ in 0..2 {
            j.push_rotation(Dof::new(Vector3::x(), 0.0, 1.0).unwrap())
                .unwrap();
        }
        assert!(
            j.push_rotation(Dof::new(Vector3::x(), 0.0, 1.0).unwrap())
                .is_err()
        );
    }
}
