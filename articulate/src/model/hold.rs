//! Holds (point-to-point constraints) and their attachment points
use crate::{
    db::ObjectId,
    model::{joint::DofIndex, path::ArcPath, registry::JointId},
};
use nalgebra::Point3;

/// Default weight of a hold
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Default priority of a hold
pub const DEFAULT_PRIORITY: u32 = 50;

/// Largest legal priority (and the deepest level searched by the scheduler)
pub const MAX_PRIORITY: u32 = 100;

/// Kind of solid whose center is used as an attachment point
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SolidKind {
    /// A grip solid
    Grip,
    /// A sphere; its center is used
    Sphere,
}

/// What a [`HoldPoint`] is attached to
#[derive(Clone, Debug, PartialEq)]
pub enum HoldPointKind {
    /// Literal point, in millimeters
    Fixed(Point3<f64>),
    /// Center of a solid at the end of `path`
    Solid {
        /// Path from the root object down to the solid
        path: ArcPath,
        /// Flavor of solid, as written in the definition file
        solid: SolidKind,
        /// Vertex number, if one was given
        vertex: Option<u32>,
    },
    /// Pivot of a joint; the path's last segment is the joint's name
    Joint {
        /// Path to the joint's body, followed by the joint name
        path: ArcPath,
    },
}

/// One end of a hold
#[derive(Clone, Debug, PartialEq)]
pub struct HoldPoint {
    /// Attachment
    pub kind: HoldPointKind,

    /// Objects on the path, once every segment has been found
    pub(crate) resolved: Option<Vec<ObjectId>>,
    /// Attachment point in the leaf's local space, once fetched
    pub(crate) local: Option<Point3<f64>>,
}

impl HoldPoint {
    /// Builds a fixed point
    pub fn fixed(p: Point3<f64>) -> Self {
        Self::from(HoldPointKind::Fixed(p))
    }

    /// Builds a grip-attached point
    pub fn grip(path: ArcPath) -> Self {
        Self::from(HoldPointKind::Solid {
            path,
            solid: SolidKind::Grip,
            vertex: None,
        })
    }

    /// Builds a joint-attached point
    pub fn joint(path: ArcPath) -> Self {
        Self::from(HoldPointKind::Joint { path })
    }

    /// Returns the path, if this point is attached to something
    pub fn path(&self) -> Option<&ArcPath> {
        match &self.kind {
            HoldPointKind::Fixed(..) => None,
            HoldPointKind::Solid { path, .. }
            | HoldPointKind::Joint { path } => Some(path),
        }
    }

    /// Returns the path mutably
    pub fn path_mut(&mut self) -> Option<&mut ArcPath> {
        match &mut self.kind {
            HoldPointKind::Fixed(..) => None,
            HoldPointKind::Solid { path, .. }
            | HoldPointKind::Joint { path } => Some(path),
        }
    }

    /// Drops cached resolution state
    pub fn invalidate(&mut self) {
        self.resolved = None;
        self.local = None;
    }
}

impl From<HoldPointKind> for HoldPoint {
    fn from(kind: HoldPointKind) -> Self {
        Self {
            kind,
            resolved: None,
            local: None,
        }
    }
}

/// How the candidate joints of a hold are chosen
#[derive(Clone, Debug, PartialEq)]
pub enum JointSelection {
    /// Explicit list of joint names
    Names(Vec<String>),
    /// Joints whose arcs lie along this path
    Arc(ArcPath),
    /// Joints whose arcs lie along the effector's path (or the objective's,
    /// if the effector is a fixed point)
    Effector,
}

/// Joint set of a hold
#[derive(Clone, Debug, PartialEq)]
pub struct JointSet {
    /// Joint at which the controllable segment of the chain begins
    pub start: Option<String>,
    /// Candidate selection
    pub selection: JointSelection,
    /// Joints removed from the candidates
    pub except: Vec<String>,
}

impl Default for JointSet {
    fn default() -> Self {
        Self {
            start: None,
            selection: JointSelection::Effector,
            except: vec![],
        }
    }
}

/// A joint participating in a hold, with its per-DOF exclusion mask
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct JointHandle {
    /// The joint
    pub joint: JointId,
    /// Bit `i` set means [`DofIndex`] `i` is not searched
    pub excluded: u8,
}

impl JointHandle {
    /// Mask with every degree of freedom excluded
    pub const ALL: u8 = (1 << DofIndex::COUNT) - 1;

    /// Checks whether a degree of freedom is excluded
    pub fn is_excluded(&self, i: DofIndex) -> bool {
        self.excluded & i.bit() != 0
    }

    /// Excludes a degree of freedom
    pub fn exclude(&mut self, i: DofIndex) {
        self.excluded |= i.bit();
    }

    /// Checks whether every degree of freedom is excluded
    pub fn is_exhausted(&self) -> bool {
        self.excluded & Self::ALL == Self::ALL
    }
}

/// A weighted, prioritized constraint pulling an effector toward an objective
#[derive(Clone, Debug)]
pub struct Hold {
    /// Optional name
    pub name: Option<String>,
    /// Non-negative weight
    pub weight: f64,
    /// Priority in `0..=100`; lower numbers are solved first
    pub priority: u32,
    /// The point being moved
    pub effector: HoldPoint,
    /// The point it is pulled toward
    pub objective: HoldPoint,
    /// Candidate joints
    pub joints: JointSet,

    /// Last computed pull
    pub eval: f64,
    /// No further local improvement is possible at this priority level
    pub tried: bool,
    /// Participating joints (populated lazily)
    pub(crate) handles: Vec<JointHandle>,
}

impl Hold {
    /// Builds a hold with default weight and priority
    pub fn new(
        effector: HoldPoint,
        objective: HoldPoint,
        joints: JointSet,
    ) -> Self {
        Self {
            name: None,
            weight: DEFAULT_WEIGHT,
            priority: DEFAULT_PRIORITY,
            effector,
            objective,
            joints,
            eval: 0.0,
            tried: false,
            handles: vec![],
        }
    }

    /// Returns the hold's name, or a placeholder for unnamed holds
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("UNNAMED")
    }

    /// Priority level used by the scheduler, clamped to [`MAX_PRIORITY`]
    pub fn level(&self) -> usize {
        self.priority.min(MAX_PRIORITY) as usize
    }

    /// Returns the participating joints
    pub fn handles(&self) -> &[JointHandle] {
        &self.handles
    }

    /// Checks whether every participating degree of freedom is excluded
    pub fn is_exhausted(&self) -> bool {
        self.handles.iter().all(JointHandle::is_exhausted)
    }

    /// Excludes one degree of freedom of one joint
    ///
    /// Marks the hold as tried once nothing is left to search.
    pub fn exclude(&mut self, joint: JointId, dof: DofIndex) {
        for h in self.handles.iter_mut().filter(|h| h.joint == joint) {
            h.exclude(dof);
        }
        if self.is_exhausted() {
            self.tried = true;
        }
    }

    /// Clears the tried flag and every exclusion except `unused` bits
    pub(crate) fn reset(&mut self, unused: impl Fn(JointId) -> u8) {
        self.tried = false;
        for h in &mut self.handles {
            h.excluded = unused(h.joint);
        }
    }

    /// Drops cached joint handles and point resolution state
    pub fn invalidate(&mut self) {
        self.handles.clear();
        self.effector.invalidate();
        self.objective.invalidate();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::handle::Arena;

    #[test]
    fn exclusion_masks() {
        let mut arena: Arena<(), JointId> = Arena::default();
        let a = arena.insert(());
        let b = arena.insert(());
        let mut h = Hold::new(
            HoldPoint::fixed(Point3::origin()),
            HoldPoint::fixed(Point3::new(1.0, 0.0, 0.0)),
            JointSet::default(),
        );
        h.handles = vec![
            JointHandle {
                joint: a,
                excluded: 0b111110,
            },
            JointHandle {
                joint: b,
                excluded: 0b111101,
            },
        ];
        assert!(!h.is_exhausted());
        h.exclude(a, DofIndex::rotation(0));
        assert!(!h.tried);
        h.exclude(b, DofIndex::rotation(1));
        assert!(h.tried);
        assert!(h.is_exhausted());

        h.reset(|j| if j == a { 0b111110 } else { 0b111101 });
        assert!(!h.tried);
        assert!(!h.handles[0].is_excluded(DofIndex::rotation(0)));
        assert!(h.handles[0].is_excluded(DofIndex::translation(2)));
    }

    #[test]
    fn labels() {
        let mut h = Hold::new(
            HoldPoint::fixed(Point3::origin()),
            HoldPoint::grip(ArcPath::arc(["a", "b"])),
            JointSet::default(),
        );
        assert_eq!(h.label(), "UNNAMED");
        h.name = Some("reach".to_owned());
        assert_eq!(h.label(), "reach");
        assert_eq!(h.objective.path().unwrap().to_string(), "a/b");
        assert!(h.effector.path().is_none());
    }

    #[test]
    fn level_is_clamped() {
        let mut h = Hold::new(
            HoldPoint::fixed(Point3::origin()),
            HoldPoint::fixed(Point3::origin()),
            JointSet::default(),
        );
        assert_eq!(h.level(), DEFAULT_PRIORITY as usize);
        h.priority = MAX_PRIORITY + 50;
        assert_eq!(h.level(), MAX_PRIORITY as usize);
    }
}
