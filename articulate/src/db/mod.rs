//! Interface to the geometry database that holds the assembly hierarchy
//!
//! The solver never owns geometry.  It looks objects up by name, asks for the
//! placement matrix of a child within its parent, and reads the center of grip
//! (or sphere) solids.  Joint motion is layered on top of the database through
//! [`Animations`], so the stored hierarchy is never mutated.
use crate::{Error, model::JointId, units::Scale};
use nalgebra::{Matrix4, Point3};
use std::collections::BTreeMap;

mod memory;
pub use memory::MemoryDatabase;

/// Opaque handle to an object in a [`Database`]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Builds an object handle from a database-specific index
    pub fn new(i: usize) -> Self {
        Self(i)
    }

    /// Returns the database-specific index
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Matrix override attached to the object at the end of `path`
#[derive(Clone, Debug, PartialEq)]
pub struct Animation {
    /// Objects from the root down to the animated object
    pub path: Vec<ObjectId>,
    /// Transform applied in the animated object's parent frame
    pub matrix: Matrix4<f64>,
}

/// One animation override per joint
#[derive(Clone, Debug, Default)]
pub struct Animations(BTreeMap<JointId, Animation>);

impl Animations {
    /// Builds an empty set of overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs (or replaces) a joint's override
    pub fn insert(&mut self, j: JointId, a: Animation) {
        self.0.insert(j, a);
    }

    /// Removes a joint's override
    pub fn remove(&mut self, j: JointId) -> Option<Animation> {
        self.0.remove(&j)
    }

    /// Looks up a joint's override
    pub fn get(&self, j: JointId) -> Option<&Animation> {
        self.0.get(&j)
    }

    /// Removes every override
    pub fn clear(&mut self) {
        self.0.clear()
    }

    /// Number of installed overrides
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether no override is installed
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over overrides whose path is a suffix of `path`
    pub fn matching<'a>(
        &'a self,
        path: &'a [ObjectId],
    ) -> impl Iterator<Item = &'a Animation> + 'a {
        self.0.values().filter(move |a| {
            !a.path.is_empty() && path.ends_with(&a.path)
        })
    }
}

/// Read-only view of a geometry database
pub trait Database {
    /// Looks up an object by name
    fn lookup(&self, name: &str) -> Option<ObjectId>;

    /// Returns an object's name
    fn name(&self, id: ObjectId) -> Option<&str>;

    /// Returns the placement of `child` within `parent`, or `None` if `child`
    /// is not a member of `parent`
    fn member_matrix(
        &self,
        parent: ObjectId,
        child: ObjectId,
    ) -> Option<Matrix4<f64>>;

    /// Reads the center of a grip or sphere solid
    ///
    /// The point is expressed in the frame of the solid's parent.
    fn read_geometry(&self, id: ObjectId) -> Result<Point3<f64>, Error>;

    /// Units in which definition files are read by default
    fn local_units(&self) -> Scale {
        Scale::default()
    }

    /// Composes the placement matrices along all but the last `depth`
    /// segments of `path`
    ///
    /// The arc into `path[i]` is the product of every matching animation
    /// override with the member matrix of `path[i]` in `path[i - 1]`.
    fn path_to_matrix(
        &self,
        path: &[ObjectId],
        depth: usize,
        anims: &Animations,
    ) -> Result<Matrix4<f64>, Error> {
        if depth > path.len() {
            return Err(Error::ShortPath(path.len(), depth));
        }
        let nodes = &path[..path.len() - depth];
        let mut out = Matrix4::identity();
        for i in 1..nodes.len() {
            let (parent, child) = (nodes[i - 1], nodes[i]);
            let mut arc =
                self.member_matrix(parent, child).ok_or_else(|| {
                    Error::NotAMember {
                        parent: self.name(parent).unwrap_or("?").to_owned(),
                        child: self.name(child).unwrap_or("?").to_owned(),
                    }
                })?;
            for a in anims.matching(&nodes[..=i]) {
                arc = a.matrix * arc;
            }
            out *= arc;
        }
        Ok(out)
    }
}
