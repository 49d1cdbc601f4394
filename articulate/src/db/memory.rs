use crate::{
    Error,
    db::{Database, ObjectId},
    units::Scale,
};
use nalgebra::{Matrix4, Point3};
use std::collections::HashMap;

#[derive(Clone, Debug)]
enum Geometry {
    Combination,
    Grip(Point3<f64>),
    Sphere { center: Point3<f64>, radius: f64 },
}

#[derive(Clone, Debug)]
struct Object {
    name: String,
    geometry: Geometry,
    members: Vec<(ObjectId, Matrix4<f64>)>,
}

/// Geometry database held entirely in memory
///
/// Objects are combinations (which have members) or grip / sphere solids
/// (which have a center).  Redefining a name replaces its geometry but keeps
/// its handle and members.
#[derive(Clone, Debug, Default)]
pub struct MemoryDatabase {
    objects: Vec<Object>,
    names: HashMap<String, ObjectId>,
    units: Scale,
}

impl MemoryDatabase {
    /// Builds an empty database, in millimeters
    pub fn new() -> Self {
        Self::default()
    }

    fn define(&mut self, name: &str, geometry: Geometry) -> ObjectId {
        if let Some(id) = self.names.get(name) {
            self.objects[id.index()].geometry = geometry;
            return *id;
        }
        let id = ObjectId::new(self.objects.len());
        self.objects.push(Object {
            name: name.to_owned(),
            geometry,
            members: vec![],
        });
        self.names.insert(name.to_owned(), id);
        id
    }

    /// Defines a combination
    pub fn combination(&mut self, name: &str) -> ObjectId {
        self.define(name, Geometry::Combination)
    }

    /// Defines a grip solid
    pub fn grip(&mut self, name: &str, center: Point3<f64>) -> ObjectId {
        self.define(name, Geometry::Grip(center))
    }

    /// Defines a sphere solid
    pub fn sphere(
        &mut self,
        name: &str,
        center: Point3<f64>,
        radius: f64,
    ) -> ObjectId {
        self.define(name, Geometry::Sphere { center, radius })
    }

    /// Places `child` inside `parent` with the given matrix
    ///
    /// Placing the same child twice replaces its matrix.
    pub fn add_member(
        &mut self,
        parent: &str,
        child: &str,
        m: Matrix4<f64>,
    ) -> Result<(), Error> {
        let p = self
            .lookup(parent)
            .ok_or_else(|| Error::UnknownObject(parent.to_owned()))?;
        let c = self
            .lookup(child)
            .ok_or_else(|| Error::UnknownObject(child.to_owned()))?;
        let members = &mut self.objects[p.index()].members;
        match members.iter_mut().find(|(id, _)| *id == c) {
            Some(slot) => slot.1 = m,
            None => members.push((c, m)),
        }
        Ok(())
    }

    /// Sets the units in which definition files are read by default
    pub fn set_local_units(&mut self, s: Scale) {
        self.units = s;
    }

    /// Returns the radius of a sphere solid
    pub fn radius(&self, id: ObjectId) -> Option<f64> {
        match self.objects.get(id.index())?.geometry {
            Geometry::Sphere { radius, .. } => Some(radius),
            _ => None,
        }
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Checks whether the database holds no objects
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Database for MemoryDatabase {
    fn lookup(&self, name: &str) -> Option<ObjectId> {
        self.names.get(name).copied()
    }

    fn name(&self, id: ObjectId) -> Option<&str> {
        self.objects.get(id.index()).map(|o| o.name.as_str())
    }

    fn member_matrix(
        &self,
        parent: ObjectId,
        child: ObjectId,
    ) -> Option<Matrix4<f64>> {
        self.objects
            .get(parent.index())?
            .members
            .iter()
            .find(|(id, _)| *id == child)
            .map(|(_, m)| *m)
    }

    fn read_geometry(&self, id: ObjectId) -> Result<Point3<f64>, Error> {
        let o = self
            .objects
            .get(id.index())
            .ok_or_else(|| Error::UnknownObject(format!("#{}", id.index())))?;
        match o.geometry {
            Geometry::Grip(p) | Geometry::Sphere { center: p, .. } => Ok(p),
            Geometry::Combination => Err(Error::NoGeometry(o.name.clone())),
        }
    }

    fn local_units(&self) -> Scale {
        self.units
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn redefine_keeps_handle() {
        let mut db = MemoryDatabase::new();
        let a = db.combination("a");
        let g = db.grip("g", Point3::new(1.0, 2.0, 3.0));
        db.add_member("a", "g", Matrix4::identity()).unwrap();
        assert!(db.add_member("a", "missing", Matrix4::identity()).is_err());

        let s = db.sphere("g", Point3::new(4.0, 5.0, 6.0), 2.0);
        assert_eq!(g, s);
        assert_eq!(db.radius(s), Some(2.0));
        assert_eq!(db.read_geometry(g).unwrap(), Point3::new(4.0, 5.0, 6.0));
        assert!(db.member_matrix(a, g).is_some());
        assert!(matches!(db.read_geometry(a), Err(Error::NoGeometry(..))));
        assert_eq!(db.len(), 2);
    }
}
