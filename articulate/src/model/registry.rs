//! Owned storage for every loaded joint and hold
use crate::{
    Error,
    model::{
        handle::{Arena, define_handle},
        hold::Hold,
        joint::Joint,
    },
};
use std::collections::HashMap;

define_handle!(JointId, "Handle to a [`Joint`] stored in a [`Registry`]");
define_handle!(HoldId, "Handle to a [`Hold`] stored in a [`Registry`]");

/// Ordered collections of joints and holds, with lookup by name
///
/// Records are only removed all at once, by [`Registry::clear`]; handles
/// taken before a clear no longer resolve.
#[derive(Debug, Default)]
pub struct Registry {
    pub(crate) joints: Arena<Joint, JointId>,
    pub(crate) holds: Arena<Hold, HoldId>,
    names: HashMap<String, JointId>,
}

impl Registry {
    /// Builds an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a joint, rejecting duplicate names
    pub fn add_joint(&mut self, j: Joint) -> Result<JointId, Error> {
        if self.names.contains_key(&j.name) {
            return Err(Error::DuplicateJoint(j.name));
        }
        let name = j.name.clone();
        let id = self.joints.insert(j);
        self.names.insert(name, id);
        Ok(id)
    }

    /// Adds a hold
    pub fn add_hold(&mut self, h: Hold) -> HoldId {
        self.holds.insert(h)
    }

    /// Removes every joint and hold
    pub fn clear(&mut self) {
        self.joints.clear();
        self.holds.clear();
        self.names.clear();
    }

    /// Looks up a joint by name
    pub fn joint_by_name(&self, name: &str) -> Option<JointId> {
        self.names.get(name).copied()
    }

    /// Looks up a hold by name (the first match, in load order)
    pub fn hold_by_name(&self, name: &str) -> Option<HoldId> {
        self.holds
            .iter()
            .find(|(_, h)| h.name.as_deref() == Some(name))
            .map(|(id, _)| id)
    }

    /// Borrows a joint
    pub fn joint(&self, id: JointId) -> Result<&Joint, Error> {
        self.joints.get(id).ok_or(Error::BadJoint)
    }

    /// Borrows a joint mutably
    pub fn joint_mut(&mut self, id: JointId) -> Result<&mut Joint, Error> {
        self.joints.get_mut(id).ok_or(Error::BadJoint)
    }

    /// Borrows a hold
    pub fn hold(&self, id: HoldId) -> Result<&Hold, Error> {
        self.holds.get(id).ok_or(Error::BadHold)
    }

    /// Borrows a hold mutably
    pub fn hold_mut(&mut self, id: HoldId) -> Result<&mut Hold, Error> {
        self.holds.get_mut(id).ok_or(Error::BadHold)
    }

    /// Iterates over joints in load order
    pub fn joints(&self) -> impl Iterator<Item = (JointId, &Joint)> {
        self.joints.iter()
    }

    /// Iterates over holds in load order
    pub fn holds(&self) -> impl Iterator<Item = (HoldId, &Hold)> {
        self.holds.iter()
    }

    /// Number of joints
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Number of holds
    pub fn hold_count(&self) -> usize {
        self.holds.len()
    }
}
