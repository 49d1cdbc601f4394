//! Joint and hold records, and the registry that owns them
pub(crate) mod handle;
mod hold;
mod joint;
mod path;
mod registry;

pub use handle::RawHandle;
pub use hold::{
    DEFAULT_PRIORITY, DEFAULT_WEIGHT, Hold, HoldPoint, HoldPointKind,
    JointHandle, JointSelection, JointSet, MAX_PRIORITY, SolidKind,
};
pub use joint::{Dof, DofIndex, Joint, MAX_DOFS};
pub use path::{ArcPath, PathKind};
pub use registry::{HoldId, JointId, Registry};

pub(crate) use path::{find_run, lookup_all};
