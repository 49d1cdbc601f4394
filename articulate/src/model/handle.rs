//! Arena storage addressed by generational handles
//!
//! Records are never removed individually; the whole arena is cleared at once.
//! Clearing bumps the generation, so handles from before the clear no longer
//! resolve.

/// Raw handle data: slot index plus arena generation
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct RawHandle {
    index: u32,
    generation: u32,
}

impl RawHandle {
    /// Returns the slot index of this handle
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

macro_rules! define_handle {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(crate::model::handle::RawHandle);
        impl From<crate::model::handle::RawHandle> for $name {
            fn from(v: crate::model::handle::RawHandle) -> Self {
                Self(v)
            }
        }
        impl From<$name> for crate::model::handle::RawHandle {
            fn from(v: $name) -> Self {
                v.0
            }
        }
        impl $name {
            /// Position of the referenced record within its arena
            pub fn index(&self) -> usize {
                self.0.index()
            }
        }
    };
}
pub(crate) use define_handle;

/// Append-only storage with generational handles of type `H`
#[derive(Debug)]
pub struct Arena<T, H> {
    data: Vec<T>,
    generation: u32,
    _phantom: std::marker::PhantomData<H>,
}

impl<T, H> Default for Arena<T, H> {
    fn default() -> Self {
        Self {
            data: vec![],
            generation: 0,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, H> Arena<T, H>
where
    H: Copy + From<RawHandle> + Into<RawHandle>,
{
    /// Stores a new record, returning its handle
    pub fn insert(&mut self, t: T) -> H {
        let index = u32::try_from(self.data.len())
            .expect("arena cannot hold more than u32::MAX records");
        self.data.push(t);
        RawHandle {
            index,
            generation: self.generation,
        }
        .into()
    }

    /// Looks up a record, returning `None` for a stale or foreign handle
    pub fn get(&self, h: H) -> Option<&T> {
        let raw: RawHandle = h.into();
        if raw.generation == self.generation {
            self.data.get(raw.index())
        } else {
            None
        }
    }

    /// Looks up a record mutably
    pub fn get_mut(&mut self, h: H) -> Option<&mut T> {
        let raw: RawHandle = h.into();
        if raw.generation == self.generation {
            self.data.get_mut(raw.index())
        } else {
            None
        }
    }

    /// Removes every record and invalidates all outstanding handles
    pub fn clear(&mut self) {
        self.data.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Iterates over `(handle, record)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> {
        let generation = self.generation;
        self.data.iter().enumerate().map(move |(i, t)| {
            let h = RawHandle {
                index: i as u32,
                generation,
            };
            (h.into(), t)
        })
    }

    /// Iterates over mutable records in insertion order
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.data.iter_mut()
    }

    /// Returns every live handle in insertion order
    pub fn handles(&self) -> Vec<H> {
        self.iter().map(|(h, _)| h).collect()
    }
}

impl<T, H> std::ops::Index<H> for Arena<T, H>
where
    H: Copy + From<RawHandle> + Into<RawHandle> + std::fmt::Debug,
{
    type Output = T;
    fn index(&self, h: H) -> &T {
        self.get(h)
            .unwrap_or_else(|| panic!("stale or invalid handle {h:?}"))
    }
}

impl<T, H> std::ops::IndexMut<H> for Arena<T, H>
where
    H: Copy + From<RawHandle> + Into<RawHandle> + std::fmt::Debug,
{
    fn index_mut(&mut self, h: H) -> &mut T {
        self.get_mut(h)
            .unwrap_or_else(|| panic!("stale or invalid handle {h:?}"))
    }
}
