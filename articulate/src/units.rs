//! Length units used by definition files
//!
//! Everything inside the solver is stored in millimeters; files may declare
//! their own unit with a `units` statement.
use strum::{EnumString, IntoStaticStr};

/// A named length unit
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, EnumString, IntoStaticStr)]
pub enum Units {
    #[strum(serialize = "inches", serialize = "in")]
    Inches,
    #[strum(serialize = "meters", serialize = "m")]
    Meters,
    #[strum(serialize = "feet", serialize = "ft")]
    Feet,
    #[strum(serialize = "cm")]
    Centimeters,
    #[strum(serialize = "mm")]
    Millimeters,
}

impl Units {
    /// Number of millimeters in one of this unit
    pub fn to_mm(self) -> f64 {
        match self {
            Units::Inches => 25.4,
            Units::Meters => 1000.0,
            Units::Feet => 304.8,
            Units::Centimeters => 10.0,
            Units::Millimeters => 1.0,
        }
    }
}

/// Conversion factor between file units and millimeters
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Scale {
    base2mm: f64,
}

impl Default for Scale {
    fn default() -> Self {
        Self { base2mm: 1.0 }
    }
}

impl From<Units> for Scale {
    fn from(u: Units) -> Self {
        Self {
            base2mm: u.to_mm(),
        }
    }
}

impl Scale {
    /// Builds a scale from a (positive) number of millimeters per file unit
    pub fn from_mm(base2mm: f64) -> Option<Self> {
        (base2mm.is_finite() && base2mm > 0.0).then_some(Self { base2mm })
    }

    /// Millimeters per file unit
    pub fn mm_per_unit(&self) -> f64 {
        self.base2mm
    }

    /// Converts a file-unit length into millimeters
    pub fn to_mm(&self, v: f64) -> f64 {
        // INF stays INF in either direction
        if v.abs() == f64::MAX { v } else { v * self.base2mm }
    }

    /// Converts a millimeter length into file units
    pub fn from_mm_value(&self, v: f64) -> f64 {
        if v.abs() == f64::MAX { v } else { v / self.base2mm }
    }
}
