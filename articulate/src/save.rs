//! Writes joints and constraints back out in the definition grammar
//!
//! The output declares its units once, as millimeters per unit, and every
//! length is converted into those units.  Reading the output back with
//! [`parse_str`](crate::parse::parse_str) reproduces the same joints and
//! constraints.
use crate::{
    Error,
    model::{
        ArcPath, DEFAULT_PRIORITY, DEFAULT_WEIGHT, Dof, Hold, HoldPoint,
        HoldPointKind, Joint, JointSelection, PathKind, Registry, SolidKind,
    },
    units::Scale,
};
use nalgebra::{Point3, Vector3};
use std::io::Write;

/// Formats a value so that it reads back unchanged
struct Num(f64);

impl std::fmt::Display for Num {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 == f64::MAX {
            write!(f, "INF")
        } else if self.0 == -f64::MAX {
            write!(f, "-INF")
        } else {
            write!(f, "{:.15e}", self.0)
        }
    }
}

fn vector(v: &Vector3<f64>) -> String {
    format!("({}, {}, {})", Num(v.x), Num(v.y), Num(v.z))
}

fn point(p: &Point3<f64>, scale: Scale) -> String {
    vector(&p.coords.map(|v| scale.from_mm_value(v)))
}

/// Writes `arc = ...;` or `path = ...;`, preferring the declared spelling
fn write_path<W: Write>(
    out: &mut W,
    indent: &str,
    p: &ArcPath,
) -> Result<(), Error> {
    let declared = match (&p.declared, p.kind) {
        (Some(d), _) => d,
        (None, PathKind::Path) => &p.segments,
        (None, PathKind::Arc) => {
            writeln!(out, "{indent}arc = {};", p.segments.join("/"))?;
            return Ok(());
        }
    };
    match declared.as_slice() {
        [] => (),
        [only] => writeln!(out, "{indent}path = {only};")?,
        [head @ .., last] => {
            writeln!(out, "{indent}path = {}-{last};", head.join("/"))?
        }
    }
    Ok(())
}

fn write_dof<W: Write>(
    out: &mut W,
    kind: &str,
    d: &Dof,
    convert: impl Fn(f64) -> f64,
) -> Result<(), Error> {
    writeln!(out, "\t{kind} {{")?;
    writeln!(out, "\t\tdirection = {};", vector(&d.direction))?;
    writeln!(
        out,
        "\t\tlimits = {}, {}, {};",
        Num(convert(d.lower)),
        Num(convert(d.upper)),
        Num(convert(d.current))
    )?;
    writeln!(out, "\t}}")?;
    Ok(())
}

/// Writes one joint
pub fn write_joint<W: Write>(
    out: &mut W,
    j: &Joint,
    scale: Scale,
) -> Result<(), Error> {
    writeln!(out, "joint {} {{", j.name)?;
    write_path(out, "\t", &j.path)?;
    writeln!(out, "\tlocation = {};", point(&j.location, scale))?;
    for d in &j.rotations {
        write_dof(out, "rotate", d, |v| v)?;
    }
    for d in &j.translations {
        write_dof(out, "translate", d, |v| scale.from_mm_value(v))?;
    }
    writeln!(out, "}};")?;
    Ok(())
}

fn write_point<W: Write>(
    out: &mut W,
    key: &str,
    p: &HoldPoint,
    scale: Scale,
) -> Result<(), Error> {
    let (kind, path, vertex) = match &p.kind {
        HoldPointKind::Fixed(pt) => {
            writeln!(out, "\t{key} = fixed {};", point(pt, scale))?;
            return Ok(());
        }
        HoldPointKind::Solid {
            path,
            solid: SolidKind::Grip,
            vertex,
        } => ("grip", path, *vertex),
        HoldPointKind::Solid {
            path,
            solid: SolidKind::Sphere,
            vertex,
        } => ("sphere", path, *vertex),
        HoldPointKind::Joint { path } => ("joint", path, None),
    };
    writeln!(out, "\t{key} = {kind} {{")?;
    write_path(out, "\t\t", path)?;
    if let Some(v) = vertex {
        writeln!(out, "\t\tvertex = {v};")?;
    }
    writeln!(out, "\t}};")?;
    Ok(())
}

/// Writes one constraint
pub fn write_hold<W: Write>(
    out: &mut W,
    h: &Hold,
    scale: Scale,
) -> Result<(), Error> {
    match &h.name {
        Some(n) => writeln!(out, "constraint {n} {{")?,
        None => writeln!(out, "constraint {{")?,
    }
    writeln!(out, "\tjoints {{")?;
    if let Some(s) = &h.joints.start {
        writeln!(out, "\t\tstart = {s};")?;
    }
    match &h.joints.selection {
        JointSelection::Names(names) => {
            writeln!(out, "\t\tjoints = {};", names.join(", "))?
        }
        JointSelection::Arc(p) => write_path(out, "\t\t", p)?,
        JointSelection::Effector => (),
    }
    if !h.joints.except.is_empty() {
        writeln!(out, "\t\texcept = {};", h.joints.except.join(", "))?;
    }
    writeln!(out, "\t}}")?;
    write_point(out, "effector", &h.effector, scale)?;
    write_point(out, "point", &h.objective, scale)?;
    if h.weight != DEFAULT_WEIGHT {
        writeln!(out, "\tweight = {};", Num(h.weight))?;
    }
    if h.priority != DEFAULT_PRIORITY {
        writeln!(out, "\tpriority = {};", h.priority)?;
    }
    writeln!(out, "}};")?;
    Ok(())
}

/// Writes a units header, then every joint, then every constraint
pub fn save<W: Write>(
    out: &mut W,
    reg: &Registry,
    scale: Scale,
) -> Result<(), Error> {
    writeln!(out, "# joints and constraints")?;
    writeln!(out, "units {}mm;", scale.mm_per_unit())?;
    for (_, j) in reg.joints() {
        write_joint(out, j, scale)?;
    }
    for (_, h) in reg.holds() {
        write_hold(out, h, scale)?;
    }
    Ok(())
}
