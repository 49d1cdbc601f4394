//! Rhai bindings for building in-memory scenes
//!
//! A scene script declares objects and places them inside each other; the
//! result is a [`MemoryDatabase`] that joints and constraints can be loaded
//! against.
//!
//! ```
//! use articulate::{db::Database, rhai::Engine};
//!
//! let mut engine = Engine::new();
//! let db = engine.run(r#"
//!     units("cm");
//!     combination("base");
//!     combination("arm");
//!     grip("tip", 0, 10, 0);
//!     member("base", "arm", 1.5, 0, 0);
//!     member("arm", "tip");
//! "#)?;
//! assert!(db.lookup("tip").is_some());
//! assert_eq!(db.local_units().mm_per_unit(), 10.0);
//! # Ok::<(), articulate::Error>(())
//! ```
//!
//! Scripts have the following functions available:
//!
//! - `combination(name)` declares a combination
//! - `grip(name, x, y, z)` declares a grip solid centered at a point
//! - `sphere(name, x, y, z, r)` declares a sphere
//! - `member(parent, child)` places `child` inside `parent`
//! - `member(parent, child, dx, dy, dz)` places it with an offset
//! - `units(name)` sets the database's local units
//!
//! Positions are in millimeters.
use std::sync::{Arc, Mutex};

use crate::{
    Error,
    db::MemoryDatabase,
    units::{Scale, Units},
};
use nalgebra::{Matrix4, Point3, Vector3};
use rhai::{Dynamic, EvalAltResult, NativeCallContext};

/// Engine for evaluating scene scripts
pub struct Engine {
    engine: rhai::Engine,
    context: Arc<Mutex<MemoryDatabase>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Constructs a script engine with scene-building functions
    pub fn new() -> Self {
        let mut engine = rhai::Engine::new();
        engine
            .register_fn("combination", combination)
            .register_fn("grip", grip)
            .register_fn("sphere", sphere)
            .register_fn("member", member)
            .register_fn("member", member_offset)
            .register_fn("units", units);

        let context = Arc::new(Mutex::new(MemoryDatabase::new()));
        engine.set_default_tag(Dynamic::from(context.clone()));
        engine.set_max_expr_depths(64, 32);

        Self { engine, context }
    }

    /// Executes a full script, returning the database it built
    pub fn run(&mut self, script: &str) -> Result<MemoryDatabase, Error> {
        *self.context.lock().unwrap() = MemoryDatabase::new();
        self.engine.run(script).map_err(|e| *e)?;

        let mut lock = self.context.lock().unwrap();
        Ok(std::mem::take(&mut *lock))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Functions injected into the Rhai context

type RhaiResult<T> = Result<T, Box<EvalAltResult>>;

fn scene(ctx: &NativeCallContext) -> Arc<Mutex<MemoryDatabase>> {
    ctx.tag().unwrap().clone_cast::<Arc<Mutex<MemoryDatabase>>>()
}

/// Accepts both integer and floating-point arguments
fn num(v: Dynamic, name: &str) -> RhaiResult<f64> {
    if let Some(v) = v.clone().try_cast::<f64>() {
        Ok(v)
    } else if let Some(v) = v.clone().try_cast::<i64>() {
        Ok(v as f64)
    } else {
        Err(format!("invalid type for {name}: {}", v.type_name()).into())
    }
}

fn point(x: Dynamic, y: Dynamic, z: Dynamic) -> RhaiResult<Point3<f64>> {
    Ok(Point3::new(num(x, "x")?, num(y, "y")?, num(z, "z")?))
}

fn combination(ctx: NativeCallContext, name: &str) {
    scene(&ctx).lock().unwrap().combination(name);
}

fn grip(
    ctx: NativeCallContext,
    name: &str,
    x: Dynamic,
    y: Dynamic,
    z: Dynamic,
) -> RhaiResult<()> {
    let p = point(x, y, z)?;
    scene(&ctx).lock().unwrap().grip(name, p);
    Ok(())
}

fn sphere(
    ctx: NativeCallContext,
    name: &str,
    x: Dynamic,
    y: Dynamic,
    z: Dynamic,
    r: Dynamic,
) -> RhaiResult<()> {
    let p = point(x, y, z)?;
    let r = num(r, "radius")?;
    if r < 0.0 {
        return Err(format!("sphere {name} has negative radius {r}").into());
    }
    scene(&ctx).lock().unwrap().sphere(name, p, r);
    Ok(())
}

fn place(
    ctx: &NativeCallContext,
    parent: &str,
    child: &str,
    m: Matrix4<f64>,
) -> RhaiResult<()> {
    scene(ctx)
        .lock()
        .unwrap()
        .add_member(parent, child, m)
        .map_err(|e| e.to_string().into())
}

fn member(ctx: NativeCallContext, parent: &str, child: &str) -> RhaiResult<()> {
    place(&ctx, parent, child, Matrix4::identity())
}

fn member_offset(
    ctx: NativeCallContext,
    parent: &str,
    child: &str,
    dx: Dynamic,
    dy: Dynamic,
    dz: Dynamic,
) -> RhaiResult<()> {
    let d = Vector3::new(num(dx, "dx")?, num(dy, "dy")?, num(dz, "dz")?);
    place(&ctx, parent, child, Matrix4::new_translation(&d))
}

fn units(ctx: NativeCallContext, name: &str) -> RhaiResult<()> {
    let u: Units = name
        .parse()
        .map_err(|_| format!("unknown unit '{name}'"))?;
    scene(&ctx).lock().unwrap().set_local_units(Scale::from(u));
    Ok(())
}
