//! A database paired with the joints and constraints loaded against it
//!
//! [`Session`] is the top-level handle used by the command-line tools: it
//! loads definition files, moves joints by hand, runs the solver, and writes
//! everything back out.
use crate::{
    Error,
    db::{Animations, Database},
    eval, kinematics,
    model::{
        ArcPath, HoldPoint, HoldPointKind, JointId, JointSelection, Registry,
    },
    parse::{self, Diagnostic, Parsed},
    save,
    solver::{SolveReport, SolveSettings, Solver},
};
use log::{debug, info, warn};
use nalgebra::{Matrix4, Point3};
use std::path::{Path, PathBuf};

/// Flags for [`Session::load`]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LoadOptions {
    /// Discard previously loaded joints and constraints first
    pub unload: bool,
    /// Compute every joint's animation once loading is done
    pub apply: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            unload: true,
            apply: true,
        }
    }
}

/// What happened during a load
#[derive(Clone, Debug, Default)]
pub struct LoadReport {
    /// Parser diagnostics from every file, in file order
    pub diagnostics: Vec<Diagnostic>,
    /// Files that could not be read
    pub unreadable: Vec<PathBuf>,
    /// Paths that were truncated because a segment is not in the database
    pub unresolved: Vec<String>,
    /// Number of joints added
    pub joints: usize,
    /// Number of constraints added
    pub holds: usize,
}

impl LoadReport {
    /// Checks whether anything was discarded
    pub fn has_errors(&self) -> bool {
        !self.unreadable.is_empty()
            || self.diagnostics.iter().any(|d| d.is_error())
    }

    /// Fails with [`Error::ParseError`] if any definition was rejected
    ///
    /// Warnings are not errors and pass through.
    pub fn check(&self) -> Result<(), Error> {
        let errs: Vec<Diagnostic> = self
            .diagnostics
            .iter()
            .filter(|d| d.is_error())
            .cloned()
            .collect();
        if errs.is_empty() {
            Ok(())
        } else {
            Err(Error::ParseError(errs))
        }
    }
}

/// Current state of one constraint
#[derive(Clone, Debug, PartialEq)]
pub struct HoldSummary {
    /// Display name
    pub name: String,
    /// Priority level
    pub priority: u32,
    /// Weight
    pub weight: f64,
    /// Weighted distance between the two ends
    pub pull: f64,
    /// World-space effector, if it could be located
    pub effector: Option<Point3<f64>>,
    /// World-space objective, if it could be located
    pub objective: Option<Point3<f64>>,
}

impl std::fmt::Display for HoldSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: priority {}, weight {}, pull {:.6}",
            self.name, self.priority, self.weight, self.pull
        )?;
        let ends = [("effector", self.effector), ("point", self.objective)];
        for (label, p) in ends {
            match p {
                Some(p) => {
                    write!(f, "\n\t{label} ({}, {}, {})", p.x, p.y, p.z)?
                }
                None => write!(f, "\n\t{label} not found")?,
            }
        }
        Ok(())
    }
}

/// Joints, constraints, and animation overrides bound to one database
pub struct Session<D> {
    db: D,
    reg: Registry,
    anims: Animations,
}

impl<D: Database> Session<D> {
    /// Builds an empty session
    pub fn new(db: D) -> Self {
        Self {
            db,
            reg: Registry::new(),
            anims: Animations::new(),
        }
    }

    /// Borrows the database
    pub fn db(&self) -> &D {
        &self.db
    }

    /// Borrows the database mutably
    ///
    /// Every cached lookup is dropped, since the database may change under
    /// it; call [`apply`](Self::apply) afterwards to rebuild animations.
    pub fn db_mut(&mut self) -> &mut D {
        self.invalidate();
        &mut self.db
    }

    /// Borrows the registry
    pub fn registry(&self) -> &Registry {
        &self.reg
    }

    /// Borrows the registry mutably
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.reg
    }

    /// Borrows the current animation overrides
    pub fn animations(&self) -> &Animations {
        &self.anims
    }

    /// Loads definition files in order
    ///
    /// Each file starts out in the database's local units.  Files that
    /// cannot be read are reported and skipped.
    pub fn load<P: AsRef<Path>>(
        &mut self,
        files: &[P],
        opts: LoadOptions,
    ) -> LoadReport {
        if opts.unload {
            self.unload();
        }
        let mut report = LoadReport::default();
        for f in files {
            let f = f.as_ref();
            match parse::parse_file(f, self.db.local_units()) {
                Ok(p) => self.register(p, &mut report),
                Err(e) => {
                    warn!("{}: {e}", f.display());
                    report.unreadable.push(f.to_owned());
                }
            }
        }
        self.finish_load(opts.apply, &report);
        report
    }

    /// Loads definition text; `name` labels its diagnostics
    pub fn load_str(
        &mut self,
        name: &str,
        text: &str,
        opts: LoadOptions,
    ) -> LoadReport {
        if opts.unload {
            self.unload();
        }
        let mut report = LoadReport::default();
        let p = parse::parse_str(name, text, self.db.local_units());
        self.register(p, &mut report);
        self.finish_load(opts.apply, &report);
        report
    }

    fn register(&mut self, p: Parsed, report: &mut LoadReport) {
        report.diagnostics.extend(p.diagnostics);
        for mut j in p.joints {
            if let Some(missing) = j.path.convert(&self.db) {
                let msg =
                    format!("joint {}: object {missing} not found", j.name);
                warn!("{msg}");
                report.unresolved.push(msg);
            }
            match self.reg.add_joint(j) {
                Ok(..) => report.joints += 1,
                Err(e) => warn!("{e}; keeping the first definition"),
            }
        }
        for mut h in p.holds {
            let label = h.label().to_owned();
            for point in [&mut h.effector, &mut h.objective] {
                if let Some(msg) = convert_point(&self.db, point) {
                    let msg = format!("constraint {label}: {msg}");
                    warn!("{msg}");
                    report.unresolved.push(msg);
                }
            }
            if let JointSelection::Arc(p) = &mut h.joints.selection {
                if let Some(missing) = p.convert(&self.db) {
                    let msg = format!(
                        "constraint {label}: \
                         joint set object {missing} not found"
                    );
                    warn!("{msg}");
                    report.unresolved.push(msg);
                }
            }
            self.reg.add_hold(h);
            report.holds += 1;
        }
    }

    fn finish_load(&mut self, apply: bool, report: &LoadReport) {
        self.invalidate();
        if apply {
            self.apply();
        }
        info!(
            "loaded {} joints and {} constraints ({} total)",
            report.joints,
            report.holds,
            self.reg.joint_count()
        );
    }

    /// Drops cached path resolutions, geometry, and solver state
    fn invalidate(&mut self) {
        for j in self.reg.joints.values_mut() {
            j.resolved = None;
        }
        for h in self.reg.holds.values_mut() {
            h.invalidate();
        }
    }

    /// Recomputes the animation of every joint
    ///
    /// Returns the number of joints found in the database.
    pub fn apply(&mut self) -> usize {
        let Registry { joints, .. } = &mut self.reg;
        let anims = &mut self.anims;
        let mut n = 0;
        for id in joints.handles() {
            if kinematics::adjust(&self.db, id, &mut joints[id], anims) {
                n += 1;
            }
        }
        debug!("applied {n} of {} joints", joints.len());
        n
    }

    /// Forgets every joint and constraint, and every animation override
    pub fn unload(&mut self) {
        self.reg.clear();
        self.anims.clear();
    }

    /// Writes every joint and constraint in the database's local units
    pub fn save<W: std::io::Write>(&self, out: &mut W) -> Result<(), Error> {
        save::save(out, &self.reg, self.db.local_units())
    }

    /// Lists joint names in registration order
    pub fn list(&self) -> Vec<&str> {
        self.reg.joints().map(|(_, j)| j.name.as_str()).collect()
    }

    /// Evaluates constraints, by name or (given no names) all of them
    pub fn holds(&mut self, names: &[&str]) -> Result<Vec<HoldSummary>, Error> {
        let ids = if names.is_empty() {
            self.reg.holds().map(|(id, _)| id).collect()
        } else {
            names
                .iter()
                .map(|n| {
                    self.reg
                        .hold_by_name(n)
                        .ok_or_else(|| Error::UnknownHold((*n).to_owned()))
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let pull =
                eval::evaluate(&mut self.reg, &self.db, &self.anims, id)?;
            let (effector, objective) =
                eval::locate_ends(&mut self.reg, &self.db, &self.anims, id)?;
            let h = self.reg.hold(id)?;
            out.push(HoldSummary {
                name: h.label().to_owned(),
                priority: h.priority,
                weight: h.weight,
                pull,
                effector,
                objective,
            });
        }
        Ok(out)
    }

    /// Sets a joint's values by hand
    ///
    /// Values are assigned to the joint's rotations (in degrees), then its
    /// translations (in the database's local units); `None` leaves a value
    /// alone.  Values outside of their limits are reported and skipped.
    /// Returns the number of values that were changed.
    pub fn move_joint(
        &mut self,
        name: &str,
        values: &[Option<f64>],
    ) -> Result<usize, Error> {
        let id = self.joint_id(name)?;
        let units = self.db.local_units();
        let j = self.reg.joint_mut(id)?;
        let dofs: Vec<_> = j.active().collect();
        if values.len() > dofs.len() {
            warn!(
                "joint {name}: {} values given for {} degrees of freedom",
                values.len(),
                dofs.len()
            );
        }
        let mut changed = 0;
        for (i, v) in dofs.into_iter().zip(values) {
            let Some(v) = *v else { continue };
            let v = if i.is_rotation() { v } else { units.to_mm(v) };
            match j.set_value(i, v) {
                Ok(()) => changed += 1,
                Err(e) => warn!("joint {name}: {e}"),
            }
        }
        kinematics::adjust(&self.db, id, j, &mut self.anims);
        Ok(changed)
    }

    fn joint_id(&self, name: &str) -> Result<JointId, Error> {
        self.reg
            .joint_by_name(name)
            .ok_or_else(|| Error::UnknownJoint(name.to_owned()))
    }

    fn joint_ids(&self, names: &[&str]) -> Result<Vec<JointId>, Error> {
        if names.is_empty() {
            Ok(self.reg.joints().map(|(id, _)| id).collect())
        } else {
            names.iter().map(|n| self.joint_id(n)).collect()
        }
    }

    /// Commits current values, by joint name or (given no names) everywhere
    pub fn accept(&mut self, names: &[&str]) -> Result<usize, Error> {
        let ids = self.joint_ids(names)?;
        for &id in &ids {
            self.reg.joint_mut(id)?.accept();
        }
        Ok(ids.len())
    }

    /// Restores committed values, by joint name or (given no names)
    /// everywhere
    pub fn reject(&mut self, names: &[&str]) -> Result<usize, Error> {
        let ids = self.joint_ids(names)?;
        for &id in &ids {
            let j = self.reg.joint_mut(id)?;
            j.reject();
            kinematics::adjust(&self.db, id, j, &mut self.anims);
        }
        Ok(ids.len())
    }

    /// Solves one named constraint alone, returning the number of moves
    pub fn solve_hold(
        &mut self,
        name: &str,
        settings: SolveSettings,
    ) -> Result<usize, Error> {
        Solver::new(&self.db, &mut self.reg, &mut self.anims, settings)
            .solve_named(name)
    }

    /// Solves every constraint by priority
    pub fn solve(&mut self, settings: SolveSettings) -> SolveReport {
        Solver::new(&self.db, &mut self.reg, &mut self.anims, settings).solve()
    }

    /// Returns the animation override of a named joint, if it has one
    pub fn animation_override(&self, name: &str) -> Option<&Matrix4<f64>> {
        let id = self.reg.joint_by_name(name)?;
        self.anims.get(id).map(|a| &a.matrix)
    }

    /// Evaluates one named constraint
    pub fn evaluate(&mut self, name: &str) -> Result<f64, Error> {
        let id = self
            .reg
            .hold_by_name(name)
            .ok_or_else(|| Error::UnknownHold(name.to_owned()))?;
        eval::evaluate(&mut self.reg, &self.db, &self.anims, id)
    }
}

/// Converts a hold point's symbolic path, returning a message on truncation
///
/// A joint point's last segment names a joint rather than an object, so it is
/// set aside during conversion and put back afterwards.
fn convert_point<D: Database>(db: &D, p: &mut HoldPoint) -> Option<String> {
    let is_joint = matches!(p.kind, HoldPointKind::Joint { .. });
    let path: &mut ArcPath = p.path_mut()?;
    let leaf = if is_joint { path.segments.pop() } else { None };
    let missing = path.convert(db);
    if let Some(leaf) = leaf {
        if let Some(d) = &mut path.declared {
            d.push(leaf.clone());
        }
        path.segments.push(leaf);
    }
    missing.map(|m| format!("object {m} not found"))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        db::MemoryDatabase,
        model::PathKind,
        solver::SolveStatus,
        units::{Scale, Units},
    };
    use approx::assert_relative_eq;

    const SLIDER: &str = "\
joint slide {
    path = base-carriage;
    location = (0, 0, 0);
    translate { direction = (1, 0, 0); limits = -10, 10, 0; }
};
constraint reach {
    joints { joints = slide; }
    effector = grip { path = base/carriage-g; };
    point = fixed (3, 0, 0);
};
";

    fn slider_db() -> MemoryDatabase {
        let mut db = MemoryDatabase::new();
        db.combination("base");
        db.combination("carriage");
        db.grip("g", Point3::origin());
        db.add_member("base", "carriage", Matrix4::identity()).unwrap();
        db.add_member("carriage", "g", Matrix4::identity()).unwrap();
        db
    }

    fn slider() -> Session<MemoryDatabase> {
        let mut s = Session::new(slider_db());
        let r = s.load_str("slider", SLIDER, LoadOptions::default());
        assert!(!r.has_errors(), "{r:?}");
        assert_eq!((r.joints, r.holds), (1, 1));
        assert!(r.unresolved.is_empty());
        s
    }

    #[test]
    fn load_and_solve() {
        let mut s = slider();
        assert_eq!(s.list(), vec!["slide"]);
        assert_relative_eq!(s.evaluate("reach").unwrap(), 3.0);

        let report = s.solve(SolveSettings::default());
        assert_eq!(report.status, SolveStatus::Converged);
        assert!(s.evaluate("reach").unwrap() < 0.1);
        let m = s.animation_override("slide").unwrap();
        let p = m.transform_point(&Point3::origin());
        assert_relative_eq!(p.x, 3.0, epsilon = 0.1);

        let summary = s.holds(&[]).unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].name, "reach");
        assert_eq!(summary[0].priority, 50);
        assert!(summary[0].effector.is_some());
    }

    #[test]
    fn move_then_reject() {
        let mut s = slider();
        assert_eq!(s.move_joint("slide", &[Some(4.0)]).unwrap(), 1);
        assert_relative_eq!(s.evaluate("reach").unwrap(), 1.0);

        // out of range, so left alone
        assert_eq!(s.move_joint("slide", &[Some(40.0)]).unwrap(), 0);
        assert_eq!(s.move_joint("slide", &[None, Some(1.0)]).unwrap(), 0);
        assert_relative_eq!(s.evaluate("reach").unwrap(), 1.0);

        s.reject(&[]).unwrap();
        assert_relative_eq!(s.evaluate("reach").unwrap(), 3.0);

        s.move_joint("slide", &[Some(2.0)]).unwrap();
        s.accept(&["slide"]).unwrap();
        s.move_joint("slide", &[Some(-2.0)]).unwrap();
        s.reject(&["slide"]).unwrap();
        assert_relative_eq!(s.evaluate("reach").unwrap(), 1.0);

        assert!(matches!(
            s.move_joint("nope", &[Some(1.0)]),
            Err(Error::UnknownJoint(..))
        ));
        assert!(matches!(s.accept(&["nope"]), Err(Error::UnknownJoint(..))));
        assert!(matches!(s.holds(&["nope"]), Err(Error::UnknownHold(..))));
    }

    #[test]
    fn moves_use_local_units() {
        let mut db = slider_db();
        db.set_local_units(Scale::from(Units::Centimeters));
        let mut s = Session::new(db);
        s.load_str("slider", SLIDER, LoadOptions::default());
        // limits were read as centimeters
        assert_eq!(s.move_joint("slide", &[Some(5.0)]).unwrap(), 1);
        let j = s.registry().joints().next().unwrap().1;
        assert_relative_eq!(j.translations[0].current, 50.0);
    }

    #[test]
    fn unresolved_paths_are_truncated() {
        let text = "\
joint a {
    path = base-missing-x; location = (0,0,0);
    rotate { direction = (0,0,1); limits = -5, 5, 0; }
};
constraint c {
    joints { }
    effector = joint { path = base-carriage-a; };
    point = sphere { path = base-nowhere; };
};
";
        let mut s = Session::new(slider_db());
        let r = s.load_str("t", text, LoadOptions::default());
        assert_eq!(r.unresolved.len(), 2, "{:?}", r.unresolved);
        assert_eq!(r.unresolved[0], "joint a: object missing not found");

        let j = s.registry().joints().next().unwrap().1;
        assert_eq!(j.path.kind, PathKind::Arc);
        assert_eq!(j.path.segments, vec!["base"]);
        assert_eq!(j.path.declared.as_ref().unwrap().len(), 3);

        let h = s.registry().holds().next().unwrap().1;
        let p = h.effector.path().unwrap();
        assert_eq!(p.segments, vec!["base", "carriage", "a"]);
        let declared: Vec<String> =
            ["base", "carriage", "a"].map(String::from).to_vec();
        assert_eq!(p.declared.as_deref(), Some(&declared[..]));

        // a truncated objective can't be located, so the hold is satisfied
        assert_eq!(s.evaluate("c").unwrap(), 0.0);
    }

    #[test]
    fn save_keeps_declared_paths() {
        let s = slider();
        let mut out = vec![];
        s.save(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("# joints and constraints\nunits 1mm;\n"));
        assert!(text.contains("path = base-carriage;"), "{text}");
        assert!(text.contains("path = base/carriage-g;"), "{text}");

        let mut again = Session::new(slider_db());
        let r = again.load_str("saved", &text, LoadOptions::default());
        assert!(r.diagnostics.is_empty(), "{:?}", r.diagnostics);
        assert_eq!((r.joints, r.holds), (1, 1));
    }

    #[test]
    fn load_options() {
        let mut s = slider();
        let r = s.load_str(
            "more",
            "joint other { arc = base/carriage; location = (1, 0, 0); \
             rotate { direction = (0, 0, 1); limits = -1, 1, 0; } };\n\
             joint slide { arc = base/carriage; location = (0, 0, 0); \
             rotate { direction = (0, 0, 1); limits = -1, 1, 0; } };",
            LoadOptions {
                unload: false,
                apply: false,
            },
        );
        assert_eq!(r.joints, 1);
        assert_eq!(s.list(), vec!["slide", "other"]);
        // the duplicate was dropped and the original kept its translation
        let j = s.registry().joints().next().unwrap().1;
        assert_eq!(j.translations.len(), 1);
        assert!(s.animation_override("other").is_none());
        assert_eq!(s.apply(), 2);
        assert!(s.animation_override("other").is_some());

        s.load_str("empty", "", LoadOptions::default());
        assert!(s.list().is_empty());
        assert!(s.animations().is_empty());
    }

    #[test]
    fn rejected_blocks_fail_check() {
        let mut s = Session::new(slider_db());
        let text = format!(
            "{SLIDER}joint broken {{ path = base-carriage; \
             rotate {{ direction = (0, 0, 1); limits = -1, 1, 0; }} }};"
        );
        let r = s.load_str("broken", &text, LoadOptions::default());
        assert_eq!((r.joints, r.holds), (1, 1));
        match r.check() {
            Err(Error::ParseError(errs)) => {
                assert_eq!(errs.len(), 1);
                assert!(errs[0].is_error());
                assert_eq!(errs[0].line, 11);
            }
            other => panic!("expected a parse error, got {other:?}"),
        }

        let mut ok = Session::new(slider_db());
        let r = ok.load_str("slider", SLIDER, LoadOptions::default());
        assert!(r.check().is_ok());
    }

    #[test]
    fn unreadable_files_are_skipped() {
        let mut s = Session::new(slider_db());
        let r = s.load(
            &["/nonexistent/definitely/missing.joint"],
            LoadOptions::default(),
        );
        assert_eq!(r.unreadable.len(), 1);
        assert!(r.has_errors());
        assert_eq!(r.joints, 0);
    }

    #[test]
    fn solve_named() {
        let mut s = slider();
        let moves = s.solve_hold("reach", SolveSettings::default()).unwrap();
        assert!(moves > 0);
        assert!(s.evaluate("reach").unwrap() < 0.1);
        assert!(matches!(
            s.solve_hold("nope", SolveSettings::default()),
            Err(Error::UnknownHold(..))
        ));
    }
}
