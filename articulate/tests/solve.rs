use approx::assert_relative_eq;
use articulate::{
    Error,
    db::MemoryDatabase,
    session::{LoadOptions, Session},
    solver::{SolveSettings, SolveStatus},
};
use nalgebra::{Matrix4, Point3, Vector3};

/// Two 6 mm links, hinged about Z at the base and at the elbow
fn arm_db() -> MemoryDatabase {
    let mut db = MemoryDatabase::new();
    db.combination("base");
    db.combination("arm1");
    db.combination("arm2");
    db.grip("tip", Point3::new(0.0, 6.0, 0.0));
    db.add_member("base", "arm1", Matrix4::identity()).unwrap();
    let elbow = Matrix4::new_translation(&(Vector3::y() * 6.0));
    db.add_member("arm1", "arm2", elbow).unwrap();
    db.add_member("arm2", "tip", Matrix4::identity()).unwrap();
    db
}

fn arm(goal: [f64; 3]) -> String {
    format!(
        "\
joint J1 {{
    path = base-arm1;
    location = (0, 0, 0);
    rotate {{ direction = (0, 0, 1); limits = -90, 90, 0; }}
}};
joint J2 {{
    path = arm1-arm2;
    location = (0, 6, 0);
    rotate {{ direction = (0, 0, 1); limits = -90, 90, 0; }}
}};
constraint reach {{
    joints {{ }}
    effector = fixed ({}, {}, {});
    point = grip {{ path = base/arm1/arm2-tip; }};
    priority = 10;
}};
",
        goal[0], goal[1], goal[2]
    )
}

fn load(text: &str) -> Session<MemoryDatabase> {
    let mut s = Session::new(arm_db());
    let r = s.load_str("arm.joint", text, LoadOptions::default());
    assert!(!r.has_errors(), "{:?}", r.diagnostics);
    assert!(r.unresolved.is_empty(), "{:?}", r.unresolved);
    s
}

fn assert_in_bounds(s: &Session<MemoryDatabase>) {
    for (_, j) in s.registry().joints() {
        for d in j.rotations.iter().chain(&j.translations) {
            assert!(
                d.lower <= d.current && d.current <= d.upper,
                "{}: {} outside [{}, {}]",
                j.name,
                d.current,
                d.lower,
                d.upper
            );
        }
    }
}

#[test]
fn reachable_goal_converges() {
    let mut s = load(&arm([10.0, 0.0, 0.0]));
    assert_relative_eq!(
        s.evaluate("reach").unwrap(),
        (10.0f64 * 10.0 + 12.0 * 12.0).sqrt(),
        epsilon = 1e-9
    );

    let settings = SolveSettings::default();
    let report = s.solve(settings);
    assert_eq!(report.status, SolveStatus::Converged);
    assert!(report.moves > 0);
    assert!(report.pull < settings.epsilon);
    assert!(s.evaluate("reach").unwrap() < settings.epsilon);
    assert_in_bounds(&s);
}

#[test]
fn each_iteration_improves() {
    let mut s = load(&arm([10.0, 0.0, 0.0]));
    let settings = SolveSettings {
        loops: 1,
        ..SolveSettings::default()
    };
    let mut prev = s.evaluate("reach").unwrap();
    for _ in 0..200 {
        let r = s.solve(settings);
        let now = s.evaluate("reach").unwrap();
        assert!(now <= prev, "pull went from {prev} to {now}");
        if r.moves > 0 {
            assert!(now < prev);
        }
        prev = now;
        if r.status == SolveStatus::Converged {
            return;
        }
    }
    panic!("did not converge (pull {prev})");
}

#[test]
fn unreachable_goal_stops() {
    let mut s = load(&arm([20.0, 0.0, 0.0]));
    let before = s.evaluate("reach").unwrap();
    let report = s.solve(SolveSettings::default());
    assert_eq!(report.status, SolveStatus::StoppedNotConverged);
    let after = s.evaluate("reach").unwrap();
    assert!(after < before);
    // the arm can at best point straight at the goal
    assert!(after >= 8.0 - 1e-6);
    assert_in_bounds(&s);
}

#[test]
fn converged_system_is_left_alone() {
    let mut s = load(&arm([10.0, 0.0, 0.0]));
    assert_eq!(
        s.solve(SolveSettings::default()).status,
        SolveStatus::Converged
    );
    let values: Vec<f64> = s
        .registry()
        .joints()
        .map(|(_, j)| j.rotations[0].current)
        .collect();

    let again = s.solve(SolveSettings::default());
    assert_eq!(again.status, SolveStatus::Converged);
    assert_eq!(again.moves, 0);
    let now: Vec<f64> = s
        .registry()
        .joints()
        .map(|(_, j)| j.rotations[0].current)
        .collect();
    assert_eq!(values, now);
}

/// A slider at x = 3 with one hold at priority 0 and one at priority 1
fn slider(keep: f64, wish: f64) -> Session<MemoryDatabase> {
    let mut db = MemoryDatabase::new();
    db.combination("base");
    db.combination("carriage");
    db.grip("g", Point3::origin());
    db.add_member("base", "carriage", Matrix4::identity()).unwrap();
    db.add_member("carriage", "g", Matrix4::identity()).unwrap();

    let text = format!(
        "\
joint slide {{
    path = base-carriage;
    location = (0, 0, 0);
    translate {{ direction = (1, 0, 0); limits = -10, 10, 3; }}
}};
constraint keep {{
    joints {{ joints = slide; }}
    effector = grip {{ path = base/carriage-g; }};
    point = fixed ({keep}, 0, 0);
    priority = 0;
}};
constraint wish {{
    joints {{ joints = slide; }}
    effector = grip {{ path = base/carriage-g; }};
    point = fixed ({wish}, 0, 0);
    priority = 1;
}};
"
    );
    let mut s = Session::new(db);
    let r = s.load_str("pair.joint", &text, LoadOptions::default());
    assert!(r.diagnostics.is_empty(), "{:?}", r.diagnostics);
    s
}

#[test]
fn important_holds_do_not_regress() {
    let mut s = slider(3.0, -5.0);
    assert!(s.evaluate("keep").unwrap() < 1e-9);

    let settings = SolveSettings::default();
    let report = s.solve(settings);
    assert_ne!(report.status, SolveStatus::Converged);
    assert!(s.evaluate("keep").unwrap() <= 2.0 * settings.epsilon);
    assert!(s.evaluate("wish").unwrap() > 7.0);
    assert_in_bounds(&s);
}

#[test]
fn every_level_within_epsilon() {
    let mut s = slider(3.06, 3.06);
    let settings = SolveSettings::default();
    assert_relative_eq!(s.evaluate("keep").unwrap(), 0.06, epsilon = 1e-9);
    assert_relative_eq!(s.evaluate("wish").unwrap(), 0.06, epsilon = 1e-9);

    let report = s.solve(settings);
    assert_eq!(report.status, SolveStatus::Converged);
    assert_eq!(report.moves, 0);
    assert!(report.pull > settings.epsilon);
    let (_, slide) = s.registry().joints().next().unwrap();
    assert_eq!(slide.translations[0].current, 3.0);
}

#[test]
fn solved_state_survives_save() {
    let mut s = load(&arm([10.0, 0.0, 0.0]));
    s.solve(SolveSettings::default());
    let pull = s.evaluate("reach").unwrap();

    let mut out = vec![];
    s.save(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let mut again = load(&text);
    let now = again.evaluate("reach").unwrap();
    assert_relative_eq!(now, pull, epsilon = 1e-9);
    assert_eq!(again.list(), vec!["J1", "J2"]);
}

#[test]
fn broken_joint_is_skipped() {
    let text = "\
joint A {
    path = base-arm1;
    translate { direction=(1,0,0); limits=-5,5,0; }
}
joint B {
    path = arm1-arm2;
    location = (0, 6, 0);
    rotate { direction = (0, 0, 1); limits = -90, 90, 0; }
}
";
    let mut s = Session::new(arm_db());
    let r = s.load_str("broken.joint", text, LoadOptions::default());
    assert_eq!(r.diagnostics.len(), 1);
    assert!(r.diagnostics[0].is_error());
    assert_eq!(r.diagnostics[0].line, 4);
    assert!(r.diagnostics[0].message.contains("location"));
    assert_eq!(s.list(), vec!["B"]);
    assert!(s.animation_override("B").is_some());
    assert!(matches!(
        s.move_joint("A", &[Some(1.0)]),
        Err(Error::UnknownJoint(..))
    ));
}

#[cfg(feature = "rhai")]
#[test]
fn scripted_scene() {
    let db = articulate::rhai::Engine::new()
        .run(
            r#"
            combination("base");
            combination("arm1");
            combination("arm2");
            grip("tip", 0, 6, 0);
            member("base", "arm1");
            member("arm1", "arm2", 0, 6, 0);
            member("arm2", "tip");
            "#,
        )
        .unwrap();
    let mut s = Session::new(db);
    let text = arm([10.0, 0.0, 0.0]);
    let r = s.load_str("arm.joint", &text, LoadOptions::default());
    assert!(!r.has_errors());
    let report = s.solve(SolveSettings::default());
    assert_eq!(report.status, SolveStatus::Converged);
}
