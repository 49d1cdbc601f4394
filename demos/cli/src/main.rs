use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{info, warn};

use articulate::{
    db::MemoryDatabase,
    rhai::Engine,
    session::{LoadOptions, Session},
    solver::SolveSettings,
};

/// Loads joints and constraints against a scripted scene, then acts on them
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    cmd: Command,

    /// Rhai script that builds the scene
    #[clap(short, long)]
    scene: PathBuf,

    /// Joint definition files, loaded in order
    #[clap(short, long, required = true)]
    input: Vec<PathBuf>,

    /// Skip computing joint animations after loading
    #[clap(long)]
    no_apply: bool,

    /// Stop if any definition file has errors
    #[clap(long)]
    strict: bool,

    /// Write joints and constraints here once the command is done
    #[clap(short, long)]
    out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Lists joint names
    List,

    /// Prints constraints (all of them, if none are named)
    Holds { names: Vec<String> },

    /// Sets a joint's values: rotations first (degrees), then translations
    ///
    /// A `-` leaves the corresponding value alone.
    Move {
        joint: String,
        #[clap(allow_hyphen_values = true)]
        values: Vec<String>,
    },

    /// Solves one constraint, or every constraint by priority
    Solve {
        #[clap(flatten)]
        settings: SolveArgs,

        /// Name of a single constraint to solve
        hold: Option<String>,

        /// Discard the solution instead of keeping it
        #[clap(long)]
        reject: bool,
    },

    /// Writes joints and constraints to standard output
    Save,
}

#[derive(Parser)]
struct SolveArgs {
    /// Maximum number of iterations
    #[clap(short, long, default_value_t = SolveSettings::default().loops)]
    loops: usize,

    /// Initial search half-width
    #[clap(short, long, default_value_t = SolveSettings::default().delta)]
    delta: f64,

    /// Convergence tolerance
    #[clap(short, long, default_value_t = SolveSettings::default().epsilon)]
    epsilon: f64,
}

impl From<SolveArgs> for SolveSettings {
    fn from(a: SolveArgs) -> Self {
        Self {
            loops: a.loops,
            delta: a.delta,
            epsilon: a.epsilon,
        }
    }
}

fn parse_values(values: &[String]) -> Result<Vec<Option<f64>>> {
    values
        .iter()
        .map(|v| match v.as_str() {
            "-" => Ok(None),
            s => s
                .parse()
                .map(Some)
                .with_context(|| format!("invalid value '{s}'")),
        })
        .collect()
}

fn print_holds(
    s: &mut Session<MemoryDatabase>,
    names: &[String],
) -> Result<()> {
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    for h in s.holds(&names)? {
        println!("{h}");
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .init();

    let args = Args::parse();

    let now = Instant::now();
    let script = std::fs::read_to_string(&args.scene)
        .with_context(|| format!("reading {}", args.scene.display()))?;
    let db = Engine::new().run(&script)?;
    info!("Built scene in {:?}", now.elapsed());

    let now = Instant::now();
    let mut session = Session::new(db);
    let report = session.load(
        &args.input,
        LoadOptions {
            unload: true,
            apply: !args.no_apply,
        },
    );
    for d in &report.diagnostics {
        eprintln!("{d}");
    }
    for f in &report.unreadable {
        warn!("could not read {}", f.display());
    }
    if args.strict {
        report.check()?;
    }
    info!(
        "Loaded {} joints and {} constraints in {:?}",
        report.joints,
        report.holds,
        now.elapsed()
    );

    match args.cmd {
        Command::List => {
            for name in session.list() {
                println!("{name}");
            }
        }
        Command::Holds { names } => print_holds(&mut session, &names)?,
        Command::Move { joint, values } => {
            let values = parse_values(&values)?;
            if values.is_empty() {
                bail!("no values given for joint {joint}");
            }
            let n = session.move_joint(&joint, &values)?;
            info!("Set {n} of {} values on {joint}", values.len());
            print_holds(&mut session, &[])?;
        }
        Command::Solve {
            settings,
            hold,
            reject,
        } => {
            let settings = SolveSettings::from(settings);
            let start = Instant::now();
            match hold {
                Some(h) => {
                    let n = session.solve_hold(&h, settings)?;
                    info!("Solved {h} with {n} moves in {:?}", start.elapsed());
                }
                None => {
                    let r = session.solve(settings);
                    info!(
                        "System {} after {} iterations and {} moves \
                         (pull {}) in {:?}",
                        r.status,
                        r.iterations,
                        r.moves,
                        r.pull,
                        start.elapsed()
                    );
                }
            }
            print_holds(&mut session, &[])?;
            if reject {
                session.reject(&[])?;
            } else {
                session.accept(&[])?;
            }
        }
        Command::Save => {
            let mut out = std::io::stdout().lock();
            session.save(&mut out)?;
            out.flush()?;
        }
    }

    if let Some(path) = args.out {
        let mut f = std::fs::File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        session.save(&mut f)?;
        info!("Saved to {}", path.display());
    }
    Ok(())
}
