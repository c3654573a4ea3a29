use log::*;
use ptv::{CorrespondenceSummary, FrameIndex, Session, TrajectorySummary};
use serde::Serialize;
use std::error::Error as _;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use structopt::StructOpt;
use thiserror::Error;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "ptv",
    about = "A tool to detect, match and track particles of a multi-camera experiment"
)]
struct Opt {
    /// The experiment directory.
    ///
    /// It must contain `parameters.json` and `calibration.json`.
    #[structopt(parse(from_os_str))]
    experiment: PathBuf,
    /// The output path to write the JSON results to.
    ///
    /// If this is not provided, then the output goes to stdout.
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,
    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Detect the particle images of every camera at one frame.
    Detect {
        /// The frame to process, defaults to the first frame of the sequence.
        #[structopt(short, long)]
        frame: Option<FrameIndex>,
    },
    /// Detect and triangulate the particles at one frame.
    Correspond {
        /// The frame to process, defaults to the first frame of the sequence.
        #[structopt(short, long)]
        frame: Option<FrameIndex>,
    },
    /// Track the particles over the whole frame range of the experiment.
    Track,
}

#[derive(Serialize)]
struct FrameTargets {
    frame: FrameIndex,
    cameras: Vec<Vec<(f64, f64)>>,
}

#[derive(Serialize)]
struct FramePoints {
    frame: FrameIndex,
    points: Vec<CorrespondenceSummary>,
}

#[derive(Serialize)]
struct Trajectories {
    trajectories: Vec<TrajectorySummary>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Ptv(#[from] ptv::Error),
    #[error("failed to write output")]
    Output(#[source] std::io::Error),
    #[error("failed to serialize output")]
    Json(#[source] serde_json::Error),
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();
    if let Err(e) = run(opt) {
        error!("{}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            error!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<(), CliError> {
    let mut session = Session::new();
    let cameras = session.initialize(&opt.experiment)?;
    info!("loaded {} cameras from {}", cameras, opt.experiment.display());

    match opt.command {
        Command::Detect { frame } => {
            if let Some(frame) = frame {
                session.set_frame(frame)?;
            }
            let cameras = session.detect_particles()?;
            let frame = session.frame()?;
            write_output(opt.output, &FrameTargets { frame, cameras })
        }
        Command::Correspond { frame } => {
            if let Some(frame) = frame {
                session.set_frame(frame)?;
            }
            session.detect_particles()?;
            let points = session.find_correspondences()?;
            let frame = session.frame()?;
            write_output(opt.output, &FramePoints { frame, points })
        }
        Command::Track => {
            session.process_sequence(&AtomicBool::new(false))?;
            let trajectories = session.get_trajectories()?;
            info!("found {} trajectories", trajectories.len());
            write_output(opt.output, &Trajectories { trajectories })
        }
    }
}

fn write_output(path: Option<PathBuf>, value: &impl Serialize) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(CliError::Json)?;
    if let Some(path) = path {
        std::fs::write(path, json).map_err(CliError::Output)
    } else {
        let stdout = std::io::stdout();
        let mut stdout = stdout.lock();
        writeln!(stdout, "{}", json).map_err(CliError::Output)
    }
}
