//! Replay a recorded keypoint stream through a session and print the summary.
//!
//! Engine settings come from `REHAB__*` environment variables, log verbosity
//! from `RUST_LOG`.

use std::env;
use std::process;

use rehab_session::{
    EngineConfig, ExerciseCatalog, ReplayPoseSource, SessionEngine, SessionPipeline, SubjectiveFeedback,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: rehab-replay <snapshots.jsonl> <exercise> <target_reps> [pain 1-10] [difficulty 1-10]";

struct Args {
    snapshots: String,
    exercise: String,
    target_reps: u32,
    pain_level: u8,
    difficulty: u8,
}

fn parse_args() -> Result<Args, String> {
    let mut args = env::args().skip(1);
    let (Some(snapshots), Some(exercise), Some(target)) = (args.next(), args.next(), args.next()) else {
        return Err(USAGE.to_string());
    };
    let target_reps = target
        .parse()
        .map_err(|_| format!("invalid target_reps '{target}'"))?;
    let mut scale = |label: &str| -> Result<u8, String> {
        match args.next() {
            Some(value) => value.parse().map_err(|_| format!("invalid {label} '{value}'")),
            None => Ok(1),
        }
    };
    let pain_level = scale("pain")?;
    let difficulty = scale("difficulty")?;

    Ok(Args {
        snapshots,
        exercise,
        target_reps,
        pain_level,
        difficulty,
    })
}

async fn run(args: Args) -> rehab_core::Result<String> {
    let config = EngineConfig::from_env()?;
    let catalog = ExerciseCatalog::builtin()?;
    let exercise = catalog
        .get(&args.exercise)
        .cloned()
        .ok_or_else(|| rehab_core::Error::InvalidInput(format!("unknown exercise '{}'", args.exercise)))?;
    let source = ReplayPoseSource::from_json_lines_file(&args.snapshots)?;
    let frames = source.remaining();

    let engine = SessionEngine::new(exercise, args.target_reps, config)?;
    let (pipeline, _control) = SessionPipeline::new(engine, 256);
    let (engine, reason) = pipeline.run(source).await;
    tracing::info!(frames, reason = ?reason, "Replay finished");

    let feedback = SubjectiveFeedback::new(args.pain_level, args.difficulty, "");
    let summary = engine.finalize_session(&feedback);
    Ok(serde_json::to_string_pretty(&summary)?)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            process::exit(2);
        }
    };

    match run(args).await {
        Ok(summary) => println!("{summary}"),
        Err(err) => {
            eprintln!("replay failed: {err}");
            process::exit(1);
        }
    }
}
