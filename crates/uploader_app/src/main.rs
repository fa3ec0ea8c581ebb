mod app;
mod config;
mod ui;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;
use uploader_engine::AuthContext;
use uploader_logging::{uploader_error, LogDestination, DEFAULT_LOG_FILE};

use app::{Outcome, UploadArgs};
use config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "video-upload")]
#[command(about = "Upload a lesson video and follow its processing job")]
struct Args {
    /// Video file to upload
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Lesson the video belongs to
    #[arg(long = "lesson", value_name = "ID")]
    lesson_id: u64,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    description: Option<String>,

    /// RON config file (default: ./uploader.ron if present)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Bearer token; overrides UPLOADER_TOKEN
    #[arg(long)]
    token: Option<String>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let env = |key: &str| std::env::var(key).ok();
    let config = AppConfig::load(args.config.as_deref())?.with_env(env);
    init_logging(&config, args.verbose);

    let auth = match config::resolve_token(args.token, env) {
        Some(token) => AuthContext::with_token(token),
        None => AuthContext::signed_out(),
    };
    let upload = UploadArgs {
        file: args.file,
        lesson_id: args.lesson_id,
        title: args.title,
        description: args.description,
    };

    let outcome = app::run(&config, auth, upload).inspect_err(|err| {
        uploader_error!("upload aborted: {:#}", err);
    })?;
    Ok(match outcome {
        Outcome::Completed { job_id, result } => {
            println!("Job {job_id} finished: video {}", result.video_id);
            ExitCode::SUCCESS
        }
        Outcome::Failed(reason) => {
            eprintln!("{reason}");
            ExitCode::FAILURE
        }
        Outcome::SignedOut => {
            eprintln!("Session expired; sign in again and retry.");
            ExitCode::from(2)
        }
        Outcome::Cancelled => ExitCode::from(130),
    })
}

/// Terminal output stays at warnings unless asked, since progress lines share stdout.
fn init_logging(config: &AppConfig, verbose: bool) {
    let (destination, level) = match (config.log_to_file, verbose) {
        (true, true) => (LogDestination::File(DEFAULT_LOG_FILE.into()), LevelFilter::Debug),
        (true, false) => (LogDestination::File(DEFAULT_LOG_FILE.into()), LevelFilter::Info),
        (false, true) => (LogDestination::Terminal, LevelFilter::Debug),
        (false, false) => (LogDestination::Terminal, LevelFilter::Warn),
    };
    uploader_logging::initialize(destination, level);
}
