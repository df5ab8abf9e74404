use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use colored::*;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use stylegan_panel::config::{default_path_file, load_generator_path};
use stylegan_panel::frames::{clear_frames, frame_file_name};
use stylegan_panel::{
    build_args, GeneratorPaths, ModelId, RunConfig, RunController, RunFlag, RunUpdate, Settings,
};
use tokio::runtime::Handle;

fn run_config_args() -> Vec<Arg> {
    vec![
        Arg::new("seed")
            .long("seed")
            .value_name("INT")
            .help("Seed of the first latent")
            .value_parser(clap::value_parser!(i64)),
        Arg::new("seed2")
            .long("seed2")
            .value_name("INT")
            .help("Seed of the second latent (used by --smooth-z)")
            .value_parser(clap::value_parser!(i64)),
        Arg::new("num")
            .short('n')
            .long("num")
            .value_name("COUNT")
            .help("Number of frames to generate")
            .value_parser(clap::value_parser!(u32)),
        Arg::new("start-index")
            .long("start-index")
            .value_name("INDEX")
            .help("Index of the first output file")
            .value_parser(clap::value_parser!(u32)),
        Arg::new("random-seed")
            .long("random-seed")
            .help("Use a time-based random seed for every frame")
            .action(ArgAction::SetTrue),
        Arg::new("smooth-z")
            .long("smooth-z")
            .help("Interpolate between the two seeds' latents")
            .action(ArgAction::SetTrue),
        Arg::new("smooth-psi")
            .long("smooth-psi")
            .help("Sweep the truncation value across the sequence")
            .action(ArgAction::SetTrue),
        Arg::new("model")
            .short('m')
            .long("model")
            .value_name("MODEL")
            .help("Model weights to use")
            .value_parser(["ffhq", "celebahq", "anime1", "anime2", "anime-portraits"]),
        Arg::new("psi")
            .long("psi")
            .value_name("FLOAT")
            .help("Truncation psi passed to the generator")
            .value_parser(clap::value_parser!(f32)),
        Arg::new("layers")
            .long("layers")
            .value_name("INT")
            .help("Number of synthesis layers to evaluate")
            .value_parser(clap::value_parser!(u32)),
        Arg::new("seed1to-n")
            .long("seed1to-n")
            .help("Use seeds 1..N, one per frame")
            .action(ArgAction::SetTrue),
    ]
}

fn mode_group() -> ArgGroup {
    ArgGroup::new("mode")
        .args(["random-seed", "smooth-z", "smooth-psi"])
        .multiple(false)
}

fn cli() -> Command {
    Command::new("stylegan-panel")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Drive the StyleGAN generator and assemble its frames into an animation")
        .subcommand_required(true)
        .arg(
            Arg::new("path-file")
                .long("path-file")
                .value_name("FILE")
                .global(true)
                .help("File whose first line is the generator installation directory"),
        )
        .arg(
            Arg::new("generator-dir")
                .long("generator-dir")
                .value_name("DIR")
                .global(true)
                .help("Generator installation directory (overrides the path file)"),
        )
        .subcommand(
            Command::new("run")
                .about("Launch the generator and follow its output")
                .args(run_config_args())
                .group(mode_group())
                .arg(
                    Arg::new("gif")
                        .long("gif")
                        .value_name("FILE")
                        .help("Assemble an animation once every frame has arrived"),
                ),
        )
        .subcommand(
            Command::new("args")
                .about("Print the generator command line without running it")
                .args(run_config_args())
                .group(mode_group()),
        )
        .subcommand(
            Command::new("assemble")
                .about("Build an animation from the frames in the working directory")
                .arg(
                    Arg::new("count")
                        .short('n')
                        .long("count")
                        .value_name("COUNT")
                        .help("Number of frame indices to consider (default: last run's count)")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Output file (default: animation.gif in the working directory)"),
                )
                .arg(
                    Arg::new("delay-ms")
                        .long("delay-ms")
                        .value_name("MS")
                        .help("Delay between frames")
                        .value_parser(clap::value_parser!(u32)),
                ),
        )
        .subcommand(Command::new("clean").about("Delete numbered frames from the working directory"))
}

fn config_from_matches(matches: &ArgMatches, base: &RunConfig) -> RunConfig {
    let mut config = base.clone();
    if let Some(seed) = matches.get_one::<i64>("seed") {
        config.seed_start = *seed;
    }
    if let Some(seed2) = matches.get_one::<i64>("seed2") {
        config.seed_end = *seed2;
    }
    if let Some(num) = matches.get_one::<u32>("num") {
        config.count = *num;
    }
    if let Some(start) = matches.get_one::<u32>("start-index") {
        config.start_index = *start;
    }
    if let Some(model) = matches.get_one::<String>("model") {
        config.model = model.parse().unwrap_or(ModelId::Ffhq);
    }
    config.psi = matches.get_one::<f32>("psi").copied().or(config.psi);
    config.layers = matches.get_one::<u32>("layers").copied().or(config.layers);
    config.sequential_seeds = matches.get_flag("seed1to-n") || config.sequential_seeds;

    config.random_seed = false;
    config.smooth_z = false;
    config.smooth_psi = false;
    for (name, flag) in [
        ("random-seed", RunFlag::RandomSeed),
        ("smooth-z", RunFlag::SmoothZ),
        ("smooth-psi", RunFlag::SmoothPsi),
    ] {
        if matches.get_flag(name) {
            config.set_flag(flag, true);
        }
    }
    config
}

fn resolve_paths(matches: &ArgMatches, settings: &Settings) -> GeneratorPaths {
    if let Some(dir) = matches.get_one::<String>("generator-dir") {
        return GeneratorPaths::new(dir, settings.executable_stem.clone());
    }

    let path_file = matches
        .get_one::<String>("path-file")
        .map(PathBuf::from)
        .unwrap_or_else(default_path_file);
    match load_generator_path(&path_file) {
        Ok(dir) => GeneratorPaths::new(dir, settings.executable_stem.clone()),
        Err(e) => {
            eprintln!("{}: {}", "Warning".yellow(), e);
            GeneratorPaths::new(PathBuf::new(), settings.executable_stem.clone())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let matches = cli().get_matches();
    let settings = Settings::load();
    let paths = resolve_paths(&matches, &settings);

    match matches.subcommand() {
        Some(("run", sub)) => {
            let config = config_from_matches(sub, &settings.last_run);
            let gif = sub.get_one::<String>("gif").map(PathBuf::from);
            run_generator(paths, settings, config, gif).await
        }
        Some(("args", sub)) => {
            let config = config_from_matches(sub, &settings.last_run);
            let built = build_args(&config, &paths);
            if let Some(warning) = built.warning {
                println!("{}: {}", "Warning".yellow(), warning);
            }
            println!("{}", built.command_line(&paths.executable()));
            Ok(())
        }
        Some(("assemble", sub)) => {
            let count = sub
                .get_one::<u32>("count")
                .copied()
                .unwrap_or(settings.last_run.count);
            let output = sub
                .get_one::<String>("output")
                .map(PathBuf::from)
                .unwrap_or_else(|| paths.working_dir().join(&settings.animation_file));
            let mut settings = settings;
            if let Some(delay) = sub.get_one::<u32>("delay-ms") {
                settings.frame_delay_ms = *delay;
            }
            let controller = RunController::new(Handle::current(), paths, settings, None);
            assemble(&controller, count, &output)
        }
        Some(("clean", _)) => {
            let dir = paths.working_dir();
            let removed = clear_frames(&dir, settings.cleanup_scan_limit)?;
            println!("{} {} frames from {}", "Removed".green(), removed, dir.display());
            Ok(())
        }
        _ => Ok(()),
    }
}

async fn run_generator(
    paths: GeneratorPaths,
    settings: Settings,
    config: RunConfig,
    gif: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let mut controller = RunController::new(Handle::current(), paths, settings, None);
    let start_time = Instant::now();

    let outcome = controller.start_run(&config)?;
    if let Some(warning) = outcome.built.warning {
        println!("{}: {}", "Warning".yellow(), warning);
    }
    println!(
        "{} {}",
        "Launched".bold().cyan(),
        outcome.built.command_line(&controller.paths().executable())
    );
    println!(
        "{} {} frames in {}",
        "Waiting for".blue(),
        outcome.built.count,
        controller.working_dir().display()
    );

    'follow: loop {
        let updates = tokio::select! {
            updates = controller.next_updates() => updates,
            _ = tokio::signal::ctrl_c() => {
                controller.cancel_polling();
                println!("\n{}", "Stopped watching for frames".yellow());
                break 'follow;
            }
        };

        for update in updates {
            match update {
                RunUpdate::FrameShown(index) => {
                    print!("\r{} {}", "Received".green(), frame_file_name(index));
                }
                RunUpdate::Progress { index, total } => {
                    print!(" ({}/{})", index, total);
                    std::io::stdout().flush()?;
                }
                RunUpdate::ProcessExited { code } => {
                    let status = code.map_or("signal".to_string(), |c| c.to_string());
                    println!("\n{} (exit status {})", "Generator finished".bold().green(), status);
                }
                RunUpdate::Completed => break 'follow,
                RunUpdate::Refresh | RunUpdate::AssemblyDone(_) | RunUpdate::AssemblyFailed(_) => {}
            }
        }
    }

    println!("{}: {:.2?}", "Run time".blue(), start_time.elapsed());

    if let Some(output) = gif {
        let total = controller.snapshot().total_expected;
        assemble(&controller, total, &output)?;
    }
    Ok(())
}

fn assemble(
    controller: &RunController,
    count: u32,
    output: &std::path::Path,
) -> Result<(), Box<dyn Error>> {
    let report = controller.assemble(count, output)?;
    if !report.skipped.is_empty() {
        println!(
            "{}: skipped unreadable frames {:?}",
            "Warning".yellow(),
            report.skipped
        );
    }
    println!(
        "{} {} ({} frames)",
        "Animation written".bold().green(),
        report.path.display(),
        report.frames.len()
    );
    Ok(())
}
