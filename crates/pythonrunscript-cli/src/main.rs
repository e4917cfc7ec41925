mod commands;

use clap::Parser;
use commands::{EXIT_FAILURE, EXIT_SUCCESS};
use pythonrunscript_core::{Engine, Settings};
use pythonrunscript_runtime::{select_runner, Verbosity};
use pythonrunscript_store::default_cache_root;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(
    name = "pythonrunscript",
    version,
    about = "Run a Python script in a cached environment built from the dependencies declared in its comments",
    after_help = "Dependencies are declared in comment blocks at the top of the script:\n\n  \
                  # ```requirements.txt\n  # requests==2.26.0\n  # ```\n\n\
                  Blocks may also be written as `# /// pythonrunscript-requirements-txt` \
                  or as an inline `# /// script` TOML block."
)]
struct Cli {
    /// Report the dependency blocks, backend, and install plan without running anything.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Stream installer output and enable debug logging.
    #[arg(short, long, default_value_t = false, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress installer output, including errors.
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// Output --dry-run and --show-cache results as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Print the cache and trash locations and list cached environments.
    #[arg(long, default_value_t = false, conflicts_with_all = ["clean_cache", "command"])]
    show_cache: bool,

    /// Move the whole cache to the trash directory.
    #[arg(long, default_value_t = false, conflicts_with = "command")]
    clean_cache: bool,

    /// Cache directory for script environments.
    #[arg(long, env = "PYTHONRUNSCRIPT_CACHE_DIR", value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Base interpreter for venvs and dependency-free scripts.
    #[arg(long, env = "PYTHONRUNSCRIPT_PYTHON", default_value = "python3", value_name = "EXE")]
    python: String,

    #[arg(long, env = "PYTHONRUNSCRIPT_CONDA", default_value = "conda", hide = true)]
    conda: String,

    #[arg(long, env = "PYTHONRUNSCRIPT_RUNNER", default_value = "system", hide = true)]
    runner: String,

    /// The script to run, followed by the arguments passed to it.
    #[arg(value_name = "SCRIPT", trailing_var_arg = true, num_args = 0..)]
    command: Vec<String>,
}

impl Cli {
    fn verbosity(&self) -> Verbosity {
        if self.verbose {
            Verbosity::Verbose
        } else if self.quiet {
            Verbosity::Silent
        } else {
            Verbosity::Errors
        }
    }
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(if e.use_stderr() {
                EXIT_FAILURE
            } else {
                EXIT_SUCCESS
            });
        }
    };

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("PYTHONRUNSCRIPT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let result = dispatch(&cli);
    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn dispatch(cli: &Cli) -> Result<u8, String> {
    let cache_root = match &cli.cache_dir {
        Some(dir) => dir.clone(),
        None => default_cache_root()
            .ok_or("cannot determine a cache directory; pass --cache-dir")?,
    };
    let settings = Settings::new(cache_root)
        .with_python(cli.python.as_str())
        .with_conda(cli.conda.as_str());
    debug!(
        "cache {}, python {}, conda {}, runner {}",
        settings.cache_root.display(),
        settings.python,
        settings.conda,
        cli.runner
    );
    let runner = select_runner(&cli.runner).map_err(|e| e.to_string())?;
    let engine = Engine::with_runner(settings, runner);
    let verbosity = cli.verbosity();

    if cli.show_cache {
        return commands::show_cache::run(&engine, cli.json);
    }
    if cli.clean_cache {
        return commands::clean_cache::run(&engine);
    }

    let Some((script, args)) = cli.command.split_first() else {
        return Err("no script given (see --help)".to_owned());
    };
    let script = PathBuf::from(script);

    if cli.dry_run {
        commands::dry_run::run(&engine, &script, verbosity, cli.json)
    } else {
        commands::run::run(&engine, &script, args, verbosity)
    }
}
