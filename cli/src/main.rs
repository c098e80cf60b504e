use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use command_runtime_cache::{CacheError, ManifestCache, RuntimeConfig, load_manifest};
use command_runtime_core::CliError;
use command_runtime_dispatch::Dispatcher;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod plugin;

use plugin::ManifestPlugin;

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "cmdrt")]
#[command(about = "Inspect plugin manifests and dry-run command input")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the winning command for every id.
    Commands(CommandsArgs),
    /// Resolve a typed id to its command descriptor.
    Resolve(ResolveArgs),
    /// List commands matching a partial id and every given flag.
    Matches(MatchesArgs),
    /// Parse and validate argv for a command without running it.
    Parse(ParseArgs),
    /// Verify one or more manifest files.
    ValidateManifest(ValidateManifestArgs),
    /// Bundle a directory of manifests into one file.
    Bundle(BundleArgs),
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Manifest directory or bundle file; repeat to add fallbacks.
    #[arg(long = "manifests", required = true)]
    manifests: Vec<PathBuf>,
    /// Runtime config (YAML or JSON).
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "json")]
    format: OutputFormat,
}

#[derive(Debug, Args)]
struct CommandsArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Include hidden commands.
    #[arg(long)]
    hidden: bool,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Fail with command-not-found instead of printing null.
    #[arg(long)]
    must: bool,
    id: String,
}

#[derive(Debug, Args)]
struct MatchesArgs {
    #[command(flatten)]
    source: SourceArgs,
    id: String,
    /// Flag names, aliases or chars the command must declare.
    flags: Vec<String>,
}

#[derive(Debug, Args)]
struct ParseArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Never read piped stdin into a missing arg.
    #[arg(long)]
    no_stdin: bool,
    id: String,
    /// Arguments for the command; put them after `--`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    argv: Vec<String>,
}

#[derive(Debug, Args)]
struct ValidateManifestArgs {
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct BundleArgs {
    /// Directory of per-plugin manifest files.
    input: PathBuf,
    /// Output bundle path.
    #[arg(long)]
    output: PathBuf,
}

/// Error message plus the process exit code it maps to.
#[derive(Debug)]
struct Failure {
    message: String,
    exit: i32,
}

impl From<CliError> for Failure {
    fn from(err: CliError) -> Self {
        Self {
            message: err.message,
            exit: err.exit,
        }
    }
}

impl From<CacheError> for Failure {
    fn from(err: CacheError) -> Self {
        Self {
            message: err.to_string(),
            exit: 1,
        }
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Self { message, exit: 1 }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CMDRT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Commands(args) => run_commands(args),
        Command::Resolve(args) => run_resolve(args),
        Command::Matches(args) => run_matches(args),
        Command::Parse(args) => run_parse(args).await,
        Command::ValidateManifest(args) => run_validate_manifest(args),
        Command::Bundle(args) => run_bundle(args),
    };

    if let Err(failure) = result {
        eprintln!("error: {}", failure.message);
        std::process::exit(failure.exit);
    }
}

fn load_dispatcher(source: &SourceArgs) -> Result<Dispatcher, Failure> {
    let config = match &source.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };

    let builder = source
        .manifests
        .iter()
        .fold(ManifestCache::builder(), |builder, path| {
            if path.is_dir() {
                builder.from_dir(path)
            } else {
                builder.from_bundle(path)
            }
        });
    let cache = builder.build()?;
    debug!(plugins = cache.len(), source = ?cache.source(), "Loaded manifests");

    let plugins: Vec<ManifestPlugin> = cache
        .manifests()
        .iter()
        .map(|m| ManifestPlugin::new(m.plugin.clone()))
        .collect();
    Ok(Dispatcher::new(config, plugins)?)
}

fn emit<T: Serialize>(value: &T, format: OutputFormat) -> Result<(), Failure> {
    let raw = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string())?,
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string())?,
    };
    println!("{}", raw.trim_end());
    Ok(())
}

fn run_commands(args: CommandsArgs) -> Result<(), Failure> {
    let dispatcher = load_dispatcher(&args.source)?;
    let commands: Vec<_> = dispatcher
        .index()
        .commands()
        .filter(|c| args.hidden || !c.hidden)
        .collect();
    emit(&commands, args.source.format)
}

fn run_resolve(args: ResolveArgs) -> Result<(), Failure> {
    let dispatcher = load_dispatcher(&args.source)?;
    let index = dispatcher.index();
    let found = if args.must {
        Some(index.find_required(&args.id)?)
    } else {
        index.find(&args.id)
    };
    emit(&found, args.source.format)
}

fn run_matches(args: MatchesArgs) -> Result<(), Failure> {
    let dispatcher = load_dispatcher(&args.source)?;
    let ids: Vec<&str> = dispatcher
        .index()
        .find_matches(&args.id, &args.flags)
        .into_iter()
        .map(|c| c.id.as_str())
        .collect();
    emit(&ids, args.source.format)
}

async fn run_parse(args: ParseArgs) -> Result<(), Failure> {
    let mut dispatcher = load_dispatcher(&args.source)?;
    if args.no_stdin {
        dispatcher = dispatcher.without_stdin();
    }
    let parsed = dispatcher.run_command(&args.id, &args.argv).await?;
    emit(&parsed, args.source.format)
}

fn run_validate_manifest(args: ValidateManifestArgs) -> Result<(), Failure> {
    let mut commands = 0;
    for path in &args.inputs {
        let manifest = load_manifest(path)
            .map_err(|e| format!("'{}': {e}", path.display()))?;
        commands += manifest.command_count();
    }
    println!(
        "Validated {} manifest file(s) with {commands} command(s).",
        args.inputs.len()
    );
    Ok(())
}

fn run_bundle(args: BundleArgs) -> Result<(), Failure> {
    let cache = ManifestCache::from_dir(&args.input)?;
    cache.save_bundle(&args.output, PACKAGE_VERSION)?;
    println!(
        "Bundled {} manifest(s) into {}.",
        cache.len(),
        args.output.display()
    );
    Ok(())
}
