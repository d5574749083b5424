use std::path::Path;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use dataprov::app::{App, DownloadOptions};
use dataprov::error::DataprovError;
use dataprov::extract::SystemTar;
use dataprov::figshare::{DEFAULT_ARTICLE_ID, FigshareHttpClient};
use dataprov::hooks::HookRegistry;
use dataprov::layout::Layout;
use dataprov::output::{ConsoleOutput, JsonOutput};
use dataprov::relocate::Manifest;

#[derive(Parser)]
#[command(name = "dataprov")]
#[command(about = "Fetch, verify, and relocate the experiment dataset archive")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download the dataset parts, reassemble, extract, and relocate")]
    Download(DownloadArgs),
    #[command(about = "Remove the part-file cache")]
    Clean,
    #[command(about = "Show resolved paths and defaults")]
    Info,
}

#[derive(Args)]
struct DownloadArgs {
    /// Bypass cache reuse and redownload every part.
    #[arg(long)]
    ignore_cache: bool,

    /// Skip fetch and extraction; only replay the relocation manifest.
    #[arg(long)]
    relocate_only: bool,

    /// Delete each cached part as soon as it has been concatenated.
    #[arg(long)]
    trim_cache: bool,

    /// Figshare article holding the dataset parts.
    #[arg(long, default_value = DEFAULT_ARTICLE_ID)]
    article: String,

    /// Relocation manifest path.
    #[arg(long, default_value = "relocate.json")]
    manifest: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<DataprovError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DataprovError) -> u8 {
    match error {
        DataprovError::MetadataNotFound(_)
        | DataprovError::ManifestRead(_)
        | DataprovError::ManifestParse(_)
        | DataprovError::UnknownHook(_) => 2,
        DataprovError::Http(_) | DataprovError::Status { .. } | DataprovError::Integrity(_) => 3,
        DataprovError::ExternalTool(_)
        | DataprovError::Hook { .. }
        | DataprovError::NotADirectory(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let layout = Layout::new().into_diagnostic()?;

    match cli.command {
        Commands::Download(args) => {
            let client = FigshareHttpClient::new().into_diagnostic()?;
            let hooks = HookRegistry::with_builtins();
            let manifest = Manifest::load(Path::new(&args.manifest), &hooks).into_diagnostic()?;
            let app = App::new(layout, client, SystemTar::new(), hooks);

            let options = DownloadOptions {
                ignore_cache: args.ignore_cache,
                relocate_only: args.relocate_only,
                trim_cache: args.trim_cache,
            };

            let report = if cli.non_interactive {
                app.download(&args.article, &manifest, options, &JsonOutput)
                    .into_diagnostic()?
            } else {
                app.download(&args.article, &manifest, options, &ConsoleOutput)
                    .into_diagnostic()?
            };

            if cli.non_interactive {
                JsonOutput::print(&report).into_diagnostic()?;
            } else {
                println!(
                    "done: {} downloaded, {} from cache, {} rules applied, {} skipped",
                    report.parts_downloaded,
                    report.parts_reused,
                    report.rules_applied,
                    report.rules_skipped
                );
            }
            Ok(())
        }
        Commands::Clean => {
            let app = App::new(
                layout,
                FigshareHttpClient::new().into_diagnostic()?,
                SystemTar::new(),
                HookRegistry::with_builtins(),
            );
            let report = if cli.non_interactive {
                app.clean(&JsonOutput).into_diagnostic()?
            } else {
                app.clean(&ConsoleOutput).into_diagnostic()?
            };
            if cli.non_interactive {
                JsonOutput::print(&report).into_diagnostic()?;
            } else {
                println!("cache cleared: {}", report.cache_root);
            }
            Ok(())
        }
        Commands::Info => {
            let app = App::new(
                layout,
                FigshareHttpClient::new().into_diagnostic()?,
                SystemTar::new(),
                HookRegistry::with_builtins(),
            );
            let report = app.info();
            if cli.non_interactive {
                JsonOutput::print(&report).into_diagnostic()?;
            } else {
                println!("project root: {}", report.project_root);
                println!("cache root:   {}", report.cache_root);
                println!("staging dir:  {}", report.staging_dir);
                println!("article:      {}", report.default_article);
            }
            Ok(())
        }
    }
}
