use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use statboard::config::Config;
use statboard::data::Dataset;
use statboard::page::{render_page, Page, PanelOutcome, WidgetState};
use statboard::server::{router, AppState};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "statboard")]
#[command(about = "Exploratory charts for CSV datasets, in the browser or on the command line", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the dashboard web server
    Serve(ServeArgs),
    /// Render the charts of one page to PNG files
    Render(RenderArgs),
    /// Print the column schema of a CSV as JSON
    Inspect {
        /// CSV file (reads stdin when absent)
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long)]
    bind: Option<String>,
    /// Folder uploaded datasets are staged in
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Folder with videos for the Welcome page
    #[arg(long)]
    video_dir: Option<PathBuf>,
    /// Serve a shared remote file instead of uploads
    #[arg(long, value_name = "SHARE_LINK")]
    remote: Option<String>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Page slug: univariate, bivariate or multivariate
    #[arg(long)]
    page: String,
    /// CSV file (reads stdin when absent)
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Output folder for the PNG files
    #[arg(long)]
    out: PathBuf,
    /// Widget value, e.g. --set hist=price (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("statboard=info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => serve(config, args).await,
        Command::Render(args) => render(&config, args),
        Command::Inspect { csv } => inspect(csv.as_deref()),
    }
}

async fn serve(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(dir) = args.data_dir {
        config.app_data_dir = dir;
    }
    if let Some(dir) = args.video_dir {
        config.video_dir = dir;
    }
    if let Some(link) = args.remote {
        config.use_remote(&link);
    }

    let state = AppState::new(&config).context("Failed to initialise dashboard")?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    let local = listener.local_addr()?;
    info!(%local, "dashboard listening");

    tokio::select! {
        result = axum::serve(listener, app) => result.context("Server error")?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}

fn read_dataset(csv: Option<&Path>) -> Result<Dataset> {
    let dataset = match csv {
        Some(path) => Dataset::from_path(path)
            .with_context(|| format!("Failed to read CSV from {}", path.display()))?,
        None => Dataset::from_reader(io::stdin().lock()).context("Failed to read CSV from stdin")?,
    };
    Ok(dataset)
}

fn render(config: &Config, args: RenderArgs) -> Result<()> {
    let page: Page = args.page.parse()?;
    if !page.needs_dataset() {
        anyhow::bail!("The {} page has no charts to render", page);
    }

    let mut pairs = Vec::new();
    for entry in &args.set {
        let (key, value) = entry
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got '{}'", entry))?;
        pairs.push((key.trim().to_string(), value.to_string()));
    }
    let widgets = WidgetState::from_pairs(pairs);

    let dataset = read_dataset(args.csv.as_deref())?;
    let theme = config.theme.resolve();
    let rendered = render_page(page, Some(&dataset), &widgets, &config.render, &theme)?;

    fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create {}", args.out.display()))?;
    for (idx, panel) in rendered.panels.iter().enumerate() {
        match &panel.outcome {
            PanelOutcome::Figure(figure) => {
                let path = args
                    .out
                    .join(format!("{:02}-{}.png", idx + 1, figure.kind.slug()));
                fs::write(&path, &figure.png)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!(path = %path.display(), title = %figure.title, "figure written");
            }
            PanelOutcome::Error(message) => warn!(panel = panel.heading, "{}", message),
            PanelOutcome::Warning(message) => warn!(panel = panel.heading, "{}", message),
        }
    }
    Ok(())
}

fn inspect(csv: Option<&Path>) -> Result<()> {
    let dataset = read_dataset(csv)?;
    let json = serde_json::to_string_pretty(&dataset.schema()).context("Failed to encode schema")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json).context("Failed to write schema to stdout")?;
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}
