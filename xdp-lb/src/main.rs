use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use std::{
    path::{Path, PathBuf},
    process::exit,
};
use xdp_lb::{
    api::{self, AppState},
    config::{Config, ConfigFile},
    helpers, info, stats, RedirectTable, DEFAULT_ADDRESS, DEFAULT_MAP_PIN,
};

#[derive(Debug, Parser)]
#[clap(name = "xdp-lb", about = "Control plane for the xdp redirect load balancer")]
struct Cli {
    /// Pinned path of the redirect table shared with the xdp program
    #[clap(long, global = true, default_value = DEFAULT_MAP_PIN)]
    map: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP control API
    Serve(ServeOpt),
    /// Show the forwarded traffic per backend
    Stats,
    /// Show every slot of the redirect table
    Dump,
    /// Replace the backend set
    Set(SetOpt),
    /// Save or apply a backend set file
    #[clap(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
struct ServeOpt {
    /// Listen address of the api server, `:port` listens on all interfaces
    #[clap(long, default_value = DEFAULT_ADDRESS)]
    address: String,

    /// Backend set file applied before serving
    #[clap(long)]
    config: Option<String>,
}

#[derive(Debug, Args)]
struct SetOpt {
    /// Source address written into every redirected packet
    #[clap(long)]
    source_addr: String,

    /// Backends as `ip,mac,iface` where iface is an index, `if#<n>` or a name
    #[clap(required = true)]
    backends: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Write the backends found in the table to a file
    Save { file: String },
    /// Apply the backends from a file
    Load { file: String },
}

fn load_table(path: &Path) -> Result<RedirectTable, anyhow::Error> {
    let mut table: RedirectTable = RedirectTable::new();
    table.load(path)?;
    Ok(table)
}

fn apply(table: &mut RedirectTable, cfg: &Config) -> Result<(), anyhow::Error> {
    table
        .set(&cfg.servers())
        .context(format!("Failed to apply {}", cfg.description()))
}

async fn serve(map: &Path, opt: &ServeOpt) -> Result<(), anyhow::Error> {
    let mut table = load_table(map).context("Can't bind redirect table")?;

    if let Some(file) = &opt.config {
        let cfg = ConfigFile::new(file).load()?;
        apply(&mut table, &cfg)?;
    }

    api::serve(&helpers::listen_addr(&opt.address), AppState::new(table)).await
}

fn set(map: &Path, opt: &SetOpt) -> Result<(), anyhow::Error> {
    let servers = opt
        .backends
        .iter()
        .map(|arg| helpers::parse_backend_arg(&opt.source_addr, arg))
        .collect::<Result<Vec<_>, _>>()?;
    let mut table = load_table(map)?;
    table.set(&servers)?;
    Ok(())
}

fn handle_config(map: &Path, cmd: &ConfigCommand) -> Result<(), anyhow::Error> {
    let mut table = load_table(map)?;
    match cmd {
        ConfigCommand::Save { file } => {
            let cfg = Config::from_slots(&table.get()?);
            ConfigFile::new(file).save(&cfg)
        }
        ConfigCommand::Load { file } => {
            let cfg = ConfigFile::new(file).load()?;
            if cfg.backends.is_empty() {
                return Err(anyhow!("No backends in {}", file));
            }
            apply(&mut table, &cfg)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = match &cli.command {
        Command::Serve(opt) => serve(&cli.map, opt).await,
        Command::Stats => load_table(&cli.map).and_then(|table| {
            stats::print_all(&stats::aggregate(&table.get()?));
            Ok(())
        }),
        Command::Dump => load_table(&cli.map).and_then(|table| {
            info::print_slots(&table.get()?);
            Ok(())
        }),
        Command::Set(opt) => set(&cli.map, opt),
        Command::Config(cmd) => handle_config(&cli.map, cmd),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        exit(1);
    }
}
