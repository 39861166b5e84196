use clap::Parser as _;
use pgtestctl::cmd;

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries command output only
    monitoring::logging::init();

    if let Err(err) = run().await {
        pgtestctl::error!(err);
        std::process::exit(1);
    }
}

/// Operator CLI for pgtest ephemeral databases
#[derive(Debug, clap::Parser)]
#[command(name = "pgtestctl")]
#[command(about = "pgtestctl creates, lists and purges pgtest ephemeral databases")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Create an ephemeral database and print its URL
    ///
    /// Runs the same steps as a test calling `pgtest::open`: expired databases
    /// are swept, a fresh database is created and the schema is applied to it.
    /// The connection URL is printed on stdout, so the command can be used in
    /// shell substitutions.
    ///
    /// The sweep is best-effort: the command exits once the URL is printed, so
    /// drops still pending at that point are abandoned. Those databases stay
    /// expired and are collected by the next sweep or by `purge`.
    #[command(after_help = include_str!("cmd/create__after_help.md"))]
    Create(cmd::create::Args),

    /// List ephemeral databases on the server
    #[command(alias = "ls")]
    List(cmd::list::Args),

    /// Drop expired ephemeral databases, waiting for each drop
    ///
    /// Unlike the sweep run by every provisioning call, failures are reported
    /// and no drop limit applies unless `--limit` is given.
    #[command(after_help = include_str!("cmd/purge__after_help.md"))]
    Purge(cmd::purge::Args),
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Create(args) => cmd::create::run(args).await?,
        Commands::List(args) => cmd::list::run(args).await?,
        Commands::Purge(args) => cmd::purge::run(args).await?,
    }

    Ok(())
}
