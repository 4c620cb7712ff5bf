use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod utils;

/// µDCN command-line interface: drives a forwarding node's management
/// surface and QUIC link layer from the shell.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch a forwarding node (engine, ageing task, QUIC transport,
    /// management surface) and block until shut down.
    Run {
        /// Path to a TOML configuration file.
        #[clap(short, long)]
        config: Option<String>,

        /// Address to accept NDN-over-QUIC connections on.
        #[clap(short, long, default_value = "0.0.0.0:6367")]
        listen: String,

        /// Address the management surface listens on.
        #[clap(short, long, default_value = "127.0.0.1:9696")]
        management: String,

        /// TLS certificate (PEM). A self-signed one is generated if omitted.
        #[clap(long)]
        cert: Option<std::path::PathBuf>,

        /// TLS private key (PEM). A self-signed one is generated if omitted.
        #[clap(long)]
        key: Option<std::path::PathBuf>,
    },

    /// Manage a running node's forwarding table (FIB) over its management
    /// surface.
    Fib {
        #[clap(subcommand)]
        cmd: FibCommands,
    },

    /// Send an Interest directly against a forwarder over QUIC and print
    /// whatever comes back.
    Interest {
        /// Name to request (NDN URI format).
        name: String,

        /// Forwarder address to connect to.
        #[clap(short, long)]
        server: String,

        /// Timeout in milliseconds.
        #[clap(short, long, default_value = "4000")]
        timeout: u64,
    },

    /// Seed Content on a running node via its management surface.
    Publish {
        /// Name to publish under (NDN URI format).
        name: String,

        /// Content to publish (string).
        content: String,

        /// Address of the node's management surface.
        #[clap(short, long, default_value = "127.0.0.1:9696")]
        management: String,
    },

    /// Benchmark a running forwarder by sending a batch of Interests over
    /// QUIC and reporting throughput/latency.
    Benchmark {
        /// Number of Interests to send.
        #[clap(short, long, default_value = "1000")]
        count: usize,

        /// Name prefix to use for the benchmark.
        #[clap(short, long, default_value = "/benchmark")]
        prefix: String,

        /// Number of concurrent requesters.
        #[clap(short = 'j', long, default_value = "1")]
        concurrent: usize,

        /// Forwarder address to connect to.
        #[clap(short, long)]
        server: String,
    },
}

#[derive(Subcommand)]
enum FibCommands {
    /// Add a route to the FIB.
    Add {
        /// Name prefix (NDN URI format).
        prefix: String,

        /// Next-hop face id.
        face: u32,

        /// Route cost, used only to break longest-prefix ties.
        #[clap(short, long, default_value = "0")]
        cost: u8,

        /// Address of the node's management surface.
        #[clap(short, long, default_value = "127.0.0.1:9696")]
        management: String,
    },

    /// Remove a route from the FIB.
    Remove {
        /// Name prefix (NDN URI format).
        prefix: String,

        /// Address of the node's management surface.
        #[clap(short, long, default_value = "127.0.0.1:9696")]
        management: String,
    },

    /// Show all routes currently installed in the FIB.
    Show {
        /// Address of the node's management surface.
        #[clap(short, long, default_value = "127.0.0.1:9696")]
        management: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    match cli.command {
        Commands::Run { config, listen, management, cert, key } => {
            commands::run::run_node(config, listen, management, cert, key).await?;
        }
        Commands::Fib { cmd } => {
            commands::fib::handle_command(cmd).await?;
        }
        Commands::Interest { name, server, timeout } => {
            commands::interest::send_interest(name, server, timeout).await?;
        }
        Commands::Publish { name, content, management } => {
            commands::publish::publish_content(name, content, management).await?;
        }
        Commands::Benchmark { count, prefix, concurrent, server } => {
            commands::benchmark::run_benchmark(count, prefix, concurrent, server).await?;
        }
    }

    Ok(())
}
