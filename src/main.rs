use clap::Parser;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use syslog_replay::Result;
use syslog_replay::capture::AfPacketSocket;
use syslog_replay::config::{self, CliArgs, Config, ReplayConfig};
use syslog_replay::dataplane::Connection;
use syslog_replay::replay::{ReplayOptions, Replayer, format_list};
use syslog_replay::telemetry::{Metrics, init_logging};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "syslog-replay")]
#[command(about = "Replay syslog lines from stdin as UDP datagrams with a chosen source address")]
#[command(after_help = format_list())]
struct Cli {
    /// Destination address
    dest_address: String,

    /// Source address to put on the wire (default: egress interface address)
    src_address: Option<String>,

    /// Destination port [default: 514]
    #[arg(short = 'd', long)]
    dst_port: Option<u16>,

    /// Source port [default: 514]
    #[arg(short = 's', long)]
    src_port: Option<u16>,

    /// Timestamp format of the input lines [default: rfc3164]
    #[arg(short = 'f', long)]
    format: Option<String>,

    /// Rewrite each line's timestamp to the current time
    #[arg(short = 'c', long, overrides_with = "no_convert")]
    convert: bool,

    /// Keep the original timestamps even if the settings file enables convert
    #[arg(long, overrides_with = "convert")]
    no_convert: bool,

    /// Optional TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn to_args(&self) -> CliArgs {
        CliArgs {
            dest_address: self.dest_address.clone(),
            src_address: self.src_address.clone(),
            dst_port: self.dst_port,
            src_port: self.src_port,
            format: self.format.clone(),
            convert: match (self.convert, self.no_convert) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let settings = match cli.config.as_ref().map(config::load).transpose() {
        Ok(settings) => settings.unwrap_or_default(),
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            std::process::exit(1);
        }
    };

    // RUST_LOG still takes priority
    init_logging(Some(&settings.logging.to_log_config()));

    if let Err(e) = run(&cli, &settings) {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli, settings: &Config) -> Result<()> {
    use tokio::runtime::Runtime;

    let config = ReplayConfig::resolve(&cli.to_args(), settings)?;
    debug!(?config, "resolved configuration");

    let interactive = std::io::stdin().is_terminal();
    let metrics = Arc::new(Metrics::new());
    let replayer = Replayer::new(
        ReplayOptions {
            format: config.format,
            convert: config.convert,
            interactive,
        },
        metrics.clone(),
    )?;

    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut conn: Connection<AfPacketSocket> =
            Connection::open(&config, metrics.clone()).await?;

        let mut stdout = std::io::stdout();
        writeln!(stdout, "{}", conn.flow())?;
        if interactive {
            writeln!(stdout, "[Type Ctrl-D to end input]")?;
        }
        stdout.flush()?;

        info!(format = %config.format, convert = config.convert, interactive, "replay started");
        replayer
            .run(tokio::io::stdin(), &mut stdout, &mut conn)
            .await
    })?;

    metrics.log_summary();
    Ok(())
}
