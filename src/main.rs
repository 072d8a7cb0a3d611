use anyhow::Result;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use check_logs_insights::app::{self, Check, CheckOptions, Config};
use check_logs_insights::check::{CheckOutcome, Thresholds, CHECK_NAME};
use check_logs_insights::insights::AwsCliClient;
use check_logs_insights::state::InvocationIdentity;

/// Check CloudWatch Logs Insights query results against thresholds
#[derive(Parser, Debug)]
#[command(name = "check-logs-insights")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log group name (repeatable)
    #[arg(long = "log-group-name", value_name = "LOG-GROUP-NAME", required = true)]
    log_group_names: Vec<String>,

    /// Filter expression to search logs via CloudWatch Logs Insights
    #[arg(short, long, value_name = "FILTER")]
    filter: String,

    /// Trigger a warning if matched lines is over a number
    #[arg(short, long = "warning-over", value_name = "WARNING", default_value_t = 0)]
    warning_over: u64,

    /// Trigger a critical if matched lines is over a number
    #[arg(short, long = "critical-over", value_name = "CRITICAL", default_value_t = 0)]
    critical_over: u64,

    /// Dir to keep state files under
    #[arg(short, long = "state-dir", value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Output matched log messages (up to the result limit)
    #[arg(short, long = "return")]
    return_messages: bool,

    /// Give up waiting for the query after this many seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Config file (default: ~/.config/check-logs-insights/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug log
    #[arg(long)]
    debug: bool,
}

fn main() {
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help / --version go to stdout and are not failures
            if !e.use_stderr() {
                std::process::exit(0);
            }
            let outcome = CheckOutcome::unknown(format!("invalid arguments: {}", e.kind()));
            println!("{}", outcome.status_line(CHECK_NAME));
            std::process::exit(outcome.severity.exit_code());
        }
    };

    let outcome = match run(cli, args) {
        Ok(outcome) => outcome,
        Err(e) => CheckOutcome::unknown(format!("{:#}", e)),
    };

    println!("{}", outcome.status_line(CHECK_NAME));
    std::process::exit(outcome.severity.exit_code());
}

fn run(cli: Cli, args: Vec<OsString>) -> Result<CheckOutcome> {
    // ログ初期化
    init_logging(cli.debug)?;

    let config = Config::load(cli.config.as_deref())?;
    debug!("Loaded config: {:?}", config);

    let options = CheckOptions {
        log_group_names: cli.log_group_names,
        filter: cli.filter,
        thresholds: Thresholds {
            warning_over: cli.warning_over,
            critical_over: cli.critical_over,
        },
        return_messages: cli.return_messages,
        state_dir: cli.state_dir,
        timeout: cli.timeout.map(Duration::from_secs),
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(async {
        let signals = app::forward_signals()?;
        let client = Arc::new(AwsCliClient::new(config.query.aws_command.clone()));
        let identity = InvocationIdentity::from_env(args);
        let check = Check::new(client, &options, &config, &identity);
        anyhow::Ok(app::supervise(check, signals).await)
    })?;

    info!("Check finished: {:?}", outcome.severity);
    // A forced shutdown may leave the check task blocked on a child process
    runtime.shutdown_background();
    Ok(outcome)
}

fn init_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout is reserved for the status line
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    Ok(())
}
