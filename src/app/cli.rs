use std::{fmt::Display, path::PathBuf, str::FromStr};

use clap::Parser;
use tracing_subscriber::filter::{self, Directive};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(flatten)]
    pub args: Args,
}

#[derive(clap::Args, Clone, Debug)]
pub struct Args {
    /// Repository owner
    #[clap(required_unless_present_any = ["print_log_dir", "set_token", "fixture"])]
    pub owner: Option<String>,
    /// Repository name
    #[clap(required_unless_present_any = ["print_log_dir", "set_token", "fixture"])]
    pub repo: Option<String>,
    /// Issue or pull request whose conversation is shown
    #[clap(required_unless_present_any = ["print_log_dir", "set_token", "fixture"])]
    pub issue: Option<u64>,
    /// Serve the conversation from a JSON file instead of GitHub
    #[clap(long, short, conflicts_with_all = ["owner", "repo", "issue"])]
    pub fixture: Option<PathBuf>,
    /// Artificial delay for every fixture mutation, in milliseconds
    #[clap(long, default_value_t = 0, requires = "fixture")]
    pub latency_ms: u64,
    #[clap(long, short, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
    #[clap(long, short)]
    pub print_log_dir: bool,
    /// Store a GitHub token in the system keyring and exit
    #[clap(long)]
    pub set_token: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    None,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::None => "none",
        };
        write!(f, "{s}")
    }
}

impl TryFrom<LogLevel> for Directive {
    type Error = filter::ParseError;
    fn try_from(value: LogLevel) -> Result<Self, Self::Error> {
        match value {
            LogLevel::None => Directive::from_str("off"),
            level => Directive::from_str(&level.to_string()),
        }
    }
}
