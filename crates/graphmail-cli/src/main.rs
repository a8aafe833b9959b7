//! CLI interface for graphmail - Microsoft Graph users and mail from the terminal.

mod shell;

use std::env;
use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::{Context as _, Result, anyhow};
use clap::{Args, Parser, ValueEnum};
use env_logger::fmt::WriteStyle;
use graphmail_core::{AppConfig, AppPaths, Credentials, GraphClient};
use log::{LevelFilter, debug};

use crate::shell::Shell;

fn main() -> anyhow::Result<()> {
    try_main()
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common)?;
    ctx.init_logging()?;
    debug!("config file: {}", ctx.paths.config_file.display());

    ctx.load_env_file()?;
    let credentials =
        Credentials::from_env().context("error initializing Graph for app auth")?;
    let client = GraphClient::new(credentials, &ctx.config.graph)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    // Fail before the menu if the credentials are rejected.
    rt.block_on(client.app_token())
        .context("error initializing Graph for app auth")?;

    let stdin = io::stdin();
    let mut shell = Shell::new(&client, stdin.lock(), io::stdout().lock());
    rt.block_on(shell.run())?;
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "graphmail",
    author,
    version,
    about = "List users, read inboxes and send mail through Microsoft Graph"
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
}

/// Common CLI options.
#[derive(Debug, Clone, Args)]
pub struct CommonOpts {
    /// Override the config file path.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Load CLIENT_ID, SECRET and TENANT_ID from this dotenv file.
    #[arg(long = "env-file", value_name = "PATH")]
    pub env_file: Option<PathBuf>,
    /// Disable logging.
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub quiet: bool,
    /// Increase logging verbosity (stackable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
    /// Enable trace logging.
    #[arg(long)]
    pub trace: bool,
    /// Disable ANSI colors in output.
    #[arg(long = "no-color", conflicts_with = "color")]
    pub no_color: bool,
    /// Control color output.
    #[arg(long, value_enum, default_value_t = ColorOption::Auto)]
    pub color: ColorOption,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorOption {
    /// Detect terminal capabilities automatically.
    Auto,
    /// Always emit ANSI color codes.
    Always,
    /// Never emit ANSI color codes.
    Never,
}

// ─── Runtime ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.as_deref())?;
        let config = AppConfig::load(&paths)
            .with_context(|| format!("loading config from {}", paths.config_file.display()))?;
        Ok(Self {
            common,
            paths,
            config,
        })
    }

    fn init_logging(&self) -> Result<()> {
        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
        builder.filter_level(self.effective_log_level());

        if let Some(ref file) = self.config.logging.file {
            let target = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .with_context(|| format!("opening log file {file}"))?;
            builder.target(env_logger::Target::Pipe(Box::new(target)));
            builder.write_style(WriteStyle::Never);
        } else {
            let force_color = matches!(self.common.color, ColorOption::Always)
                || env::var_os("FORCE_COLOR").is_some();
            let disable_color = self.common.no_color
                || matches!(self.common.color, ColorOption::Never)
                || env::var_os("NO_COLOR").is_some()
                || (!force_color && !io::stderr().is_terminal());

            if disable_color {
                builder.write_style(WriteStyle::Never);
            } else if force_color {
                builder.write_style(WriteStyle::Always);
            } else {
                builder.write_style(WriteStyle::Auto);
            }
        }

        builder.try_init().or_else(|err| {
            if self.common.verbose > 0 {
                eprintln!("logger already initialized: {err}");
            }
            Ok(())
        })
    }

    /// CLI flags win; without any, the configured level applies.
    const fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => self.config.logging.level.as_filter(),
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    /// Populate the environment from the secrets file. A missing default
    /// file is skipped; a missing `--env-file` or a malformed file is fatal.
    fn load_env_file(&self) -> Result<()> {
        let (path, explicit) = match (&self.common.env_file, &self.config.graph.env_file) {
            (Some(path), _) => (path.clone(), true),
            (None, Some(file)) => (PathBuf::from(file), false),
            (None, None) => return Ok(()),
        };

        match dotenvy::from_path(&path) {
            Ok(()) => {
                debug!("loaded secrets from {}", path.display());
                Ok(())
            }
            Err(err) if err.not_found() && !explicit => {
                debug!("no secrets file at {}, using process environment", path.display());
                Ok(())
            }
            Err(err) => Err(anyhow!("error loading secrets file {}: {err}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn context(args: &[&str]) -> RuntimeContext {
        let cli = Cli::try_parse_from(args).unwrap();
        RuntimeContext {
            common: cli.common,
            paths: AppPaths {
                config_file: env::temp_dir().join("graphmail-test-config.toml"),
            },
            config: AppConfig::default(),
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn verbosity_flags_override_config_level() {
        assert_eq!(context(&["graphmail"]).effective_log_level(), LevelFilter::Warn);
        assert_eq!(context(&["graphmail", "-vv"]).effective_log_level(), LevelFilter::Debug);
        assert_eq!(context(&["graphmail", "--trace"]).effective_log_level(), LevelFilter::Trace);
    }

    #[test]
    fn quiet_turns_logging_off() {
        let ctx = context(&["graphmail", "--quiet"]);
        ctx.init_logging().unwrap();
        assert_eq!(log::max_level(), LevelFilter::Off);
    }

    #[test]
    fn missing_default_env_file_is_skipped() {
        let mut ctx = context(&["graphmail"]);
        ctx.config.graph.env_file = Some(
            env::temp_dir()
                .join("graphmail-no-such.env")
                .display()
                .to_string(),
        );
        assert!(ctx.load_env_file().is_ok());
    }

    #[test]
    fn missing_explicit_env_file_is_fatal() {
        let missing = env::temp_dir().join("graphmail-no-such-explicit.env");
        let ctx = context(&["graphmail", "--env-file", missing.to_str().unwrap()]);
        let err = ctx.load_env_file().unwrap_err();
        assert!(err.to_string().contains("error loading secrets file"));
    }
}
