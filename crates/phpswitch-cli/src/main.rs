use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use phpswitch_core::LinkSelection;
use tracing_subscriber::EnvFilter;

mod command_flows;
mod completion;
mod render;

use command_flows::{
    format_current_lines, format_version_lines, load_config, open_session,
    render_current_state_json, render_version_list_json, run_config_command, run_switch_command,
    run_unlock_command,
};
use completion::{resolve_completion_shell, write_completions_script, CliCompletionShell};
use render::{current_output_style, TerminalRenderer};

#[derive(Parser, Debug)]
#[command(name = "phpswitch")]
#[command(
    about = "Switch the active PHP interpreter and Apache server of a XAMPP-style install",
    long_about = None
)]
struct Cli {
    /// Config file to load instead of the per-user default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Installation root, overriding the config file.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Disable badges, colors and the spinner.
    #[arg(long, global = true)]
    plain: bool,
    #[arg(long, value_enum, global = true, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List installed versions.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show where the stable paths point.
    Current {
        #[arg(long)]
        json: bool,
    },
    /// Stop the service, repoint the stable paths and start it again.
    Switch {
        version: String,
        #[arg(long, value_enum)]
        only: Option<OnlyLink>,
        /// Do not run the stop/start commands.
        #[arg(long)]
        skip_service: bool,
    },
    /// Remove a lock left behind by an interrupted switch.
    Unlock,
    /// Print the effective configuration.
    Config,
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Option<CliCompletionShell>,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OnlyLink {
    Interpreter,
    Server,
}

fn link_selection(only: Option<OnlyLink>) -> LinkSelection {
    match only {
        None => LinkSelection::Both,
        Some(OnlyLink::Interpreter) => LinkSelection::InterpreterOnly,
        Some(OnlyLink::Server) => LinkSelection::ServerOnly,
    }
}

fn initialize_tracing(log_level: LogLevel) {
    // RUST_LOG wins over --log-level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    // stdout carries command output, including --json.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_tracing(cli.log_level);
    run_cli(cli)
}

fn run_cli(cli: Cli) -> Result<()> {
    let renderer = TerminalRenderer::from_style(current_output_style(cli.plain));

    match cli.command {
        Commands::List { json } => {
            let config = load_config(cli.config.as_deref(), cli.root.as_deref())?;
            let session = open_session(config, true)?;
            let versions = session.list_versions();
            if json {
                println!(
                    "{}",
                    render_version_list_json(session.layout(), &versions, session.current_state())?
                );
            } else {
                renderer.print_lines(&format_version_lines(
                    session.layout(),
                    &versions,
                    session.current_state(),
                    renderer.style(),
                ));
            }
        }
        Commands::Current { json } => {
            let config = load_config(cli.config.as_deref(), cli.root.as_deref())?;
            let session = open_session(config, true)?;
            if json {
                println!("{}", render_current_state_json(session.current_state())?);
            } else {
                renderer.print_lines(&format_current_lines(session.current_state()));
            }
        }
        Commands::Switch {
            version,
            only,
            skip_service,
        } => {
            let config = load_config(cli.config.as_deref(), cli.root.as_deref())?;
            let session = open_session(config, skip_service)?;
            renderer.print_section(&format!("switch to {version}"));
            run_switch_command(&session, &version, link_selection(only), renderer)?;
        }
        Commands::Unlock => {
            let config = load_config(cli.config.as_deref(), cli.root.as_deref())?;
            let message = run_unlock_command(&config.layout())?;
            renderer.print_status("ok", &message);
        }
        Commands::Config => {
            let config = load_config(cli.config.as_deref(), cli.root.as_deref())?;
            print!("{}", run_config_command(&config)?);
        }
        Commands::Completions { shell } => {
            let shell_env = std::env::var("SHELL").ok();
            let shell = resolve_completion_shell(shell, shell_env.as_deref(), cfg!(windows));
            let mut stdout = std::io::stdout().lock();
            write_completions_script(shell, &mut stdout)?;
        }
    }

    Ok(())
}
