mod commands;

use bootbox_config::{load_for_workspace, ConfigOverrides, WrapperConfig};
use bootbox_core::ContextFile;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CONFIG_ERROR, EXIT_FAILURE};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Env var that selects the provisioner when `--provisioner` is not given.
const PROVISIONER_ENV: &str = "BOOTBOX_PROVISIONER";

#[derive(Debug, Parser)]
#[command(
    name = "bootbox",
    version,
    about = "Provision an ephemeral Vagrant environment around a build"
)]
struct Cli {
    /// Build workspace directory.
    #[arg(long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Build context file shared between setup, build steps and teardown.
    /// Defaults to <workspace>/.bootbox/context.json.
    #[arg(long, global = true)]
    context: Option<PathBuf>,

    /// Wrapper config file. Defaults to <workspace>/bootbox.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Per-invocation overrides for the wrapper config.
#[derive(Debug, Args)]
#[allow(clippy::struct_excessive_bools)]
struct WrapperArgs {
    /// Directory containing the Vagrantfile (default: the workspace).
    #[arg(long)]
    descriptor: Option<PathBuf>,
    /// Destroy the environment when the build finishes.
    #[arg(long, default_value_t = false, conflicts_with = "keep")]
    destroy: bool,
    /// Leave the environment running when the build finishes.
    #[arg(long, default_value_t = false)]
    keep: bool,
    /// Reload machines that already exist instead of one bulk `up`.
    #[arg(long, default_value_t = false, conflicts_with = "no_reload")]
    reload: bool,
    /// Always bring all machines up in one bulk `up`.
    #[arg(long, default_value_t = false)]
    no_reload: bool,
    /// Provisioning backend (vagrant, mock).
    #[arg(long, env = PROVISIONER_ENV)]
    provisioner: Option<String>,
}

impl WrapperArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            descriptor_path: self.descriptor.clone(),
            destroy_on_teardown: flag_pair(self.destroy, self.keep),
            reload_existing_machines: flag_pair(self.reload, self.no_reload),
            provisioner: self.provisioner.clone(),
        }
    }
}

fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Bring the environment up before a build and record it in the context.
    Setup {
        #[command(flatten)]
        wrapper: WrapperArgs,
    },
    /// Tear down the environment recorded in the context.
    Teardown {
        /// Provisioner to use when the context does not name one.
        #[arg(long, env = PROVISIONER_ENV)]
        provisioner: Option<String>,
    },
    /// Set up, run a build command, then always tear down.
    Run {
        #[command(flatten)]
        wrapper: WrapperArgs,
        /// Build command and arguments (after --).
        #[arg(required = true, last = true)]
        command: Vec<String>,
    },
    /// Flag the environment as dirty so later steps package or clean it.
    MarkDirty,
    /// Show the build context.
    Status,
    /// Check provisioner prerequisites and workspace state.
    Doctor {
        #[command(flatten)]
        wrapper: WrapperArgs,
    },
    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[allow(clippy::too_many_lines)]
fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("BOOTBOX_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let workspace = absolute(&cli.workspace);
    let context = ContextFile::new(
        cli.context
            .as_deref()
            .map_or_else(|| workspace.join(".bootbox").join("context.json"), absolute),
    );
    let json_output = cli.json;
    let config_path = cli.config.as_deref();

    let result = match &cli.command {
        Commands::Setup { wrapper } => load_config(&workspace, config_path, wrapper)
            .and_then(|config| {
                check_prereqs(&config)?;
                commands::setup::run(&workspace, &context, &config, json_output)
            }),
        Commands::Teardown { provisioner } => {
            let fallback = match provisioner {
                Some(name) => Ok(name.clone()),
                None => load_for_workspace(&workspace, config_path)
                    .map(|c| c.provisioner)
                    .map_err(|e| format!("config error: {e}")),
            };
            fallback.and_then(|name| commands::teardown::run(&context, &name, json_output))
        }
        Commands::Run { wrapper, command } => load_config(&workspace, config_path, wrapper)
            .and_then(|config| {
                check_prereqs(&config)?;
                commands::run::run(&workspace, &context, &config, command, json_output)
            }),
        Commands::MarkDirty => commands::mark_dirty::run(&context),
        Commands::Status => commands::status::run(&context, json_output),
        Commands::Doctor { wrapper } => load_config(&workspace, config_path, wrapper)
            .and_then(|config| commands::doctor::run(&workspace, &context, &config, json_output)),
        Commands::Completions { shell } => commands::completions::run::<Cli>(*shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("config error:") {
                EXIT_CONFIG_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

fn load_config(
    workspace: &Path,
    explicit: Option<&Path>,
    wrapper: &WrapperArgs,
) -> Result<WrapperConfig, String> {
    let config = load_for_workspace(workspace, explicit)
        .map_err(|e| format!("config error: {e}"))?
        .with_overrides(&wrapper.overrides());
    config
        .validate()
        .map_err(|e| format!("config error: {e}"))?;
    tracing::debug!("wrapper config: {config:?}");
    Ok(config)
}

fn check_prereqs(config: &WrapperConfig) -> Result<(), String> {
    if config.provisioner != "vagrant" || std::env::var("BOOTBOX_SKIP_PREREQS").as_deref() == Ok("1")
    {
        return Ok(());
    }
    let missing = bootbox_provision::check_vagrant_prereqs();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(bootbox_provision::format_missing(&missing))
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
