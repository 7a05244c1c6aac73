mod debug_report;

use buildeval::{EvaluationContext, LoadSettings, Project};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "BUILDEVAL_LOG";

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let mut project = match Project::load(&config.project, config.context) {
        Ok(project) => project.with_settings(config.settings),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    match project.evaluate() {
        Ok(snapshot) => debug_report::print_snapshot(&config.project, &snapshot, config.color),
        Err(err) => {
            debug_report::print_failure(&config.project, &err, config.color);
            std::process::exit(1);
        }
    }
}

struct CliConfig {
    project: PathBuf,
    context: EvaluationContext,
    settings: LoadSettings,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut project: Option<PathBuf> = None;
    let mut context = EvaluationContext::default();
    let mut settings = LoadSettings::empty();
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("buildeval {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--env" => context = context.with_process_environment(),
            "--ignore-missing-imports" => settings |= LoadSettings::IGNORE_MISSING_IMPORTS,
            "--ignore-invalid-imports" => settings |= LoadSettings::IGNORE_INVALID_IMPORTS,
            "-p" | "--property" => {
                let value = args.next().ok_or_else(|| format!("error: {arg} expects NAME=VALUE"))?;
                context = add_property(context, &value)?;
            }
            "--tools-version" => {
                let value = args.next().ok_or_else(|| "error: --tools-version expects a value".to_string())?;
                context = context.with_tools_version(value);
            }
            _ if arg.starts_with("--property=") => {
                context = add_property(context, arg.trim_start_matches("--property="))?;
            }
            _ if arg.starts_with("--tools-version=") => {
                context = context.with_tools_version(arg.trim_start_matches("--tools-version="));
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                if project.is_some() {
                    return Err("error: project provided multiple times".to_string());
                }
                project = Some(PathBuf::from(arg));
            }
        }
    }

    let Some(project) = project else {
        return Err(format!("error: no project provided\n\n{}", help_text()));
    };
    Ok(CliConfig { project, context, settings, color })
}

/// Parse `NAME=VALUE` into a global property.
fn add_property(context: EvaluationContext, value: &str) -> Result<EvaluationContext, String> {
    let Some((name, value)) = value.split_once('=') else {
        return Err(format!("error: invalid property '{value}' (expected NAME=VALUE)"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err("error: property name is empty".to_string());
    }
    Ok(context.with_global_property(name, value))
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "buildeval {version}

Evaluate an MSBuild-style project and print its properties, items, imports and targets.

Usage:
  buildeval [OPTIONS] <project>

Options:
  -p, --property <NAME=VALUE>  Set a global property. May be repeated.
  --tools-version <version>    Value of $(MSBuildToolsVersion). Default: Current
  --env                        Expose process environment variables as properties.
  --ignore-missing-imports     Skip imports whose file does not exist.
  --ignore-invalid-imports     Skip imports whose file cannot be parsed.
  --color                      Force ANSI color output.
  --no-color                   Disable ANSI color output.
  -h, --help                   Show this help message.
  -V, --version                Print version information.

Logging:
  {log_env} takes a tracing filter, e.g. {log_env}=buildeval=debug. Default: warn

Exit codes:
  0  Success.
  1  The project could not be loaded or evaluated.
  2  Invalid arguments.
",
        version = env!("CARGO_PKG_VERSION"),
        log_env = LOG_ENV,
    )
}
