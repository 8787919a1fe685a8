//! retroauto - run and check RetroAuto script documents
//!
//! `retroauto run` executes a document against dry-run backends: every input
//! action is logged instead of performed, and the matcher reports only the
//! `--visible` assets as present. Breakpoints hand control to a console
//! debugger on stdin.

mod console;
mod dry_run;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use retro_builtins::Automation;
use retro_config::RuntimeConfig;
use retro_core::InputGate;
use retro_debugger::Debugger;
use dry_run::{DryRunInput, DryRunMatcher};
use retro_runner::{RunSession, ScriptDocument};
use retro_security::Permission;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "retroauto")]
#[command(version, about = "Run RetroAuto screen-automation scripts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a script document
    Run(RunArgs),
    /// Load and validate a script document without running it
    Check {
        /// Path to a .json or .yaml script document
        program: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Path to a .json or .yaml script document
    program: PathBuf,

    /// Runtime config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Flow to run instead of the document's main flow
    #[arg(long = "main", value_name = "FLOW")]
    main_flow: Option<String>,

    /// Breakpoint as FILE:LINE, or LINE in the program's own file
    #[arg(long = "break", value_name = "FILE:LINE", value_parser = parse_breakpoint)]
    breakpoints: Vec<(Option<String>, u32)>,

    /// Asset the dry-run matcher reports as visible
    #[arg(long, value_name = "ASSET")]
    visible: Vec<String>,

    /// Grant a permission on top of the config (e.g. input_control, unsafe)
    #[arg(long, value_name = "PERMISSION")]
    grant: Vec<String>,

    /// Do not start the interrupt scanner
    #[arg(long)]
    no_interrupts: bool,
}

fn parse_breakpoint(raw: &str) -> std::result::Result<(Option<String>, u32), String> {
    let (file, line) = match raw.rsplit_once(':') {
        Some((file, line)) => (Some(file.to_string()), line),
        None => (None, raw),
    };
    let line = line
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid line number in '{}'", raw))?;
    Ok((file, line))
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args),
        Command::Check { program } => {
            init_tracing("warn");
            check(program)
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    init_tracing(&config.logging.level);

    let grants = Permission::from_names(&args.grant)?;
    let policy = config.security_policy()?.with_permissions(grants);
    info!(permissions = %policy.permissions().describe(), "Security policy");

    let document = ScriptDocument::load(&args.program)
        .with_context(|| format!("loading {}", args.program.display()))?;
    let file = document.program.file.clone();

    let matcher = Arc::new(DryRunMatcher::new(args.visible.iter().cloned()));
    let input = Arc::new(InputGate::new(Arc::new(DryRunInput)));
    let automation = Automation::new(matcher, input).with_wait_settings(config.wait_settings());

    let mut builder = RunSession::builder(document, policy, automation)
        .scanner_config(config.scanner_config());
    if let Some(main) = &args.main_flow {
        builder = builder.main_flow(main.clone());
    }
    if args.no_interrupts {
        builder = builder.without_interrupts();
    }

    let debugger = (!args.breakpoints.is_empty()).then(|| Arc::new(Debugger::new()));
    if let Some(debugger) = &debugger {
        for (bp_file, line) in &args.breakpoints {
            let bp = debugger.add_breakpoint(bp_file.clone().unwrap_or_else(|| file.clone()), *line);
            info!(id = %bp.id, location = %bp.location, "Breakpoint set");
        }
        builder = builder.debugger(debugger.clone());
    }

    let session = Arc::new(builder.build());
    let result = match debugger {
        Some(debugger) => console::run_with_console(session, debugger)?,
        None => session.run(),
    };

    let value = result?;
    println!("{}", value);
    Ok(())
}

fn check(path: PathBuf) -> Result<()> {
    let document =
        ScriptDocument::load(&path).with_context(|| format!("loading {}", path.display()))?;
    let program = &document.program;

    println!("file: {}", program.file);
    match program.main() {
        Some(main) => println!("main: {}", main.name),
        None => println!("main: (none)"),
    }
    println!("constants:");
    for constant in &program.constants {
        println!("  {}", constant.name);
    }
    println!("flows:");
    for flow in &program.flows {
        println!("  {}({}) - {} statements", flow.name, flow.params.join(", "), flow.body.len());
    }
    println!("interrupts:");
    for rule in &document.interrupts {
        let state = if rule.enabled { "" } else { " (disabled)" };
        println!("  [{}] {} on {}{}", rule.priority, rule.id, rule.trigger, state);
    }

    let problems = document.validate();
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("error: {}", problem);
        }
        bail!("{} problem(s) in {}", problems.len(), path.display());
    }
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_breakpoint() {
        assert_eq!(parse_breakpoint("farm.ra:12"), Ok((Some("farm.ra".to_string()), 12)));
        assert_eq!(parse_breakpoint("7"), Ok((None, 7)));
        assert!(parse_breakpoint("farm.ra:x").is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "retroauto", "run", "farm.yaml", "--break", "farm.ra:3", "--visible", "popup",
            "--grant", "input_control", "--no-interrupts",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.breakpoints, vec![(Some("farm.ra".to_string()), 3)]);
        assert_eq!(args.visible, vec!["popup"]);
        assert!(args.no_interrupts);
    }
}
