//! `mixtape` — the `-sr/-bpm/-tpb/-f/-e/-loglevel` front end (spec §6).
//!
//! Positional file arguments are an editor-buffer concern for a host this
//! crate doesn't implement; only the flags the core recognizes are parsed
//! here. `-f`/`-e` are the sole entry points: each evaluates a program and
//! prints the top of stack.

use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use mixtape_core::time::Transport;
use mixtape_core::{Error, Value};
use mixtape_runtime::{parse, register_all, Registry, Vm};
use tracing::info;

/// The spec's flags are single-dash (`-sr`, not `--sr`); clap's derive only
/// emits double-dash long options, so known single-dash flags are rewritten
/// to double-dash before parsing. Anything else (including a bare `-e`
/// positional typo) is left alone and surfaces as a normal clap error.
fn normalize_args(args: impl Iterator<Item = String>) -> Vec<String> {
    const KNOWN: &[&str] = &["sr", "bpm", "tpb", "f", "e", "loglevel"];
    args.map(|a| {
        if let Some(name) = a.strip_prefix('-') {
            if !name.starts_with('-') && KNOWN.contains(&name) {
                return format!("--{name}");
            }
        }
        a
    })
    .collect()
}

#[derive(Parser, Debug)]
#[command(name = "mixtape", version, about = "Mixtape audio synthesis DSL")]
struct Args {
    /// Sample rate in Hz.
    #[arg(long, default_value_t = 48000)]
    sr: u32,

    /// Tempo in beats per minute.
    #[arg(long, default_value_t = 120.0)]
    bpm: f64,

    /// Ticks per beat.
    #[arg(long, default_value_t = 96)]
    tpb: u32,

    /// Evaluate a file and print the top value, then exit.
    #[arg(long)]
    f: Option<PathBuf>,

    /// Evaluate inline source and print the top value, then exit.
    #[arg(long)]
    e: Option<String>,

    /// `debug|info|warn|error`.
    #[arg(long, default_value = "info")]
    loglevel: String,
}

fn init_logging(loglevel: &str) -> Result<(), String> {
    let level = match loglevel {
        "debug" | "info" | "warn" | "error" => loglevel,
        other => return Err(format!("-loglevel: expected debug|info|warn|error, got `{other}`")),
    };
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for target in ["mixtape_runtime", "mixtape_cli"] {
        if let Ok(directive) = format!("{target}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    Ok(())
}

/// Binds the root environment defaults from §6: `:sr :bpm :tpb :nf :freq
/// :phase :pw` plus the filter defaults `:cutoff :q :drive :blend`.
fn bind_env_defaults(vm: &mut Vm, transport: Transport) {
    vm.env.bind(":sr".into(), Value::Num(transport.sample_rate as f64));
    vm.env.bind(":bpm".into(), Value::Num(transport.bpm));
    vm.env.bind(":tpb".into(), Value::Num(transport.ticks_per_beat as f64));
    vm.env.bind(":nf".into(), Value::Num(transport.sample_rate as f64 * 60.0 / transport.bpm));
    vm.env.bind(":freq".into(), Value::Num(440.0));
    vm.env.bind(":phase".into(), Value::Num(0.0));
    vm.env.bind(":pw".into(), Value::Num(0.5));
    vm.env.bind(":cutoff".into(), Value::Num(1000.0));
    vm.env.bind(":q".into(), Value::Num(0.707));
    vm.env.bind(":drive".into(), Value::Num(1.0));
    vm.env.bind(":blend".into(), Value::Num(0.5));
}

fn run_program(vm: &mut Vm, file: &str, src: &str) -> Result<String, Error> {
    let program = parse(file, src)?;
    vm.eval(&program)?;
    let top = vm.peek().cloned().unwrap_or(Value::Nil);
    Ok(top.to_string())
}

fn main() -> ExitCode {
    let args = Args::parse_from(normalize_args(std::env::args()));
    if let Err(e) = init_logging(&args.loglevel) {
        eprintln!("mixtape: {e}");
        return ExitCode::from(2);
    }

    let transport = Transport::new(args.sr, args.bpm, args.tpb);
    let mut registry = Registry::new();
    register_all(&mut registry);

    let asset_dir = args.f.as_deref().and_then(|p| p.parent()).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let mut vm = Vm::new(Rc::new(registry), transport, asset_dir);
    bind_env_defaults(&mut vm, transport);

    let result = match (&args.f, &args.e) {
        (Some(path), _) => {
            info!(path = %path.display(), "evaluating file");
            std::fs::read_to_string(path)
                .map_err(|e| Error::Io { message: format!("{}: {e}", path.display()) })
                .and_then(|src| run_program(&mut vm, &path.display().to_string(), &src))
        }
        (None, Some(src)) => {
            info!("evaluating inline source");
            run_program(&mut vm, "-e", src)
        }
        (None, None) => {
            eprintln!("mixtape: nothing to do, pass -f <path> or -e <source>");
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(printed) => {
            println!("{printed}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("mixtape: {e}");
            ExitCode::FAILURE
        }
    }
}
