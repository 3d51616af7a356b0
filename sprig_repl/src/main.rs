use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context;
use clap::Parser;
use codesnake::{Block, CodeWidth, Label, LineIndex};
use sprig::{Error, Host, Interpreter, Key, Options, SyntaxError, Value};
use yansi::Paint;

/// Runs a sprig program, or evaluates forms from a prompt
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Program to run once instead of starting a prompt
    script: Option<PathBuf>,
    /// Report how long the program took
    #[arg(long)]
    time: bool,
    /// Start without the core library
    #[arg(long)]
    no_core: bool,
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // silent unless asked for
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn make_block<'a>(idx: &'a LineIndex, error: &SyntaxError) -> Option<Block<&'a str, String>> {
    Block::new(
        idx,
        [Label::new(error.span.clone())
            .with_text(error.kind.to_string().red().to_string())
            .with_style(|s| s.red().to_string())],
    )
}

fn report_syntax(source: &str, origin: &str, error: &SyntaxError) {
    let idx = LineIndex::new(source);
    let block = (!error.span.is_empty())
        .then(|| make_block(&idx, error))
        .flatten()
        .map(|block| block.map_code(|c| CodeWidth::new(c, c.len())));
    match block {
        Some(block) => {
            println!("{}[{origin}]", block.prologue());
            print!("{block}");
            println!("{}", block.epilogue());
        }
        None => println!("{}", error.to_string().red()),
    }
}

fn run_script(interpreter: &Interpreter, path: &Path, time: bool) -> anyhow::Result<ExitCode> {
    let source = std::fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))?;
    if let Err(error) = interpreter.read_all(&source) {
        report_syntax(&source, &path.display().to_string(), &error);
        return Ok(ExitCode::FAILURE);
    }

    let args = if time {
        Value::map([(Key::from(Value::string("time")), Value::Bool(true))].into_iter().collect())
    } else {
        Value::Nil
    };
    let report = interpreter.run(&source, args);
    print!("{}", report.message);
    if let Some(elapsed) = report.elapsed {
        eprintln!("{} {elapsed:?}", "elapsed".dim());
    }
    Ok(if report.ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn repl(interpreter: &Interpreter) -> anyhow::Result<()> {
    let mut readline = rustyline::DefaultEditor::new()?;
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { ">> " } else { ".. " };
        let Ok(line) = readline.readline(prompt) else {
            break;
        };
        buffer.push_str(&line);
        buffer.push('\n');
        // keep reading until the forms and strings are closed
        if interpreter.read_all(&buffer).is_err_and(|error| error.is_incomplete()) {
            continue;
        }

        let source = std::mem::take(&mut buffer);
        if source.trim().is_empty() {
            continue;
        }
        _ = readline.add_history_entry(source.trim_end());

        match interpreter.eval_str(&source) {
            Ok(value) => {
                print!("{}", interpreter.take_output());
                println!("{}", interpreter.print(&value, true).green());
            }
            Err(Error::Syntax(error)) => report_syntax(&source, "repl", &error),
            Err(error) => {
                print!("{}", interpreter.take_output());
                println!("{}", error.to_string().red());
            }
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    let args = Args::parse();

    let mut options = Options::default();
    if args.no_core {
        options = options.without_preload();
    }
    let interpreter = Interpreter::new(options, Host::default()).context("could not start the interpreter")?;

    match &args.script {
        Some(path) => run_script(&interpreter, path, args.time),
        None => repl(&interpreter).map(|()| ExitCode::SUCCESS),
    }
}
