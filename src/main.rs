use std::path::PathBuf;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use lc3vm::output::{file_message, message, MsgColor};
use lc3vm::{Image, RunState, TermConsole};

/// lc3vm runs compiled LC3 `.obj` images on a simulated LC3 machine.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Program image to run: a big-endian origin word followed by program words
    path: PathBuf,
    /// Produce minimal output, suited for blackbox tests
    #[arg(short, long)]
    minimal: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    lc3vm::env::init();

    let minimal = args.minimal || lc3vm::env::is_minimal_forced();
    lc3vm::output::set_minimal(minimal);

    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .color(!minimal)
                .unicode(!minimal)
                .build(),
        )
    }))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(lc3vm::env::log_filter()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    run(&args.path)
}

fn run(path: &PathBuf) -> Result<()> {
    file_message(MsgColor::Green, "Loading", path);
    let image = Image::read(path)?;

    message(MsgColor::Green, "Running", "loaded image");
    let mut program = RunState::from_image(&image, TermConsole::new().into_diagnostic()?);
    let result = program.run();

    if !lc3vm::output::is_minimal() {
        program.console_mut().start_new_line().into_diagnostic()?;
    }
    let pc = program.pc();
    // Restore the terminal before printing anything else
    drop(program);

    match result {
        Ok(_) => {
            message(MsgColor::Cyan, "Halted", &format!("at 0x{pc:04x}"));
            file_message(MsgColor::Green, "Completed", path);
            Ok(())
        }
        Err(err) => {
            message(MsgColor::Red, "Faulted", "execution stopped");
            Err(err.into())
        }
    }
}
