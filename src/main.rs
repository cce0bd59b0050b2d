// main.rs - Command line front end and REPL

use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crucible::compiler::{self, ThreadingModel};
use crucible::interpreter::{State, VirtualMachine};

#[derive(Parser)]
#[command(name = "crucible", version, about = "Forth interpreter and ULP cross-compiler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute the input forth files, then cross-compile the word MAIN
    Build {
        /// Emit assembly for the standard assemblers
        #[arg(long)]
        assembly: bool,
        /// Emit assembly in the dialect of the custom assembler
        #[arg(long, conflicts_with = "assembly")]
        custom_assembly: bool,
        /// Use the subroutine threading model, faster but larger
        #[arg(long)]
        subroutine: bool,
        /// Bytes reserved for the program on the target, passed through
        /// to the downstream assembler
        #[arg(short, long, default_value_t = 8176)]
        reserved: usize,
        /// Name of the output file
        #[arg(long)]
        output: Option<PathBuf>,
        files: Vec<PathBuf>,
    },
    /// Execute the input forth files, then start an interpreter
    Run { files: Vec<PathBuf> },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Build {
            assembly,
            custom_assembly,
            subroutine,
            reserved,
            output,
            files,
        } => build(assembly, custom_assembly, subroutine, reserved, output, files),
        Command::Run { files } => run(files),
    };
    if let Err(err) = result {
        eprintln!("{:#}", err);
        process::exit(1);
    }
}

fn load_files(vm: &mut VirtualMachine, files: &[PathBuf]) -> Result<()> {
    for path in files {
        let source = fs::read(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        vm.interpret(&source)
            .with_context(|| format!("error while executing {}", path.display()))?;
    }
    Ok(())
}

fn build(
    assembly: bool,
    _custom_assembly: bool,
    subroutine: bool,
    _reserved: usize,
    output: Option<PathBuf>,
    files: Vec<PathBuf>,
) -> Result<()> {
    let mut vm = VirtualMachine::new()?;
    load_files(&mut vm, &files)?;
    let model = if subroutine {
        ThreadingModel::Subroutine
    } else {
        ThreadingModel::Token
    };
    let text = compiler::build_assembly(&mut vm, "MAIN", model)
        .context("could not cross-compile MAIN")?;
    let output = output.unwrap_or_else(|| {
        if assembly {
            PathBuf::from("out.S")
        } else {
            PathBuf::from("out.nonportable.S")
        }
    });
    fs::write(&output, text)
        .with_context(|| format!("could not write {}", output.display()))?;
    Ok(())
}

fn run(files: Vec<PathBuf>) -> Result<()> {
    let mut vm = VirtualMachine::new()?;
    load_files(&mut vm, &files)?;
    println!("crucible");

    let mut rl = DefaultEditor::new().context("unable to start the line editor")?;
    let history = dirs::home_dir().map(|mut path| {
        path.push(".crucible_history");
        path
    });
    if let Some(path) = &history {
        let _ = rl.load_history(path);
    }

    loop {
        if vm.state()? == State::Exit {
            break;
        }
        match rl.readline("") {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                // park the cursor after the input so ok lands inline
                if !line.is_empty() {
                    print!("\x1b[A\x1b[{}C", line.len());
                }
                match vm.interpret(line.as_bytes()) {
                    Ok(()) => println!(" ok"),
                    Err(err) => {
                        println!();
                        println!("{}", err);
                        vm.reset();
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // an interrupt clears the stacks but keeps the session
                println!("^C");
                vm.reset();
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => return Err(err).context("line editor failure"),
        }
    }

    if let Some(path) = &history {
        let _ = rl.save_history(path);
    }
    Ok(())
}
