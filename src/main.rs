use clap::{Parser, Subcommand};

mod commands;
mod output;
mod tty;

use commands::{deploy, playground};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "shipyard")]
#[command(version = VERSION)]
#[command(about = "Release and playground test automation for a scaffolding repository")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, verify, commit, version, tag, push and publish the repository
    Deploy(deploy::DeployArgs),
    /// Build and test every generated sample project in the playground
    Playground(playground::PlaygroundArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let (json_result, exit_code) = commands::run_json(cli.command);
    if let Err(err) = output::print_json_result(json_result) {
        eprintln!("Error: {}", err.message);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
