use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
};

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use prost::Message;
use protoc_gen_rain::{generate, request_parameter, Config};
use tracing_subscriber::EnvFilter;

/// Generates serde models and HTTP route bindings. Invoked by `protoc` as a plugin.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct Args {
    /// Read the encoded CodeGeneratorRequest from a file instead of stdin.
    #[clap(long, value_name = "PATH", value_parser)]
    input: Option<PathBuf>,
    /// Write the encoded CodeGeneratorResponse to a file instead of stdout.
    #[clap(long, value_name = "PATH", value_parser)]
    output: Option<PathBuf>,
}

pub fn main() -> Result<()> {
    miette::set_panic_hook();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let request = match &args.input {
        Some(path) => fs::read(path).into_diagnostic()?,
        None => {
            let mut request = Vec::new();
            io::stdin().read_to_end(&mut request).into_diagnostic()?;
            request
        }
    };

    let config = Config::from_env(&request_parameter(&request)?)?;
    let response = generate(&request, &config)?.encode_to_vec();

    match &args.output {
        Some(path) => fs::write(path, response).into_diagnostic()?,
        None => io::stdout().write_all(&response).into_diagnostic()?,
    }
    Ok(())
}
