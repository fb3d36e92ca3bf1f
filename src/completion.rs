//! Shell completion generation.
//!
//! `clap_complete::Shell` is the value enum on the CLI directly, so the
//! supported-shell list lives in one place.

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{generate, generate_to};
use std::io;

use crate::cli::{Cli, CompletionsArgs};

pub fn run(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    match args.out_dir {
        Some(dir) if !args.stdout => {
            std::fs::create_dir_all(&dir).context("create --out-dir")?;
            let path = generate_to(args.shell, &mut cmd, "imex", &dir)
                .context("generate completion file")?;
            eprintln!("Wrote completion to {}", path.display());
        }
        _ => generate(args.shell, &mut cmd, "imex", &mut io::stdout()),
    }
    Ok(())
}
