//! Completions command - print a shell completion script

use crate::cli::args::Cli;
use crate::error::RepodexResult;
use clap::CommandFactory;
use clap_complete::Shell;

pub fn execute(shell: Shell) -> RepodexResult<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "repodex", &mut std::io::stdout());
    Ok(())
}
