use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(long = "env-file", global = true, help = "Load environment variables from this file instead of ./.env")]
    pub env_file: Option<PathBuf>,
    #[clap(short, long, global = true, help = "Log debug diagnostics")]
    pub verbose: bool,
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    #[clap(about = "Keep the local directory in sync until stopped (default)", display_order = 1)]
    Run,
    #[clap(about = "Run a single reconciliation cycle and exit", display_order = 2)]
    Once,
    #[clap(about = "Print the effective configuration as JSON (secrets hidden)", display_order = 3)]
    Config,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_is_the_default_command() {
        let cli = Cli::try_parse_from(["sftpfeed"]).expect("parse");
        assert_eq!(cli.command(), Commands::Run);
        assert!(!cli.verbose);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["sftpfeed", "once", "-v", "--env-file", "prod.env"])
            .expect("parse");
        assert_eq!(cli.command(), Commands::Once);
        assert!(cli.verbose);
        assert_eq!(cli.env_file, Some(PathBuf::from("prod.env")));
    }
}
