use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dwarf-hydra")]
#[command(author, version, about = "Generate hydras struct definitions from DWARF debug info")]
#[command(
    long_about = "dwarf-hydra reads the DWARF debugging information of a binary, resolves the \
layouts of the selected structs across all compilation units, and emits them as hydras \
definitions with every padding byte made explicit.\n\n\
Example:\n  dwarf-hydra generate ./firmware.elf -w '^Packet' -o packets.py"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a hydras module for the selected structs
    Generate {
        /// Path to the binary file to read
        #[arg(value_name = "BINARY")]
        binary: PathBuf,

        /// Select structs whose name matches this regex at its start (repeatable)
        #[arg(short, long = "whitelist", value_name = "PATTERN")]
        whitelist: Vec<String>,

        /// Write the module to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Path to config file (defaults to .dwarf-hydra.yaml if present)
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,

        /// Omit the `from hydras import *` line
        #[arg(long)]
        no_preamble: bool,
    },

    /// Report the padding of the selected structs
    Padding {
        /// Path to the binary file to read
        #[arg(value_name = "BINARY")]
        binary: PathBuf,

        /// Select structs whose name matches this regex at its start (repeatable)
        #[arg(short, long = "whitelist", value_name = "PATTERN")]
        whitelist: Vec<String>,

        /// Output format (table, json)
        #[arg(short, long, value_enum, default_value = "table")]
        format: ReportFormat,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Path to config file (defaults to .dwarf-hydra.yaml if present)
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Table,
    Json,
}
