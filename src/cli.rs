//! Command-line surface: a single binary with five mutually exclusive
//! modes over the filesystem rooted at the current working directory.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

#[derive(Parser, Debug)]
#[command(author, version, about = "a user-space filesystem backed by segment container files")]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["list", "add", "remove", "extract", "debug"])
))]
pub struct Cli {
    /// Print the directory tree rooted at `/`.
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Add the contents of `-f <local_file>` at this filesystem path.
    #[arg(short = 'a', long, value_name = "FS_PATH", requires = "file")]
    pub add: Option<String>,

    /// Local source file consumed by `-a`.
    #[arg(short = 'f', long = "file", value_name = "LOCAL_FILE")]
    pub file: Option<PathBuf>,

    /// Remove the file or subtree at this filesystem path.
    #[arg(short = 'r', long, value_name = "FS_PATH")]
    pub remove: Option<String>,

    /// Write the contents of the file at this path to standard output.
    #[arg(short = 'e', long = "extract", value_name = "FS_PATH")]
    pub extract: Option<String>,

    /// Print the debug summary for this filesystem path.
    #[arg(short = 'D', long = "debug", value_name = "FS_PATH")]
    pub debug: Option<String>,
}
