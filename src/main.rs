use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use segfs::ops::DebugReport;
use segfs::Filesystem;

mod cli;

fn print_tree(fs: &Filesystem) -> segfs::Result<()> {
    println!("/");
    for entry in fs.list()? {
        let indent = "  ".repeat(entry.depth + 1);
        if entry.is_directory {
            println!("{indent}{}/", entry.name);
        } else {
            println!("{indent}{}", entry.name);
        }
    }
    Ok(())
}

fn print_debug(fs: &Filesystem, fs_path: &str) -> segfs::Result<()> {
    for report in fs.debug(fs_path)? {
        match report {
            DebugReport::Directory(entries) => {
                for (name, inum) in entries {
                    println!("{name} -> inode {inum}");
                }
            }
            DebugReport::File { size, summary } => {
                println!("size: {size}");
                println!("direct: {}", summary.direct_count);
                println!("indirect: {}", summary.indirect_count);
                println!("double_indirect: {}", summary.double_indirect_count);
                println!("triple_indirect: {}", summary.triple_indirect_count);
                println!(
                    "first_block: {}",
                    summary.first_block.map_or("none".to_string(), |b| b.to_string())
                );
                println!(
                    "last_block: {}",
                    summary.last_block.map_or("none".to_string(), |b| b.to_string())
                );
            }
        }
    }
    Ok(())
}

/// Runs the selected operation against an already-open filesystem. Every
/// error returned here is an *operational* failure: the binary reports it
/// and still exits 0.
fn run_operation(args: &cli::Cli, fs: &Filesystem) -> segfs::Result<()> {
    if args.list {
        return print_tree(fs);
    }

    if let Some(fs_path) = args.add.as_deref() {
        // `requires = "file"` in the CLI's arg group guarantees this.
        let local_file = args.file.as_deref().expect("-a requires -f");
        let data = std::fs::read(local_file)?;
        return fs.add(fs_path, &data);
    }

    if let Some(fs_path) = args.remove.as_deref() {
        return fs.remove(fs_path);
    }

    if let Some(fs_path) = args.extract.as_deref() {
        let data = fs.extract(fs_path)?;
        std::io::stdout().write_all(&data)?;
        return Ok(());
    }

    if let Some(fs_path) = args.debug.as_deref() {
        return print_debug(fs, fs_path);
    }

    unreachable!("clap's mode ArgGroup requires exactly one of the above");
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match cli::Cli::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // clap has already written its own usage/diagnostic text.
            err.print().ok();
            return ExitCode::from(1);
        }
    };

    let root = match std::env::current_dir() {
        Ok(root) => root,
        Err(err) => {
            error!("failed to resolve current directory: {err}");
            eprintln!("segfs: {err}");
            return ExitCode::from(1);
        }
    };

    let fs = match Filesystem::open(&root) {
        Ok(fs) => fs,
        Err(err) => {
            error!("failed to initialise filesystem: {err}");
            eprintln!("segfs: {err}");
            return ExitCode::from(1);
        }
    };

    match run_operation(&args, &fs) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("segfs: {err}");
            ExitCode::SUCCESS
        }
    }
}
