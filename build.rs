//! Generates man pages and shell completions for the localmcp CLI.
//!
//! Output lands in $OUT_DIR/man and $OUT_DIR/completions. Skipped in debug
//! builds unless LOCALMCP_GEN_ARTIFACTS is set. src/cli.rs is pulled in with
//! include!() because build scripts cannot link the crate they build.

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::Shell;

include!("src/cli.rs");

const BIN_NAME: &str = "localmcp";

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed=LOCALMCP_GEN_ARTIFACTS");

    let requested = std::env::var_os("LOCALMCP_GEN_ARTIFACTS").is_some();
    let release = std::env::var("PROFILE").is_ok_and(|p| p == "release");
    if !(requested || release) {
        return Ok(());
    }

    let out_dir = PathBuf::from(std::env::var_os("OUT_DIR").ok_or_else(|| io::Error::other("OUT_DIR not set"))?);
    write_man_pages(&out_dir.join("man"))?;
    write_completions(&out_dir.join("completions"))
}

/// localmcp.1 plus one localmcp-<subcommand>.1 per subcommand
fn write_man_pages(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let cli = Cli::command();
    render_man(cli.clone(), &dir.join(format!("{BIN_NAME}.1")))?;

    for sub in cli.get_subcommands().filter(|s| s.get_name() != "help") {
        // Command names must be 'static without clap's `string` feature
        let page: &'static str = format!("{BIN_NAME}-{}", sub.get_name()).leak();
        render_man(sub.clone().name(page), &dir.join(format!("{page}.1")))?;
    }
    Ok(())
}

fn render_man(cmd: clap::Command, path: &Path) -> io::Result<()> {
    let mut page = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut page)?;
    std::fs::write(path, page)
}

fn write_completions(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut cli = Cli::command();
    for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
        clap_complete::generate_to(shell, &mut cli, BIN_NAME, dir)?;
    }
    Ok(())
}
