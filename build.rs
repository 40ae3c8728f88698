// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Boolean switch
fn flag(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(long).action(ArgAction::SetTrue).help(help)
}

/// Repeatable valued option
fn repeated(id: &'static str, long: &'static str, value: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(long)
        .value_name(value)
        .action(ArgAction::Append)
        .help(help)
}

fn build_cli() -> Command {
    Command::new("portconv")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Portconv Contributors")
        .about("Convert ports-tree packages into binary-package build specs")
        .subcommand_required(false)
        .arg(flag("debug", "debug", "Enable debug logging"))
        .subcommand(
            Command::new("generate")
                .about("Generate target specs from source trees")
                .arg(
                    Arg::new("to")
                        .long("to")
                        .value_name("DIR")
                        .help("Target spec tree directory"),
                )
                .arg(repeated("tree", "tree", "DIR", "Source tree root").short('t'))
                .arg(repeated("pkg", "pkg", "ATOM", "Package atom to generate").short('p'))
                .arg(
                    Arg::new("rules")
                        .long("rules")
                        .value_name("FILE")
                        .help("Rules document (TOML)"),
                )
                .arg(repeated("reposcan_files", "reposcan-files", "FILE", "Additional reposcan JSON source"))
                .arg(repeated("disable_use_flag", "disable-use-flag", "FLAG", "USE flag disabled for every package"))
                .arg(flag("override", "override", "Regenerate specs that already exist"))
                .arg(flag("ignore_missing_deps", "ignore-missing-deps", "Drop unresolvable dependencies with a warning"))
                .arg(flag("continue_with_error", "continue-with-error", "Keep going when a package fails"))
                .arg(flag("disable_stage2", "disable-stage2", "Skip runtime dependency resolution"))
                .arg(flag("disable_stage3", "disable-stage3", "Skip build dependency resolution"))
                .arg(flag("enable_stage4", "enable-stage4", "Resolve post dependencies into runtime requires"))
                .arg(flag("disable_conflicts", "disable-conflicts", "Do not record ownership conflicts"))
                .arg(flag(
                    "layer4rdepends",
                    "layer4rdepends",
                    "Skip packages whose runtime dependencies already exist in the target tree",
                ))
                .arg(flag("with_portage_pkg", "with-portage-pkg", "Emit native-category packages instead of expanding them"))
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .value_name("N")
                        .help("Number of parallel workers"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("portconv.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
