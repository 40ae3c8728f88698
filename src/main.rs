// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser};

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Generate(args)) => commands::cmd_generate(&args),
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_verifies() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_flags() {
        let cli = Cli::try_parse_from([
            "portconv",
            "generate",
            "--to",
            "/out",
            "--tree",
            "/a",
            "--tree",
            "/b",
            "-p",
            "dev-libs/foo",
            "--disable-use-flag",
            "test",
            "--override",
            "--enable-stage4",
            "--with-portage-pkg",
            "--jobs",
            "2",
            "--debug",
        ])
        .unwrap();
        assert!(cli.debug);

        let Some(Commands::Generate(args)) = cli.command else {
            panic!("expected generate");
        };
        let options = args.to_options();
        assert_eq!(options.target_dir, std::path::PathBuf::from("/out"));
        assert_eq!(options.trees.len(), 2);
        assert_eq!(options.packages, vec!["dev-libs/foo"]);
        assert_eq!(options.disable_use_flags, vec!["test"]);
        assert!(options.override_existing);
        assert!(options.enable_stage4);
        assert!(options.with_portage_pkgs);
        assert!(!options.disable_stage2);
        assert_eq!(options.jobs, Some(2));
    }

    #[test]
    fn test_missing_to_is_rejected() {
        let cli = Cli::try_parse_from(["portconv", "generate", "--tree", "/a"]).unwrap();
        let Some(Commands::Generate(args)) = cli.command else {
            panic!("expected generate");
        };
        assert!(args.to_options().validate().is_err());
    }
}
