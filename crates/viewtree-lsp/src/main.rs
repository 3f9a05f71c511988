//! viewtree-lsp - language server and command line checker for view.tree files

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tower_lsp::lsp_types::DiagnosticSeverity;

use viewtree_core::{parse, Config, WorkspaceScanner};
use viewtree_lsp::diagnostics::get_diagnostics;

#[derive(Parser)]
#[command(name = "viewtree-lsp")]
#[command(author, version, about = "Language server for view.tree files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path (default: viewtree.toml in the workspace root)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the language server over stdio (default)
    Serve,
    /// Report diagnostics for files and exit non-zero on errors
    Check {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Workspace root used to resolve components
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Scan a workspace and list its components
    Scan {
        #[arg(default_value = ".")]
        root: PathBuf,
    },
    /// Print the parse tree of a file as JSON
    Parse { file: PathBuf },
}

fn load_config(explicit: Option<&Path>, root: &Path) -> Result<Config> {
    let config = match explicit {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::discover(root)?,
    };
    Ok(config)
}

fn severity_label(severity: Option<DiagnosticSeverity>) -> &'static str {
    match severity {
        Some(DiagnosticSeverity::ERROR) => "error",
        Some(DiagnosticSeverity::WARNING) => "warning",
        Some(DiagnosticSeverity::HINT) => "hint",
        _ => "info",
    }
}

/// Returns the number of error diagnostics.
fn check(files: &[PathBuf], root: &Path, config: Config) -> Result<usize> {
    let scanner = WorkspaceScanner::new(root, config.scan.clone());
    scanner.full_scan();

    let mut errors = 0;
    for file in files {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        scanner.update_file(file, &text);

        let diagnostics = get_diagnostics(&text, &scanner.index(), &config.diagnostics);
        for d in &diagnostics {
            if d.severity == Some(DiagnosticSeverity::ERROR) {
                errors += 1;
            }
            println!(
                "{}:{}:{}: {}: {}",
                file.display(),
                d.range.start.line + 1,
                d.range.start.character + 1,
                severity_label(d.severity),
                d.message
            );
        }
    }
    Ok(errors)
}

fn scan(root: &Path, config: Config) {
    let scanner = WorkspaceScanner::new(root, config.scan);
    let summary = scanner.full_scan();
    let index = scanner.index();
    for name in index.components() {
        let file = index
            .defining_file(&name)
            .map(|f| f.strip_prefix(root).unwrap_or(f).display().to_string())
            .unwrap_or_default();
        println!("{name}\t{file}\t{} properties", index.properties_of(&name).len());
    }
    eprintln!(
        "{} components, {} view files, {} script files",
        summary.components, summary.primary_files, summary.secondary_files
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = match config_path {
                Some(path) => Config::load(path)?,
                None => Config::default(),
            };
            viewtree_lsp::run_lsp_server(config).await?;
        }
        Commands::Check { files, root } => {
            let config = load_config(config_path, &root)?;
            let errors = check(&files, &root, config)?;
            if errors > 0 {
                eprintln!("{errors} error(s)");
                std::process::exit(1);
            }
        }
        Commands::Scan { root } => {
            let config = load_config(config_path, &root)?;
            scan(&root, config);
        }
        Commands::Parse { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&parse(&text))?);
        }
    }

    Ok(())
}
