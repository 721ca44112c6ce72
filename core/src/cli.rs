use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::task::LocalSet;
use tracing::instrument;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::markup;
use crate::orchestrator::ExecutionResult;
use crate::patch::{self, Edit, Strategy};
use crate::path::{self, StructuralAddress};
use crate::session::EditorSession;
use crate::syntax::offset_to_line_col;
use crate::transpiler::Transpiler;
use crate::types::SourceDocument;

#[derive(Parser)]
#[command(name = "loupe")]
#[command(about = "Loupe - run UI component source and edit it through its rendered output", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides LOUPE_CONFIG_PATH and ./loupe.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Interpreter step budget (overrides config file and env vars)
    #[arg(long, global = true)]
    pub max_steps: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the compiled JavaScript for a component file
    Transpile {
        file: PathBuf,
    },

    /// Execute and render a component, printing its HTML
    Run {
        file: PathBuf,
    },

    /// Print the returned markup's syntax tree as JSON
    Tree {
        file: PathBuf,
    },

    /// Show the source element an address resolves to
    Resolve {
        file: PathBuf,

        /// Structural address, e.g. "div[0] > h2[0]"
        address: String,
    },

    /// Replace the text of an element
    PatchText {
        file: PathBuf,

        address: String,

        text: String,

        #[command(flatten)]
        output: PatchOutput,
    },

    /// Set one inline style property of an element
    PatchStyle {
        file: PathBuf,

        address: String,

        /// Property in camelCase, e.g. backgroundColor
        property: String,

        value: String,

        #[command(flatten)]
        output: PatchOutput,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args)]
pub struct PatchOutput {
    /// Write the result back to the file instead of printing it
    #[arg(short = 'w', long = "write")]
    pub write: bool,

    /// Use the legacy text-search strategy
    #[arg(long)]
    pub heuristic: bool,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load configuration before any command so config errors surface first
    let config = Config::builder()
        .config_path(cli.config.clone())
        .max_steps(cli.max_steps)
        .build()?;
    init_logging(&config);

    match cli.command {
        Commands::Transpile { file } => {
            let source = read_source(&file)?;
            let transpiler = Transpiler::new();
            transpiler.ready().await;
            let compiled = transpiler.transpile(&source)?;
            print!("{}", compiled.code);
        }

        Commands::Run { file } => {
            let source = read_source(&file)?;
            LocalSet::new().run_until(run_component(&config, source)).await?;
        }

        Commands::Tree { file } => {
            let source = read_source(&file)?;
            let tree = markup::parse(&source)?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }

        Commands::Resolve { file, address } => {
            let source = read_source(&file)?;
            let address: StructuralAddress = address.parse()?;
            let tree = markup::parse(&source)?;
            let node = path::resolve(&address, &tree)?;
            let span = tree.absolute(node.span);
            let (line, column) = offset_to_line_col(&source, span.start);
            println!("Address: {}", address);
            println!("Tag: {}", node.tag);
            println!("Span: {}..{} (line {}, column {})", span.start, span.end, line, column);
            println!("\n{}", span.slice(&source));
        }

        Commands::PatchText {
            file,
            address,
            text,
            output,
        } => {
            patch_file(&config, &file, &address, Edit::Text(text), &output)?;
        }

        Commands::PatchStyle {
            file,
            address,
            property,
            value,
            output,
        } => {
            patch_file(&config, &file, &address, Edit::Style { property, value }, &output)?;
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // a subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_source(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

#[instrument(skip(config, source))]
async fn run_component(config: &Config, source: String) -> Result<()> {
    let config = Config {
        debounce_ms: 0,
        ..config.clone()
    };
    let mut session = EditorSession::new(&config);
    session.on_source_changed(source);

    match session.settled().await {
        Some(ExecutionResult::Success(executed)) => {
            for line in &executed.console {
                eprintln!("[{:?}] {}", line.level, line.message);
            }
            if let Some(dom) = session.dom() {
                println!("{}", dom.to_html());
            }
            Ok(())
        }
        Some(ExecutionResult::Failure { message, .. }) => bail!(message),
        Some(ExecutionResult::Pending) | None => bail!("execution did not complete"),
    }
}

#[instrument(skip(config, file, edit, output), fields(file = %file.display()))]
fn patch_file(
    config: &Config,
    file: &Path,
    address: &str,
    edit: Edit,
    output: &PatchOutput,
) -> Result<()> {
    let doc = SourceDocument::new(read_source(file)?);
    let address: StructuralAddress = address.parse()?;
    let strategy = if output.heuristic {
        Strategy::Heuristic
    } else {
        config.patch_strategy
    };

    let next = patch::try_apply(&doc, &address, &edit, strategy)?;
    if output.write {
        std::fs::write(file, next.text())
            .with_context(|| format!("Failed to write {}", file.display()))?;
        eprintln!("✓ Patched {} ({})", file.display(), address);
    } else {
        print!("{}", next.text());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_patch_style_with_flags() {
        let cli = Cli::parse_from([
            "loupe",
            "--max-steps",
            "500",
            "patch-style",
            "App.jsx",
            "div[0] > h2[0]",
            "color",
            "red",
            "--write",
            "--heuristic",
        ]);
        assert_eq!(cli.max_steps, Some(500));
        let Commands::PatchStyle {
            address,
            property,
            output,
            ..
        } = cli.command
        else {
            panic!("Expected patch-style command");
        };
        assert_eq!(address, "div[0] > h2[0]");
        assert_eq!(property, "color");
        assert!(output.write && output.heuristic);
    }

    #[test]
    fn test_patch_file_writes_in_place() {
        let file = std::env::temp_dir().join(format!("loupe-{}.jsx", uuid::Uuid::new_v4()));
        std::fs::write(&file, "const A = () => <p>old</p>;").unwrap();
        let output = PatchOutput {
            write: true,
            heuristic: false,
        };
        patch_file(
            &Config::default(),
            &file,
            "p[0]",
            Edit::Text("new".into()),
            &output,
        )
        .unwrap();
        let written = std::fs::read_to_string(&file).unwrap();
        std::fs::remove_file(&file).ok();
        assert_eq!(written, "const A = () => <p>new</p>;");
    }

    #[test]
    fn test_patch_file_reports_missing_target() {
        let file = std::env::temp_dir().join(format!("loupe-{}.jsx", uuid::Uuid::new_v4()));
        std::fs::write(&file, "const A = () => <p>old</p>;").unwrap();
        let output = PatchOutput {
            write: true,
            heuristic: false,
        };
        let err = patch_file(&Config::default(), &file, "h1[0]", Edit::Text("x".into()), &output)
            .unwrap_err();
        let untouched = std::fs::read_to_string(&file).unwrap();
        std::fs::remove_file(&file).ok();
        assert!(err.to_string().starts_with("NotFound"));
        assert_eq!(untouched, "const A = () => <p>old</p>;");
    }
}
