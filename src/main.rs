use clap::Parser;
use js2c::cli;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "js2c")]
#[command(about = "Translates a statically analyzable JavaScript subset into a self-contained C89 program")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Translate an AST JSON file to a C translation unit
    #[command(alias = "t")]
    Translate {
        /// Input AST JSON file
        input: PathBuf,

        /// Output C file name (optional)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse an AST JSON file and echo it back normalized
    #[command(alias = "c")]
    CheckAst {
        /// Input AST JSON file
        input: PathBuf,

        /// Output JSON file name (optional)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Translate { input, output } => {
            cli::translate(input, output)?;
        }
        Commands::CheckAst { input, output } => {
            cli::check_ast(input, output)?;
        }
        Commands::Version => {
            cli::version()?;
        }
    }

    Ok(())
}
