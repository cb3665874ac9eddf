use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use xforms_itext::{apply_translations, export_translations, ApplyOptions, ExportOptions};

#[derive(Parser)]
#[command(name = "xforms-itext")]
#[command(author, version, about = "XForm itext translation export and import")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a form's <itext> translations as a tab-separated table
    Export {
        /// Path to the XForm document
        #[arg(short, long)]
        form: PathBuf,

        /// Output path for the table (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Restrict to these languages; may be repeated. The first one
        /// becomes the default language
        #[arg(short, long)]
        lang: Vec<String>,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },
    /// Apply a tab-separated translation table and re-emit the <itext> block
    Apply {
        /// Path to the XForm document
        #[arg(short, long)]
        form: PathBuf,

        /// Path to the tab-separated translation table
        #[arg(short, long)]
        translations: PathBuf,

        /// Output path for the regenerated block (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Restrict to these languages; may be repeated. The first one
        /// becomes the default language
        #[arg(short, long)]
        lang: Vec<String>,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            form,
            output,
            lang,
            verbose,
        } => {
            let options = ExportOptions {
                form_path: form,
                output_path: output,
                langs: lang,
                verbose,
            };

            export_translations(options)?;
        }
        Commands::Apply {
            form,
            translations,
            output,
            lang,
            verbose,
        } => {
            let options = ApplyOptions {
                form_path: form,
                translations_path: translations,
                output_path: output,
                langs: lang,
                verbose,
            };

            apply_translations(options)?;
        }
    }

    Ok(())
}
