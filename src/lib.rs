//! xforms-itext: the multi-language text-resource model of an XForm
//! form builder.
//!
//! This library implements the `<itext>` translation block: a store of
//! per-language, per-form translated strings with reference counting,
//! derived ids, deduplication, and synchronization against a form tree,
//! plus a tab-separated bulk translation format for translators.

pub mod bulk;
pub mod error;
pub mod model;
pub mod sync;
pub mod tree;
pub mod xform;

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Result;

pub use error::ItextError;
use model::{ItextModel, ItextRef};
use xform::{itext_block_to_string, parse_itext_block};

/// Options for exporting a form's translations to the tabular format
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Path to the XForm (or bare `<itext>` block) to read
    pub form_path: PathBuf,
    /// Output path for the tab-separated table (stdout when unset)
    pub output_path: Option<PathBuf>,
    /// Language whitelist; empty means "take the form's languages"
    pub langs: Vec<String>,
    /// Enable verbose output
    pub verbose: bool,
}

/// Options for applying a tabular translation file back onto a form's
/// `<itext>` block
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Path to the XForm (or bare `<itext>` block) to read
    pub form_path: PathBuf,
    /// Path to the tab-separated translation table
    pub translations_path: PathBuf,
    /// Output path for the regenerated `<itext>` block (stdout when unset)
    pub output_path: Option<PathBuf>,
    /// Language whitelist; empty means "take the form's languages"
    pub langs: Vec<String>,
    /// Enable verbose output
    pub verbose: bool,
}

fn read_form(path: &PathBuf) -> Result<String, ItextError> {
    fs::read_to_string(path).map_err(|source| ItextError::FormReadError {
        path: path.clone(),
        source,
    })
}

fn write_output(path: &Option<PathBuf>, content: &str) -> Result<(), ItextError> {
    match path {
        Some(path) => fs::write(path, content).map_err(|source| ItextError::OutputWriteError {
            path: path.clone(),
            source,
        }),
        None => {
            println!("{content}");
            Ok(())
        }
    }
}

fn id_map(items: &[ItextRef]) -> HashMap<String, ItextRef> {
    items
        .iter()
        .map(|item| (item.borrow().id.clone(), item.clone()))
        .collect()
}

/// Export a form's translations as a tab-separated table
pub fn export_translations(options: ExportOptions) -> Result<String> {
    let xml = read_form(&options.form_path)?;
    let mut model = ItextModel::new();
    let parsed = parse_itext_block(&xml, &mut model, &options.langs)?;

    for warning in &parsed.warnings {
        eprintln!("warning: {warning}");
    }
    if options.verbose {
        println!(
            "Parsed {} items in {} languages",
            parsed.items().len(),
            model.languages().len()
        );
    }

    let table = bulk::items_to_xls(parsed.items(), &model);
    write_output(&options.output_path, &table)?;
    Ok(table)
}

/// Apply a tab-separated translation table onto a form's `<itext>`
/// block and regenerate the block
pub fn apply_translations(options: ApplyOptions) -> Result<String> {
    let xml = read_form(&options.form_path)?;
    let table = fs::read_to_string(&options.translations_path).map_err(|source| {
        ItextError::TranslationsReadError {
            path: options.translations_path.clone(),
            source,
        }
    })?;

    let mut model = ItextModel::new();
    let parsed = parse_itext_block(&xml, &mut model, &options.langs)?;
    for warning in &parsed.warnings {
        eprintln!("warning: {warning}");
    }

    let stats = bulk::apply_xls_itext(&id_map(parsed.items()), &table, &model);
    for id in &stats.skipped_ids {
        eprintln!("warning: no item with id \"{id}\", row skipped");
    }
    if options.verbose {
        println!("Updated {} translation cells", stats.updated_cells);
    }

    let block = itext_block_to_string(&model, parsed.items())?;
    write_output(&options.output_path, &block)?;
    Ok(block)
}
