//! Error types for xforms-itext

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or emitting Itext data
#[derive(Error, Debug)]
pub enum ItextError {
    #[error("Failed to read form file: {path}")]
    FormReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read translations file: {path}")]
    TranslationsReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse form XML")]
    XmlParseError {
        #[source]
        source: roxmltree::Error,
    },

    #[error("<translation> element is missing a lang attribute")]
    MissingTranslationLang,

    #[error("<text> element is missing an id attribute (translation lang: {lang})")]
    MissingTextId { lang: String },

    #[error("Failed to write output file: {path}")]
    OutputWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML generation error: {message}")]
    XmlGenerationError { message: String },
}
