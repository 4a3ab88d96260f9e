// Document loader module
// Reads PDF files from a directory into page-level text records


use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use lopdf::Document;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Text extracted from a single PDF page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// Path of the PDF the page came from, as found in the input directory
    pub source_file: String,
    /// 1-based page number within the PDF
    pub page_number: u32,
    pub text: String,
}

/// What ingestion does with a file that cannot be parsed as a PDF
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseErrorPolicy {
    /// Log the failure, record it in the report and continue with the next file
    #[default]
    Skip,
    /// Fail the whole run on the first unreadable file
    Abort,
}

impl fmt::Display for ParseErrorPolicy {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Failed to read PDF directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse PDF {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// A file that was left out of the corpus because it could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

/// Every page loaded from a directory, plus the files that were skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedDocuments {
    pub pages: Vec<PageText>,
    pub files_loaded: usize,
    pub skipped: Vec<SkippedPdf>,
}

/// List the PDF files directly inside `dir`, sorted by path
///
/// Sub-directories are not descended into. The `.pdf` extension is matched
/// case-insensitively.
#[inline]
pub fn discover_pdf_files(dir: &Path) -> Result<Vec<PathBuf>, LoaderError> {
    let directory_error = |source| LoaderError::Directory {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(directory_error)? {
        let path = entry.map_err(directory_error)?.path();
        if path.is_file() && has_pdf_extension(&path) {
            files.push(path);
        }
    }

    files.sort();
    debug!("Discovered {} PDF files in {}", files.len(), dir.display());
    Ok(files)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Extract the text of every page of a single PDF
#[inline]
pub fn load_pdf(path: &Path) -> Result<Vec<PageText>, LoaderError> {
    let parse_error = |message: String| LoaderError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let document = Document::load(path).map_err(|e| parse_error(e.to_string()))?;

    if document.is_encrypted() {
        return Err(parse_error("document is encrypted".to_string()));
    }

    let source_file = path.display().to_string();
    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    let mut pages = Vec::with_capacity(page_numbers.len());

    for page_number in page_numbers {
        let text = document
            .extract_text(&[page_number])
            .map_err(|e| parse_error(format!("page {}: {}", page_number, e)))?;

        pages.push(PageText {
            source_file: source_file.clone(),
            page_number,
            text,
        });
    }

    debug!("Loaded {} pages from {}", pages.len(), source_file);
    Ok(pages)
}

/// Load every PDF in `dir`, applying `policy` to files that fail to parse
#[inline]
pub fn load_directory(dir: &Path, policy: ParseErrorPolicy) -> Result<LoadedDocuments, LoaderError> {
    let files = discover_pdf_files(dir)?;
    let mut loaded = LoadedDocuments::default();

    for file in files {
        info!("Processing {}...", file.display());

        match load_pdf(&file) {
            Ok(pages) => {
                loaded.pages.extend(pages);
                loaded.files_loaded += 1;
            }
            Err(e) => match policy {
                ParseErrorPolicy::Abort => return Err(e),
                ParseErrorPolicy::Skip => {
                    warn!("Skipping unreadable PDF: {}", e);
                    loaded.skipped.push(SkippedPdf {
                        path: file,
                        reason: e.to_string(),
                    });
                }
            },
        }
    }

    info!(
        "Loaded {} pages from {} PDFs ({} skipped)",
        loaded.pages.len(),
        loaded.files_loaded,
        loaded.skipped.len()
    );

    Ok(loaded)
}
