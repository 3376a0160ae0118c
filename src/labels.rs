//! Localized strings for page headers and the markdown summary.
//!
//! Every human-readable label that ends up in an artifact lives here, keyed by
//! the primary recognition language. Callers can override the derived set via
//! [`crate::config::ExtractionConfigBuilder::labels`].

use serde::{Deserialize, Serialize};

/// Human-readable labels used when assembling text and markdown artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    /// Word used in page headers: `--- {page} 3 ---`.
    pub page: String,
    /// Markdown summary label for the page count.
    pub total_pages: String,
    /// Markdown summary label for the token count.
    pub words_detected: String,
    /// Markdown summary label for the completion timestamp.
    pub date: String,
}

impl Labels {
    /// Labels for a tesseract language code such as `spa` or `spa+eng`.
    ///
    /// Only the first language of a `+`-joined code is considered. Unknown
    /// codes fall back to English.
    pub fn for_language(code: &str) -> Self {
        let primary = code.split('+').next().unwrap_or(code).trim();
        let (page, total_pages, words_detected, date) = match primary {
            "spa" => ("Página", "Total de páginas", "Palabras detectadas", "Fecha"),
            "fra" => ("Page", "Nombre de pages", "Mots détectés", "Date"),
            "deu" => ("Seite", "Seiten gesamt", "Erkannte Wörter", "Datum"),
            "por" => ("Página", "Total de páginas", "Palavras detectadas", "Data"),
            "ita" => ("Pagina", "Pagine totali", "Parole rilevate", "Data"),
            _ => ("Page", "Total pages", "Words detected", "Date"),
        };
        Self {
            page: page.to_string(),
            total_pages: total_pages.to_string(),
            words_detected: words_detected.to_string(),
            date: date.to_string(),
        }
    }

    /// Render the header line that opens a page section in the full text.
    pub fn page_header(&self, page_num: usize) -> String {
        format!("--- {} {} ---", self.page, page_num)
    }
}

impl Default for Labels {
    fn default() -> Self {
        Self::for_language("eng")
    }
}
