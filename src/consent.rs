//! Consent document lookup by country and language

/// Country used when nothing more specific is available
pub const GLOBAL_COUNTRY: &str = "Global";

const DEFAULT_FILE: &str = "default.html";

/// Country to the consent files published for it
const CONSENT_FILES: &[(&str, &[&str])] = &[
    (GLOBAL_COUNTRY, &[DEFAULT_FILE]),
    ("Saudi arabia", &["ar.html"]),
    ("United States", &[DEFAULT_FILE, "en.html", "es.html"]),
];

/// A resolved consent document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentDocument {
    pub country: &'static str,
    pub file: &'static str,
    pub url: String,
}

fn files_for(country: &str) -> Option<(&'static str, &'static [&'static str])> {
    CONSENT_FILES
        .iter()
        .find(|(name, _)| *name == country)
        .copied()
}

/// Resolve the consent document for `country` in `lang`.
///
/// Falls back to the country's `default.html`, then to the global default.
pub fn consent_document(base_url: &str, country: &str, lang: &str) -> ConsentDocument {
    let wanted = format!("{lang}.html");
    let (country, file) = files_for(country)
        .and_then(|(name, files)| {
            files
                .iter()
                .find(|f| **f == wanted)
                .or_else(|| files.iter().find(|f| **f == DEFAULT_FILE))
                .map(|f| (name, *f))
        })
        .unwrap_or((GLOBAL_COUNTRY, DEFAULT_FILE));

    let base = base_url.trim_end_matches('/');
    ConsentDocument {
        country,
        file,
        url: format!("{base}/static/consent/{country}/{file}"),
    }
}

/// Countries with published consent documents
pub fn countries() -> impl Iterator<Item = &'static str> {
    CONSENT_FILES.iter().map(|(name, _)| *name)
}
