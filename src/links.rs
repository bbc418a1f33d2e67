//! External form and policy links shown around the survey

use crate::consent::GLOBAL_COUNTRY;

/// Language used when a form has no translation for the requested one
pub const FALLBACK_LANGUAGE: &str = "en";

const FEEDBACK_FORMS: &[(&str, &str)] = &[
    ("es", "https://forms.gle/VgwrCWLcr9svjZg58"),
    ("en", "https://forms.gle/dk3qRqB7dH1E4LFs7"),
];

const REPORT_PROBLEM_FORMS: &[(&str, &str)] = &[
    (
        "es",
        "https://docs.google.com/forms/d/e/1FAIpQLSe2qR2U5lB31h7D3GeK-V3Q_uy9ZOAYQ1XiVJr5RzD3zWhNaA/viewform",
    ),
    (
        "en",
        "https://docs.google.com/forms/d/e/1FAIpQLSef77IOT4oxllZABL7aJlTGp6e6Q2_jPoDuIruiDxnU5Wvtxw/viewform",
    ),
];

const PRIVACY_POLICIES: &[(&str, &str)] = &[
    ("United States", "https://virufy.org/en/privacy_policy/"),
    (GLOBAL_COUNTRY, "https://virufy.org/en/privacy_policy/"),
];

fn lookup(table: &[(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, url)| *url)
}

/// Table entry for `key`, else for `fallback`
fn lookup_or(
    table: &[(&'static str, &'static str)],
    key: &str,
    fallback: &str,
) -> &'static str {
    lookup(table, key)
        .or_else(|| lookup(table, fallback))
        .unwrap_or_default()
}

/// Feedback form in `lang`, or in English when not translated
pub fn feedback_form(lang: &str) -> &'static str {
    lookup_or(FEEDBACK_FORMS, lang, FALLBACK_LANGUAGE)
}

/// Problem report form in `lang`, or in English when not translated
pub fn report_problem_form(lang: &str) -> &'static str {
    lookup_or(REPORT_PROBLEM_FORMS, lang, FALLBACK_LANGUAGE)
}

/// Privacy policy for `country`, or the global one
pub fn privacy_policy(country: &str) -> &'static str {
    lookup_or(PRIVACY_POLICIES, country, GLOBAL_COUNTRY)
}
