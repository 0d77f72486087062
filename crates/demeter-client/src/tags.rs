//! Tag noise filtering for repo summaries.
//!
//! Hub tag lists mix topical tags with machine-generated ones: ISO language
//! codes and namespaced markers like `license:apache-2.0`. Stored basic
//! metadata keeps only the topical tags.

/// ISO 639 language codes emitted as bare tags. Matching is by prefix, the
/// same rule as the namespaced markers.
pub const LANGUAGE_CODE_PREFIXES: &[&str] = &[
    "af", "am", "ar", "az", "be", "bg", "bn", "bs", "ca", "ceb", "co", "cs", "cy", "da", "de",
    "el", "en", "eo", "es", "et", "eu", "fa", "fi", "fr", "fy", "ga", "gd", "gl", "gu", "ha",
    "haw", "he", "hi", "hmn", "hr", "ht", "hu", "hy", "id", "ig", "is", "it", "iw", "ja", "jw",
    "ka", "kk", "km", "kn", "ko", "ku", "ky", "la", "lb", "lo", "lt", "lv", "mg", "mi", "mk",
    "ml", "mn", "mr", "ms", "mt", "my", "ne", "nl", "no", "ny", "or", "pa", "pl", "ps", "pt",
    "ro", "ru", "rw", "sd", "si", "sk", "sl", "sm", "sn", "so", "sq", "sr", "st", "su", "sv",
    "sw", "ta", "te", "tg", "th", "tk", "tl", "tr", "tt", "ug", "uk", "ur", "uz", "vi", "xh",
    "yi", "yo", "zh", "zu",
];

/// Drop tags starting with a language code or one of the variant's
/// namespace prefixes, preserving order.
pub fn filter_tags(tags: &[String], namespace_prefixes: &[&str]) -> Vec<String> {
    tags.iter()
        .filter(|tag| {
            !LANGUAGE_CODE_PREFIXES
                .iter()
                .chain(namespace_prefixes)
                .any(|prefix| tag.starts_with(prefix))
        })
        .cloned()
        .collect()
}
