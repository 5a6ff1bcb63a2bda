use crate::config::Config;
use unicode_normalization::UnicodeNormalization;

/// Merge per-page sidecar text into the document sidecar.
///
/// Pages arrive in page order; pages without text (timeouts, psm modes that
/// disable recognition) contribute an empty slot so page boundaries stay
/// aligned with the source document. Each page is cleaned before joining so
/// the separator itself survives whitespace trimming.
pub fn merge_text(cfg: &Config, parts: Vec<String>) -> String {
    let cleaned: Vec<String> = parts.into_iter().map(|p| clean_page(cfg, p)).collect();

    let separator = if cfg.postprocess.page_separator_form_feed {
        "\u{0c}"
    } else {
        "\n"
    };
    let mut merged = cleaned.join(separator);
    if !merged.ends_with('\n') {
        merged.push('\n');
    }
    merged
}

fn clean_page(cfg: &Config, mut page: String) -> String {
    if cfg.postprocess.normalize_newlines {
        page = page.replace("\r\n", "\n");
    }

    if cfg.postprocess.normalize_unicode {
        page = page.nfkc().collect::<String>();
    }

    if cfg.postprocess.trim_trailing_whitespace {
        page = page
            .lines()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n");
    }

    if !page.ends_with('\n') {
        page.push('\n');
    }
    page
}
