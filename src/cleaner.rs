use crate::dom;
use kuchikiki::NodeRef;

/// Boilerplate removed before content selection.
const BOILERPLATE_SELECTORS: &[&str] = &[
    "script",
    "style",
    "nav",
    "header",
    "footer",
    ".advertisement",
    ".ad",
    ".ads",
    r#"[class^="ad-"]"#,
    r#"[class*=" ad-"]"#,
    r#"[id^="ad-"]"#,
    ".popup",
    ".modal",
    ".cookie-banner",
    "#cookie-banner",
    ".newsletter-signup",
    ".social-share",
    ".comments-section",
    "#comments",
];

/// Main-content candidates, highest priority first.
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    r#"[role="main"]"#,
    ".post-content",
    ".article-content",
    ".entry-content",
    ".content",
    ".main-content",
];

/// Detach every boilerplate element. Returns how many were removed.
pub fn prune_boilerplate(document: &NodeRef) -> usize {
    let mut removed = 0;
    for selector in BOILERPLATE_SELECTORS {
        for node in dom::select_all(document, selector) {
            node.detach();
            removed += 1;
        }
    }
    removed
}

/// The first element matching a main-content selector, then `<body>`, then
/// the whole document.
pub fn select_main_content(document: &NodeRef) -> NodeRef {
    for selector in MAIN_CONTENT_SELECTORS {
        if let Some(found) = dom::select_first(document, selector) {
            tracing::debug!(selector, "selected main content");
            return found;
        }
    }

    dom::select_first(document, "body").unwrap_or_else(|| document.clone())
}
