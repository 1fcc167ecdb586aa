use crate::dom;
use kuchikiki::NodeRef;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Canonical metadata keys, in no particular output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKey {
    Title,
    Description,
    Author,
    Keywords,
    OgTitle,
    Url,
    Published,
}

impl MetaKey {
    pub fn as_str(self) -> &'static str {
        match self {
            MetaKey::Title => "title",
            MetaKey::Description => "description",
            MetaKey::Author => "author",
            MetaKey::Keywords => "keywords",
            MetaKey::OgTitle => "og_title",
            MetaKey::Url => "url",
            MetaKey::Published => "published",
        }
    }

    /// Map a `<meta name|property>` value to its canonical key.
    pub fn from_meta_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "description" | "og:description" => Some(MetaKey::Description),
            "author" | "og:author" => Some(MetaKey::Author),
            "keywords" => Some(MetaKey::Keywords),
            "og:title" => Some(MetaKey::OgTitle),
            "og:url" => Some(MetaKey::Url),
            "article:published_time" | "pubdate" => Some(MetaKey::Published),
            _ => None,
        }
    }
}

/// Document metadata in first-seen key order. The first value for a key wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: Vec<(MetaKey, String)>,
}

impl Metadata {
    /// Insert unless the key is already present. Returns whether it was added.
    pub fn insert_first(&mut self, key: MetaKey, value: String) -> bool {
        if self.get(key).is_some() {
            return false;
        }
        self.entries.push((key, value));
        true
    }

    pub fn get(&self, key: MetaKey) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetaKey, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key.as_str(), value)?;
        }
        map.end()
    }
}

pub fn extract_metadata(document: &NodeRef) -> Metadata {
    let mut metadata = Metadata::default();

    let title = dom::select_first(document, "head > title")
        .or_else(|| dom::select_first(document, "title"));
    if let Some(title) = title {
        let text = dom::normalize_whitespace(&title.text_contents());
        metadata.insert_first(MetaKey::Title, text);
    }

    for meta in dom::select_all(document, "meta") {
        let Some(name) = dom::attr(&meta, "name").or_else(|| dom::attr(&meta, "property")) else {
            continue;
        };
        let Some(key) = MetaKey::from_meta_name(&name) else {
            continue;
        };
        let content = dom::attr(&meta, "content").unwrap_or_default();
        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        if !metadata.insert_first(key, content.to_string()) {
            tracing::trace!(key = key.as_str(), "ignoring duplicate meta tag");
        }
    }

    metadata
}

/// YAML frontmatter block, or an empty string when there is nothing to list.
pub fn format_frontmatter(metadata: &Metadata) -> String {
    if metadata.is_empty() {
        return String::new();
    }

    let mut lines = vec!["---".to_string()];
    for (key, value) in metadata.iter() {
        lines.push(format!("{}: \"{}\"", key.as_str(), escape_yaml(value)));
    }
    lines.push("---".to_string());
    lines.push(String::new());

    lines.join("\n") + "\n"
}

/// Title heading plus the "Article Information" section. A blank title gets
/// no heading.
pub fn format_header(metadata: &Metadata) -> String {
    let mut lines = Vec::new();

    if let Some(title) = metadata.get(MetaKey::Title).filter(|t| !t.is_empty()) {
        lines.push(format!("# {}", title));
        lines.push(String::new());
    }

    let author = metadata.get(MetaKey::Author);
    let published = metadata.get(MetaKey::Published);
    let url = metadata.get(MetaKey::Url);

    if author.is_some() || published.is_some() || url.is_some() {
        lines.push("## Article Information".to_string());
        lines.push(String::new());

        if let Some(author) = author {
            lines.push(format!("**Author:** {}", author));
        }
        if let Some(published) = published {
            lines.push(format!("**Published:** {}", published));
        }
        if let Some(url) = url {
            lines.push(format!("**Original URL:** {}", url));
        }
        lines.push(String::new());

        if let Some(description) = metadata.get(MetaKey::Description) {
            lines.push(format!("**Description:** {}", description));
            lines.push(String::new());
        }
    }

    if lines.is_empty() {
        String::new()
    } else {
        lines.join("\n") + "\n"
    }
}

fn escape_yaml(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Metadata {
        extract_metadata(&dom::parse_html(html))
    }

    #[test]
    fn title_is_whitespace_normalized() {
        let md = extract("<html><head><title>\n  My   Great\tPage </title></head></html>");
        assert_eq!(md.get(MetaKey::Title), Some("My Great Page"));
    }

    #[test]
    fn blank_title_is_kept_empty() {
        let md = extract("<html><head><title> \n </title></head></html>");
        assert_eq!(md.get(MetaKey::Title), Some(""));
        assert_eq!(format_frontmatter(&md), "---\ntitle: \"\"\n---\n\n");
        assert_eq!(format_header(&md), "");
    }

    #[test]
    fn meta_mapping_and_first_wins() {
        let md = extract(
            r#"<head>
                <meta property="og:description" content="first">
                <meta name="description" content="second">
                <meta name="author" content="Ada">
                <meta property="og:title" content="OG">
                <meta property="og:url" content="https://example.com/a">
                <meta property="article:published_time" content="2024-01-02">
                <meta name="pubdate" content="1999-01-01">
                <meta name="keywords" content="rust, html">
                <meta name="viewport" content="width=device-width">
            </head>"#,
        );

        assert_eq!(md.get(MetaKey::Description), Some("first"));
        assert_eq!(md.get(MetaKey::Author), Some("Ada"));
        assert_eq!(md.get(MetaKey::OgTitle), Some("OG"));
        assert_eq!(md.get(MetaKey::Url), Some("https://example.com/a"));
        assert_eq!(md.get(MetaKey::Published), Some("2024-01-02"));
        assert_eq!(md.get(MetaKey::Keywords), Some("rust, html"));
        assert_eq!(md.len(), 6);

        let order: Vec<_> = md.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            order,
            ["description", "author", "og_title", "url", "published", "keywords"]
        );
    }

    #[test]
    fn empty_content_is_skipped() {
        let md = extract(
            r#"<head><meta name="author" content="  "><meta name="author" content="Bo"></head>"#,
        );
        assert_eq!(md.get(MetaKey::Author), Some("Bo"));
    }

    #[test]
    fn frontmatter_escapes_values() {
        let mut md = Metadata::default();
        md.insert_first(MetaKey::Title, r#"Say "hi" \o/"#.to_string());
        let fm = format_frontmatter(&md);
        assert_eq!(fm, "---\ntitle: \"Say \\\"hi\\\" \\\\o/\"\n---\n\n");
    }

    #[test]
    fn frontmatter_empty_metadata() {
        assert_eq!(format_frontmatter(&Metadata::default()), "");
    }

    #[test]
    fn header_with_article_information() {
        let mut md = Metadata::default();
        md.insert_first(MetaKey::Title, "Post".to_string());
        md.insert_first(MetaKey::Description, "About things".to_string());
        md.insert_first(MetaKey::Author, "Ada".to_string());

        let header = format_header(&md);
        assert_eq!(
            header,
            "# Post\n\n## Article Information\n\n**Author:** Ada\n\n**Description:** About things\n\n"
        );
    }

    #[test]
    fn description_alone_has_no_information_section() {
        let mut md = Metadata::default();
        md.insert_first(MetaKey::Description, "About things".to_string());
        assert_eq!(format_header(&md), "");
    }

    #[test]
    fn serializes_in_order() {
        let mut md = Metadata::default();
        md.insert_first(MetaKey::Url, "u".to_string());
        md.insert_first(MetaKey::Title, "t".to_string());
        let json = serde_json::to_string(&md).unwrap();
        assert_eq!(json, r#"{"url":"u","title":"t"}"#);
    }
}
