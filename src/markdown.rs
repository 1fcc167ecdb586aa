use crate::code_blocks::{self, FENCE};
use crate::dom;
use crate::postprocess;
use kuchikiki::{NodeData, NodeRef};
use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static HEADING_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}(\s|$)").unwrap());
static BULLET_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-+](\s|$)").unwrap());
static RULE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(-+|=+)\s*$").unwrap());
static ORDERED_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([.)])(\s|$)").unwrap());

/// Dropped along with their content.
const DROPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "center", "dd", "details", "div", "dl",
    "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "hr", "html", "li", "main", "nav", "ol", "p", "pre", "section", "summary",
    "table", "ul",
];

/// Render a cleaned DOM subtree as raw Markdown: ATX headings, `-` bullets
/// and fenced code. The output still needs post-processing.
pub fn render_markdown(root: &NodeRef) -> String {
    let mut ctx = RenderContext::default();
    match root.data() {
        NodeData::Element(_) => ctx.render_block(root),
        _ => ctx.render_flow(root),
    }
    ctx.output
}

#[derive(Default)]
struct RenderContext {
    output: String,
}

impl RenderContext {
    /// Render the children of `node`, grouping inline runs into paragraphs.
    fn render_flow(&mut self, node: &NodeRef) {
        let mut inline = String::new();

        for child in node.children() {
            if is_block(&child) {
                self.flush_paragraph(&mut inline);
                self.render_block(&child);
            } else {
                inline.push_str(&render_inline(&child));
            }
        }

        self.flush_paragraph(&mut inline);
    }

    fn render_block(&mut self, node: &NodeRef) {
        let tag = dom::tag_name(node).unwrap_or_default();

        match tag.as_str() {
            t if DROPPED_TAGS.contains(&t) => {}
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                let text = single_line(&render_inline_children(node));
                if !text.is_empty() {
                    self.push_block(&format!("{} {}", "#".repeat(level), text));
                }
            }
            "ul" | "ol" => {
                let list = render_list(node, "");
                self.push_block(&list);
            }
            "li" => {
                let (text, nested) = render_list_item(node, "  ");
                let mut lines = vec![format!("- {}", text)];
                lines.extend(nested);
                self.push_block(&lines.join("\n"));
            }
            "blockquote" => {
                let mut inner = RenderContext::default();
                inner.render_flow(node);
                let inner_text = postprocess::collapse_blank_lines(inner.output.trim());
                self.push_block(&quote(&inner_text));
            }
            "pre" => self.push_block(&render_pre(node)),
            "table" => self.push_block(&render_table(node)),
            "hr" => self.push_block("---"),
            _ => self.render_flow(node),
        }
    }

    fn flush_paragraph(&mut self, inline: &mut String) {
        let text = clean_inline(inline)
            .split('\n')
            .map(escape_block_start)
            .collect::<Vec<_>>()
            .join("\n");
        self.push_block(&text);
        inline.clear();
    }

    fn push_block(&mut self, block: &str) {
        if block.trim().is_empty() {
            return;
        }
        self.output.push_str("\n\n");
        self.output.push_str(block);
        self.output.push_str("\n\n");
    }
}

fn is_block(node: &NodeRef) -> bool {
    dom::tag_name(node)
        .map(|tag| BLOCK_TAGS.contains(&tag.as_str()))
        .unwrap_or(false)
}

fn render_inline_children(node: &NodeRef) -> String {
    node.children().map(|child| render_inline(&child)).collect()
}

fn render_inline(node: &NodeRef) -> String {
    match node.data() {
        NodeData::Text(text) => escape_text(&WHITESPACE_RE.replace_all(&text.borrow(), " ")),
        NodeData::Element(_) => {
            let tag = dom::tag_name(node).unwrap_or_default();
            match tag.as_str() {
                t if DROPPED_TAGS.contains(&t) => String::new(),
                "br" => "\n".to_string(),
                "img" => render_image(node),
                "a" => render_link(node),
                "strong" | "b" => wrap(&render_inline_children(node), "**"),
                "em" | "i" => wrap(&render_inline_children(node), "*"),
                "del" | "s" | "strike" => wrap(&render_inline_children(node), "~~"),
                "code" | "kbd" | "samp" | "tt" => inline_code(&node.text_contents()),
                t if BLOCK_TAGS.contains(&t) => format!(" {} ", render_inline_children(node)),
                _ => render_inline_children(node),
            }
        }
        _ => String::new(),
    }
}

/// Backslash-escape characters that would otherwise read as inline markup.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a line that would open a heading, list, quote or rule.
fn escape_block_start(line: &str) -> String {
    if HEADING_MARKER_RE.is_match(line)
        || BULLET_MARKER_RE.is_match(line)
        || RULE_LINE_RE.is_match(line)
        || line.starts_with('>')
    {
        format!("\\{}", line)
    } else {
        ORDERED_MARKER_RE
            .replace(line, "${1}\\${2}${3}")
            .into_owned()
    }
}

/// Wrap in emphasis markers, keeping surrounding spaces outside them.
fn wrap(inner: &str, marker: &str) -> String {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return inner.to_string();
    }
    let lead = if inner.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if inner.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{}{}{}{}{}", lead, marker, trimmed, marker, trail)
}

fn inline_code(text: &str) -> String {
    let text = WHITESPACE_RE.replace_all(text.trim(), " ");
    if text.is_empty() {
        String::new()
    } else if text.contains('`') {
        format!("`` {} ``", text)
    } else {
        format!("`{}`", text)
    }
}

fn render_image(node: &NodeRef) -> String {
    let src = dom::attr(node, "src").unwrap_or_default();
    if src.trim().is_empty() {
        return String::new();
    }
    let alt = dom::attr(node, "alt").unwrap_or_default();
    let alt = single_line(&alt).replace(['[', ']'], "");
    format!("![{}]({})", alt, link_target(src.trim()))
}

fn render_link(node: &NodeRef) -> String {
    let text = single_line(&render_inline_children(node));
    let href = dom::attr(node, "href").unwrap_or_default();
    let href = href.trim();

    if text.is_empty() {
        return String::new();
    }
    if href.is_empty() || href.to_ascii_lowercase().starts_with("javascript:") {
        return text;
    }
    format!("[{}]({})", text, link_target(href))
}

fn link_target(url: &str) -> String {
    if url.contains([' ', '(', ')']) {
        format!("<{}>", url)
    } else {
        url.to_string()
    }
}

/// Collapse spaces inside each line and trim the lines.
fn clean_inline(text: &str) -> String {
    text.split('\n')
        .map(|line| SPACES_RE.replace_all(line.trim(), " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn single_line(text: &str) -> String {
    dom::normalize_whitespace(text)
}

fn render_list(node: &NodeRef, indent: &str) -> String {
    let ordered = dom::tag_name(node).as_deref() == Some("ol");
    let mut index: usize = dom::attr(node, "start")
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(1);
    let mut lines = Vec::new();

    for child in node.children() {
        let Some(tag) = dom::tag_name(&child) else {
            continue;
        };
        if tag == "ul" || tag == "ol" {
            lines.push(render_list(&child, &format!("{}  ", indent)));
            continue;
        }

        let marker = if ordered {
            let m = format!("{}.", index);
            index += 1;
            m
        } else {
            "-".to_string()
        };
        let child_indent = format!("{}{}", indent, " ".repeat(marker.len() + 1));
        let (text, nested) = render_list_item(&child, &child_indent);

        lines.push(format!("{}{} {}", indent, marker, text));
        lines.extend(nested);
    }

    lines.retain(|l| !l.is_empty());
    lines.join("\n")
}

/// Item text plus nested blocks already indented under the item.
fn render_list_item(item: &NodeRef, child_indent: &str) -> (String, Vec<String>) {
    let mut inline = String::new();
    let mut nested = Vec::new();

    for child in item.children() {
        match dom::tag_name(&child).as_deref() {
            Some("ul") | Some("ol") => nested.push(render_list(&child, child_indent)),
            Some("pre") | Some("table") | Some("blockquote") => {
                let mut inner = RenderContext::default();
                inner.render_block(&child);
                let block = inner.output.trim().to_string();
                if !block.is_empty() {
                    nested.push(indent_lines(&block, child_indent));
                }
            }
            _ => inline.push_str(&render_inline(&child)),
        }
    }

    (escape_block_start(&single_line(&clean_inline(&inline))), nested)
}

fn indent_lines(block: &str, indent: &str) -> String {
    block
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", indent, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn quote(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ">".to_string()
            } else {
                format!("> {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fenced blocks from the code preserver pass through untouched.
fn render_pre(node: &NodeRef) -> String {
    let text = node.text_contents();
    if text.trim_start().starts_with(FENCE) {
        text.trim_matches(['\n', '\r']).to_string()
    } else if text.trim().is_empty() {
        String::new()
    } else {
        code_blocks::fence(&text, None)
    }
}

fn render_table(node: &NodeRef) -> String {
    let rows: Vec<Vec<String>> = dom::select_all(node, "tr")
        .iter()
        .map(|tr| {
            tr.children()
                .filter(|c| matches!(dom::tag_name(c).as_deref(), Some("td") | Some("th")))
                .map(|cell| single_line(&render_inline_children(&cell)).replace('|', "\\|"))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    if rows.is_empty() {
        return String::new();
    }

    let col_count = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut out = String::new();

    for (i, row) in rows.iter().enumerate() {
        out.push('|');
        for j in 0..col_count {
            let cell = row.get(j).map(|s| s.as_str()).unwrap_or("");
            out.push(' ');
            out.push_str(cell);
            out.push_str(" |");
        }
        out.push('\n');

        if i == 0 {
            out.push('|');
            for _ in 0..col_count {
                out.push_str(" --- |");
            }
            out.push('\n');
        }
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postprocess::process_markdown;

    fn render(html: &str) -> String {
        let doc = dom::parse_html(html);
        let body = dom::select_first(&doc, "body").unwrap();
        process_markdown(&render_markdown(&body))
    }

    #[test]
    fn atx_headings_and_paragraphs() {
        let md = render("<h1>Title</h1><p>Hello <b>bold</b> and <em>soft</em>.</p><h3>Sub</h3>");
        assert_eq!(md, "# Title\n\nHello **bold** and *soft*.\n\n### Sub");
    }

    #[test]
    fn bullet_and_ordered_lists() {
        let md = render("<ul><li>one</li><li>two<ul><li>inner</li></ul></li></ul><ol start=\"3\"><li>c</li><li>d</li></ol>");
        assert_eq!(md, "- one\n- two\n  - inner\n\n3. c\n4. d");
    }

    #[test]
    fn links_and_images() {
        let md = render(r#"<p>See <a href="https://x.io/a">the docs</a> <img src="images/p.png" alt="Pic"></p>"#);
        assert_eq!(md, "See [the docs](https://x.io/a) ![Pic](images/p.png)");
    }

    #[test]
    fn image_without_src_is_dropped() {
        let md = render(r#"<p>a <img src="" alt="x"> b</p>"#);
        assert_eq!(md, "a b");
    }

    #[test]
    fn preserved_fence_is_not_rewrapped() {
        let doc = dom::parse_html(r#"<body><pre><code class="language-python">print(1)</code></pre></body>"#);
        code_blocks::preserve_code_blocks(&doc);
        let md = process_markdown(&render_markdown(&doc));
        assert_eq!(md, "```python\nprint(1)\n```");
    }

    #[test]
    fn bare_pre_gets_fenced() {
        assert_eq!(render("<pre>raw text</pre>"), "```\nraw text\n```");
    }

    #[test]
    fn blockquote_lines_are_prefixed() {
        let md = render("<p>before</p><blockquote><p>one</p><p>two</p></blockquote>");
        assert_eq!(md, "before\n\n> one\n>\n> two");
    }

    #[test]
    fn table_rows() {
        let md = render("<table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>x|y</td></tr></table>");
        assert_eq!(md, "| A | B |\n| --- | --- |\n| 1 | x\\|y |");
    }

    #[test]
    fn residual_scripts_are_not_rendered() {
        let md = render("<p>text</p><script>alert(1)</script><style>p{}</style>");
        assert_eq!(md, "text");
    }

    #[test]
    fn literal_markup_characters_are_escaped() {
        let md = render("<p>2*3*4 and snake_case_name_here</p><p># not a heading</p><p>1. not a list</p>");
        assert_eq!(
            md,
            "2\\*3\\*4 and snake\\_case\\_name\\_here\n\n\\# not a heading\n\n1\\. not a list"
        );
    }

    #[test]
    fn block_markers_at_line_start_are_escaped() {
        let md = render("<p>- dash</p><p>&gt; quoted<br>+ plus</p><p>===</p><ul><li># tag</li></ul>");
        assert_eq!(md, "\\- dash\n\n\\> quoted\n\\+ plus\n\n\\===\n\n- \\# tag");
    }

    #[test]
    fn code_and_link_targets_are_not_escaped() {
        let md = render(r#"<p>use <code>a_b*c</code> or <a href="https://x.io/a_b">[x]</a></p>"#);
        assert_eq!(md, "use `a_b*c` or [\\[x\\]](https://x.io/a_b)");
    }

    #[test]
    fn quoted_code_keeps_indentation() {
        let doc = dom::parse_html(
            "<body><blockquote><pre><code class=\"language-python\">def f():\n    return 1</code></pre></blockquote></body>",
        );
        code_blocks::preserve_code_blocks(&doc);
        let md = process_markdown(&render_markdown(&doc));
        assert_eq!(md, "> ```python\n> def f():\n>     return 1\n> ```");
    }

    #[test]
    fn inline_code_and_breaks() {
        let md = render("<p>call <code>run()</code><br>next line</p>");
        assert_eq!(md, "call `run()`\nnext line");
    }
}
