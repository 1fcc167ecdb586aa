use crate::dom;
use kuchikiki::NodeRef;

pub const FENCE: &str = "```";

/// Language from the first `language-*` or `lang-*` class token.
pub fn detect_language(code: &NodeRef) -> Option<String> {
    dom::class_tokens(code).into_iter().find_map(|token| {
        token
            .strip_prefix("language-")
            .or_else(|| token.strip_prefix("lang-"))
            .filter(|lang| !lang.is_empty())
            .map(str::to_string)
    })
}

/// Fenced block whose fence is longer than any backtick run in `code`.
pub fn fence(code: &str, language: Option<&str>) -> String {
    let body = code.trim_end_matches(['\n', '\r']);
    let marker = "`".repeat(FENCE.len().max(longest_backtick_run(body) + 1));
    format!("{}{}\n{}\n{}", marker, language.unwrap_or(""), body, marker)
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c: char| c != '`').map(str::len).max().unwrap_or(0)
}

/// Replace the contents of every `<pre>` holding a `<code>` with a fenced
/// block of the code's raw text. The `<code>` element itself is dropped so
/// the renderer sees a single text node. Returns the number of blocks.
pub fn preserve_code_blocks(root: &NodeRef) -> usize {
    let mut preserved = 0;

    for pre in dom::select_all(root, "pre") {
        let Some(code) = dom::select_first(&pre, "code") else {
            continue;
        };

        let language = detect_language(&code);
        let fenced = fence(&code.text_contents(), language.as_deref());

        let children: Vec<NodeRef> = pre.children().collect();
        for child in children {
            child.detach();
        }
        pre.append(NodeRef::new_text(fenced));
        preserved += 1;
    }

    preserved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_pre_text(html: &str) -> String {
        let doc = dom::parse_html(html);
        preserve_code_blocks(&doc);
        dom::select_first(&doc, "pre").unwrap().text_contents()
    }

    #[test]
    fn language_prefix() {
        let text = first_pre_text(r#"<pre><code class="language-python">print(1)</code></pre>"#);
        assert_eq!(text, "```python\nprint(1)\n```");
    }

    #[test]
    fn lang_prefix_and_first_token_wins() {
        let text = first_pre_text(
            r#"<pre><code class="hljs lang-rust language-go">fn main() {}</code></pre>"#,
        );
        assert_eq!(text, "```rust\nfn main() {}\n```");
    }

    #[test]
    fn no_language() {
        let text = first_pre_text("<pre><code>a &lt; b\n</code></pre>");
        assert_eq!(text, "```\na < b\n```");
    }

    #[test]
    fn highlighted_spans_are_flattened() {
        let doc = dom::parse_html(
            r#"<pre><code class="language-js"><span class="kw">let</span> x = 1;</code></pre>"#,
        );
        assert_eq!(preserve_code_blocks(&doc), 1);
        let pre = dom::select_first(&doc, "pre").unwrap();
        assert!(dom::select_first(&pre, "code").is_none());
        assert!(dom::select_first(&pre, "span").is_none());
        assert_eq!(pre.text_contents(), "```js\nlet x = 1;\n```");
    }

    #[test]
    fn fence_outgrows_backticks_in_code() {
        let text = first_pre_text("<pre><code>```\nx\n```</code></pre>");
        assert_eq!(text, "````\n```\nx\n```\n````");
        assert_eq!(fence("a ````` b", Some("sh")), "``````sh\na ````` b\n``````");
    }

    #[test]
    fn pre_without_code_is_untouched() {
        let doc = dom::parse_html("<pre>plain</pre>");
        assert_eq!(preserve_code_blocks(&doc), 0);
        assert_eq!(dom::select_first(&doc, "pre").unwrap().text_contents(), "plain");
    }
}
