//! Structural fixups applied to rendered Markdown.
//!
//! Each rule is a pure string function; [`process_markdown`] runs them in
//! order. Rules 2-5 leave lines inside fenced code blocks alone.

use crate::code_blocks::FENCE;
use regex::Regex;
use std::sync::LazyLock;

static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#{1,6}(\s|$)").unwrap());
static LIST_OR_QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(([-+*]|\d+\.)\s|>)").unwrap());
static HSPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

pub fn process_markdown(markdown: &str) -> String {
    let text = collapse_blank_lines(markdown);
    let text = blank_before_headings(&text);
    let text = blank_after_headings(&text);
    let text = blank_before_lists_and_quotes(&text);
    let text = collapse_horizontal_whitespace(&text);
    trim_document(&text)
}

/// Rule 1: at most one blank line between blocks.
pub fn collapse_blank_lines(text: &str) -> String {
    BLANK_RUN_RE.replace_all(text, "\n\n").into_owned()
}

/// Rule 2.
pub fn blank_before_headings(text: &str) -> String {
    insert_blank_lines(text, |lines, i, in_code| {
        !in_code[i] && i > 0 && is_heading(lines[i]) && !is_blank(lines[i - 1])
    })
}

/// Rule 3.
pub fn blank_after_headings(text: &str) -> String {
    insert_blank_lines(text, |lines, i, in_code| {
        i > 0 && !in_code[i - 1] && is_heading(lines[i - 1]) && !is_blank(lines[i])
    })
}

/// Rule 4: a list or blockquote starting after other content.
pub fn blank_before_lists_and_quotes(text: &str) -> String {
    insert_blank_lines(text, |lines, i, in_code| {
        !in_code[i]
            && i > 0
            && is_list_or_quote(lines[i])
            && !is_blank(lines[i - 1])
            && !continues_list_or_quote(lines[i - 1], in_code[i - 1])
    })
}

/// Quoted code lines still belong to the quote around them.
fn continues_list_or_quote(prev: &str, prev_in_code: bool) -> bool {
    if prev_in_code {
        prev.trim_start().starts_with('>')
    } else {
        is_list_or_quote(prev)
    }
}

/// Rule 5: runs of spaces and tabs inside a line become one space. Leading
/// indentation is kept and trailing whitespace dropped.
pub fn collapse_horizontal_whitespace(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let in_code = code_mask(&lines);

    lines
        .iter()
        .zip(in_code)
        .map(|(line, code)| {
            if code {
                return line.to_string();
            }
            let body = line.trim_start_matches([' ', '\t']);
            let indent = &line[..line.len() - body.len()];
            let body = HSPACE_RE.replace_all(body.trim_end(), " ");
            if body.is_empty() {
                String::new()
            } else {
                format!("{}{}", indent, body)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rule 6.
pub fn trim_document(text: &str) -> String {
    text.trim().to_string()
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_heading(line: &str) -> bool {
    HEADING_RE.is_match(line)
}

fn is_list_or_quote(line: &str) -> bool {
    LIST_OR_QUOTE_RE.is_match(line)
}

/// Backtick count of a fence line, looking past indentation and `>` markers.
fn fence_len(line: &str) -> Option<usize> {
    let body = strip_quote_markers(line);
    let len = body.len() - body.trim_start_matches('`').len();
    (len >= FENCE.len()).then_some(len)
}

fn strip_quote_markers(line: &str) -> &str {
    let mut rest = line.trim_start();
    while let Some(inner) = rest.strip_prefix('>') {
        rest = inner.trim_start();
    }
    rest
}

/// `true` for fence lines and everything between them. A block closes on a
/// bare fence at least as long as the one that opened it.
fn code_mask(lines: &[&str]) -> Vec<bool> {
    let mut open: Option<usize> = None;
    lines
        .iter()
        .map(|line| match (open, fence_len(line)) {
            (None, Some(len)) => {
                open = Some(len);
                true
            }
            (Some(opened), Some(len))
                if len >= opened && strip_quote_markers(line).trim_end().len() == len =>
            {
                open = None;
                true
            }
            (inside, _) => inside.is_some(),
        })
        .collect()
}

/// Insert a blank line before line `i` wherever `needs_blank` holds.
fn insert_blank_lines<F>(text: &str, needs_blank: F) -> String
where
    F: Fn(&[&str], usize, &[bool]) -> bool,
{
    let lines: Vec<&str> = text.split('\n').collect();
    let in_code = code_mask(&lines);
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());

    for i in 0..lines.len() {
        if needs_blank(&lines[..], i, &in_code[..]) {
            out.push("");
        }
        out.push(lines[i]);
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_long_newline_runs() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb\n\nc\nd"), "a\n\nb\n\nc\nd");
        assert!(!process_markdown("x\n\n\n\ny").contains("\n\n\n"));
    }

    #[test]
    fn blank_line_before_heading() {
        assert_eq!(blank_before_headings("text\n## Head"), "text\n\n## Head");
        assert_eq!(blank_before_headings("text\n\n## Head"), "text\n\n## Head");
        assert_eq!(blank_before_headings("# Top"), "# Top");
    }

    #[test]
    fn hash_without_space_is_not_a_heading() {
        assert_eq!(blank_before_headings("text\n#hashtag"), "text\n#hashtag");
    }

    #[test]
    fn blank_line_after_heading() {
        assert_eq!(blank_after_headings("## Head\ntext"), "## Head\n\ntext");
        assert_eq!(blank_after_headings("## Head\n\ntext"), "## Head\n\ntext");
        assert_eq!(blank_after_headings("## Head"), "## Head");
    }

    #[test]
    fn blank_line_before_list_and_quote() {
        assert_eq!(
            blank_before_lists_and_quotes("intro\n- a\n- b"),
            "intro\n\n- a\n- b"
        );
        assert_eq!(
            blank_before_lists_and_quotes("intro\n1. a\n2. b"),
            "intro\n\n1. a\n2. b"
        );
        assert_eq!(
            blank_before_lists_and_quotes("intro\n> said\n> more"),
            "intro\n\n> said\n> more"
        );
        assert_eq!(
            blank_before_lists_and_quotes("- a\n  - nested\n+ c"),
            "- a\n  - nested\n+ c"
        );
    }

    #[test]
    fn horizontal_whitespace() {
        assert_eq!(
            collapse_horizontal_whitespace("a  b\t\tc   \n  - kept  indent"),
            "a b c\n  - kept indent"
        );
    }

    #[test]
    fn trims_document() {
        assert_eq!(trim_document("\n\n  body \n\n"), "body");
    }

    #[test]
    fn code_fences_are_left_alone() {
        let input = "intro\n```python\n# comment\n- not a list\nx  =  1\n```\nafter";
        assert_eq!(process_markdown(input), input);
    }

    #[test]
    fn quoted_code_fences_are_left_alone() {
        let input = "> ```python\n> def f():\n>     return  1\n> ```\n>\n> a  b";
        assert_eq!(
            process_markdown(input),
            "> ```python\n> def f():\n>     return  1\n> ```\n>\n> a b"
        );
    }

    #[test]
    fn longer_fence_is_not_closed_by_shorter_one() {
        let input = "````\n```\n- x  y\n```\n````\na  b";
        assert_eq!(
            process_markdown(input),
            "````\n```\n- x  y\n```\n````\na b"
        );
    }

    #[test]
    fn full_pipeline_order() {
        let input = "\n\n# Title\nintro  text\n- one\n- two\n\n\n\n\n## Next\n> quote\n\n";
        assert_eq!(
            process_markdown(input),
            "# Title\n\nintro text\n\n- one\n- two\n\n## Next\n\n> quote"
        );
    }
}
