use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

/// Derive a markdown rendering from raw uploaded text.
///
/// Council papers and manifestos arrive as flat text: headings are short
/// lines without terminal punctuation (often all caps), bullets use `-`,
/// `*` or `•`, and paragraphs are separated by blank lines. The heuristics
/// below are deliberately shallow.
pub fn derive_markdown(title: &str, raw: &str) -> String {
    let mut out = String::new();
    out.push_str("# ");
    out.push_str(title.trim());
    out.push('\n');

    let mut paragraph: Vec<&str> = Vec::new();
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush_paragraph(&mut out, &mut paragraph);
            continue;
        }
        if let Some(item) = bullet_item(trimmed) {
            flush_paragraph(&mut out, &mut paragraph);
            out.push_str("- ");
            out.push_str(item);
            out.push('\n');
            continue;
        }
        if looks_like_heading(trimmed) {
            flush_paragraph(&mut out, &mut paragraph);
            out.push('\n');
            out.push_str("## ");
            out.push_str(trimmed);
            out.push('\n');
            continue;
        }
        paragraph.push(trimmed);
    }
    flush_paragraph(&mut out, &mut paragraph);
    out
}

fn flush_paragraph(out: &mut String, paragraph: &mut Vec<&str>) {
    if paragraph.is_empty() {
        return;
    }
    out.push('\n');
    out.push_str(&paragraph.join(" "));
    out.push('\n');
    paragraph.clear();
}

fn bullet_item(line: &str) -> Option<&str> {
    for marker in ["- ", "* ", "\u{2022} ", "\u{2022}"] {
        if let Some(rest) = line.strip_prefix(marker) {
            let rest = rest.trim();
            if !rest.is_empty() {
                return Some(rest);
            }
        }
    }
    None
}

fn looks_like_heading(line: &str) -> bool {
    let words = line.split_whitespace().count();
    if words == 0 || words > 8 || line.len() > 64 {
        return false;
    }
    if line.ends_with(['.', ',', ';', '?', '!']) {
        return false;
    }
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return false;
    }
    letters.iter().all(|c| c.is_uppercase())
}

/// Flatten markdown to plain text for chunking and extraction.
pub fn markdown_to_text(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::empty());
    let mut out = String::new();
    for event in parser {
        match event {
            Event::Text(text) => out.push_str(&text),
            Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push(' '),
            Event::Start(Tag::Item) => out.push_str("- "),
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::Item) => {
                out.push('\n');
                out.push('\n');
            }
            _ => {}
        }
    }
    let mut collapsed = String::with_capacity(out.len());
    let mut blank_run = 0usize;
    for line in out.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        collapsed.push_str(line.trim_end());
        collapsed.push('\n');
    }
    collapsed.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_headings_and_bullets() {
        let raw = "BUDGET SUMMARY\n\nCouncil tax will rise by 4.99% in April.\n\n- Adult social care\n- Road maintenance\n";
        let md = derive_markdown("Budget 2025", raw);
        assert!(md.starts_with("# Budget 2025\n"));
        assert!(md.contains("## BUDGET SUMMARY"));
        assert!(md.contains("- Adult social care"));
        assert!(md.contains("Council tax will rise by 4.99% in April."));
    }

    #[test]
    fn joins_wrapped_lines_into_paragraphs() {
        let raw = "The council proposes a\nrise of 4.99% for the\ncoming year.";
        let md = derive_markdown("Doc", raw);
        assert!(md.contains("The council proposes a rise of 4.99% for the coming year."));
    }

    #[test]
    fn flattens_markdown() {
        let md = "# Title\n\nSome *bold* claim.\n\n- item one\n- item two\n";
        let text = markdown_to_text(md);
        assert!(text.contains("Title"));
        assert!(text.contains("Some bold claim."));
        assert!(text.contains("- item one"));
        assert!(!text.contains('*'));
    }
}
