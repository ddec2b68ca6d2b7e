//! Markdown post-processing for composite reports.

use std::collections::HashSet;

/// One ATX heading found in generated markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub level: usize,
    pub text: String,
}

impl Header {
    /// Comparison key used for cross-report collision checks.
    pub fn key(&self) -> String {
        normalize(&self.text)
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn parse_heading(line: &str) -> Option<Header> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    let text = rest.trim().trim_end_matches('#').trim();
    (!text.is_empty()).then(|| Header {
        level,
        text: text.to_string(),
    })
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Scan for `#`..`######` headings, ignoring fenced code blocks.
pub fn extract_headers(markdown: &str) -> Vec<Header> {
    let mut headers = Vec::new();
    let mut in_fence = false;

    for line in markdown.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        headers.extend(parse_heading(line));
    }

    headers
}

/// Rewrite headings whose key is in `seen` as bold paragraphs, so the
/// returned markdown never repeats a header of an earlier section.
pub fn demote_seen_headers(markdown: &str, seen: &HashSet<String>) -> String {
    let mut in_fence = false;
    let lines: Vec<String> = markdown
        .lines()
        .map(|line| {
            if is_fence(line) {
                in_fence = !in_fence;
                return line.to_string();
            }
            match parse_heading(line) {
                Some(header) if !in_fence && seen.contains(&header.key()) => {
                    format!("**{}**", header.text)
                }
                _ => line.to_string(),
            }
        })
        .collect();

    let mut out = lines.join("\n");
    if markdown.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Headers of `markdown` not already present in `seen` (by normalized text).
pub fn introduced_headers(markdown: &str, seen: &HashSet<String>) -> Vec<Header> {
    let mut local = HashSet::new();
    extract_headers(markdown)
        .into_iter()
        .filter(|h| {
            let key = h.key();
            !seen.contains(&key) && local.insert(key)
        })
        .collect()
}

/// Nested bullet list of headers, indented relative to the shallowest level.
pub fn table_of_contents(headers: &[Header]) -> String {
    let Some(min_level) = headers.iter().map(|h| h.level).min() else {
        return String::new();
    };

    let mut toc = String::from("## Table of Contents\n\n");
    for header in headers {
        let indent = "  ".repeat(header.level - min_level);
        toc.push_str(&format!("{}- {}\n", indent, header.text));
    }
    toc
}

/// Append a `## References` section listing each URL once, in order.
pub fn add_references(report: &str, urls: &[String]) -> String {
    if urls.is_empty() {
        return report.to_string();
    }

    let mut seen = HashSet::new();
    let mut out = report.trim_end().to_string();
    out.push_str("\n\n## References\n\n");
    for url in urls.iter().filter(|u| seen.insert(u.as_str())) {
        out.push_str(&format!("- [{}]({})\n", url, url));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Title\n\nintro\n\n## Supply Chains\ntext\n```\n# not a header\n```\n### Lithium  Prices ##\n#nospace\n";

    #[test]
    fn test_extract_headers_skips_fences() {
        let headers = extract_headers(SAMPLE);
        let texts: Vec<_> = headers.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["Title", "Supply Chains", "Lithium  Prices"]);
        assert_eq!(headers[2].level, 3);
    }

    #[test]
    fn test_introduced_headers_excludes_seen() {
        let seen: HashSet<String> = ["supply chains".to_string()].into_iter().collect();
        let introduced = introduced_headers(SAMPLE, &seen);
        let keys: Vec<_> = introduced.iter().map(Header::key).collect();
        assert_eq!(keys, vec!["title", "lithium prices"]);
    }

    #[test]
    fn test_demote_seen_headers() {
        let seen: HashSet<String> = ["labor".to_string()].into_iter().collect();
        let out = demote_seen_headers("## Policy\n\n### LABOR \ntext\n```\n### Labor\n```\n", &seen);
        assert_eq!(out, "## Policy\n\n**LABOR**\ntext\n```\n### Labor\n```\n");
        assert!(extract_headers(&out).iter().all(|h| h.key() != "labor"));
    }

    #[test]
    fn test_table_of_contents_nesting() {
        let toc = table_of_contents(&extract_headers("## A\n### B\n## C\n"));
        assert_eq!(toc, "## Table of Contents\n\n- A\n  - B\n- C\n");
        assert_eq!(table_of_contents(&[]), "");
    }

    #[test]
    fn test_add_references_dedups() {
        let out = add_references(
            "body\n",
            &["https://a.example".into(), "https://a.example".into(), "https://b.example".into()],
        );
        assert!(out.ends_with(
            "## References\n\n- [https://a.example](https://a.example)\n- [https://b.example](https://b.example)\n"
        ));
    }
}
