use log::{debug, warn};
use regex::Regex;

use crate::imap_client::SourceMessage;

/// One plain-text article unit extracted from a newsletter email.
#[derive(Debug, Clone)]
pub struct Article {
    pub source_uid: u32,
    /// Position of this article within its source email
    pub index: usize,
    pub body: String,
}

// Fragments shorter than this are treated as boilerplate leftovers
const MIN_ARTICLE_CHARS: usize = 40;

/// Extract the article units from a raw newsletter email.
///
/// Never fails: malformed or contentless messages yield an empty Vec and the
/// message is reported as "skipped, no content" by the pipeline.
/// Deterministic for a given raw body.
pub fn extract_articles(message: &SourceMessage) -> Vec<Article> {
    debug!("Extracting articles from email {} ({} bytes)", message.uid, message.raw.len());

    let parsed_email = match mail_parser::MessageParser::default().parse(&message.raw) {
        Some(parsed) => parsed,
        None => {
            warn!("Unable to parse email {} with mail-parser", message.uid);
            return Vec::new();
        }
    };

    // Extract text from email body
    let mut text_content = String::new();

    // Try to get text/plain body first
    if let Some(text_body) = parsed_email.body_text(0) {
        text_content.push_str(&text_body);
    }

    // If no text/plain, try text/html
    if text_content.trim().is_empty() {
        if let Some(html_body) = parsed_email.body_html(0) {
            // Simple HTML stripping (remove tags)
            let html_str = html_body.to_string()
                .replace("<br>", "\n")
                .replace("<BR>", "\n")
                .replace("<br/>", "\n")
                .replace("</p>", "\n")
                .replace("</P>", "\n");
            if let Ok(tag_regex) = Regex::new(r"<[^>]+>") {
                text_content = tag_regex.replace_all(&html_str, "").to_string();
            }
        }
    }

    if text_content.trim().is_empty() {
        debug!("Email {} has no readable text body", message.uid);
        return Vec::new();
    }

    let cleaned = strip_boilerplate(&text_content);

    let articles: Vec<Article> = split_into_sections(&cleaned)
        .into_iter()
        .filter(|section| section.chars().count() >= MIN_ARTICLE_CHARS)
        .enumerate()
        .map(|(index, body)| Article {
            source_uid: message.uid,
            index,
            body,
        })
        .collect();

    debug!("Email {} yielded {} article(s)", message.uid, articles.len());
    articles
}

/// Remove the usual newsletter footer noise: unsubscribe links, tracking
/// hints, copyright lines.
fn strip_boilerplate(text: &str) -> String {
    let noise_patterns = [
        r"(?i)unsubscribe",
        r"(?i)se d[ée]sabonner",
        r"(?i)view (this email )?in (your )?browser",
        r"(?i)manage (your )?(email )?preferences",
        r"(?i)sent to [^\s]+@[^\s]+",
        r"(?i)you( a|')re receiving this",
        r"(?i)^\s*(copyright|©)",
    ];

    let regexes: Vec<Regex> = noise_patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();

    text.lines()
        .filter(|line| !regexes.iter().any(|re| re.is_match(line)))
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Split newsletter text into article sections on horizontal-rule lines
/// ("---", "===", "___", "***" and longer runs).
fn split_into_sections(text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if is_rule_line(line) {
            push_section(&mut sections, &mut current);
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    push_section(&mut sections, &mut current);

    sections
}

fn push_section(sections: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sections.push(trimmed.to_string());
    }
    current.clear();
}

fn is_rule_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3
        && (trimmed.chars().all(|c| c == '-')
            || trimmed.chars().all(|c| c == '=')
            || trimmed.chars().all(|c| c == '_')
            || trimmed.chars().all(|c| c == '*'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_from(raw: &str) -> SourceMessage {
        SourceMessage {
            uid: 1,
            raw: raw.as_bytes().to_vec(),
            date: chrono::Utc::now(),
            subject: "Test".to_string(),
        }
    }

    const PLAIN_EMAIL: &str = "From: news@example.com\r\n\
        To: reader@example.com\r\n\
        Subject: Weekly digest\r\n\
        Content-Type: text/plain; charset=utf-8\r\n\
        \r\n\
        The first story of the week covers the launch of a new open source project.\n\
        \n\
        ---\n\
        The second story is about a conference happening next month in Berlin.\n";

    #[test]
    fn test_extract_splits_on_rule_lines() {
        let articles = extract_articles(&message_from(PLAIN_EMAIL));

        assert_eq!(articles.len(), 2);
        assert!(articles[0].body.contains("first story"));
        assert!(articles[1].body.contains("second story"));
        assert_eq!(articles[0].index, 0);
        assert_eq!(articles[1].index, 1);
        assert_eq!(articles[0].source_uid, 1);
    }

    #[test]
    fn test_extract_drops_boilerplate_and_short_fragments() {
        let raw = "From: news@example.com\r\n\
            Subject: Digest\r\n\
            Content-Type: text/plain; charset=utf-8\r\n\
            \r\n\
            A proper article body that is clearly long enough to keep around here.\n\
            Unsubscribe from this list at any time.\n\
            ===\n\
            ok\n";

        let articles = extract_articles(&message_from(raw));

        assert_eq!(articles.len(), 1);
        assert!(!articles[0].body.contains("Unsubscribe"));
    }

    #[test]
    fn test_extract_html_fallback() {
        let raw = "From: news@example.com\r\n\
            Subject: Digest\r\n\
            Content-Type: text/html; charset=utf-8\r\n\
            \r\n\
            <html><body><p>An HTML newsletter story with enough characters to survive filtering.</p></body></html>\n";

        let articles = extract_articles(&message_from(raw));

        assert_eq!(articles.len(), 1);
        assert!(articles[0].body.contains("HTML newsletter story"));
        assert!(!articles[0].body.contains('<'));
    }

    #[test]
    fn test_extract_empty_message_yields_no_articles() {
        let raw = "From: news@example.com\r\n\
            Subject: Empty\r\n\
            Content-Type: text/plain; charset=utf-8\r\n\
            \r\n\
            \r\n";

        assert!(extract_articles(&message_from(raw)).is_empty());
    }

    #[test]
    fn test_extract_is_deterministic() {
        let first = extract_articles(&message_from(PLAIN_EMAIL));
        let second = extract_articles(&message_from(PLAIN_EMAIL));

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.body, b.body);
            assert_eq!(a.index, b.index);
        }
    }

    #[test]
    fn test_rule_line_detection() {
        assert!(is_rule_line("---"));
        assert!(is_rule_line("  ====  "));
        assert!(is_rule_line("_____"));
        assert!(is_rule_line("***"));
        assert!(!is_rule_line("--"));
        assert!(!is_rule_line("a---b"));
        assert!(!is_rule_line("some text"));
    }
}
