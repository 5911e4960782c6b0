use crate::llm::TransformResult;

/// Static title of every digest email body
pub const DIGEST_TITLE: &str = "Your Newsletter Digest";

/// The consolidated output document of one pipeline run.
/// Immutable once built; consumed exactly once by delivery.
#[derive(Debug, Clone)]
pub struct Digest {
    pub title: String,
    pub introduction: String,
    pub articles: Vec<TransformResult>,
    pub body: String,
}

impl Digest {
    pub fn new(title: &str, introduction: String, articles: Vec<TransformResult>) -> Self {
        let body = assemble(title, &introduction, &articles);
        Digest {
            title: title.to_string(),
            introduction,
            articles,
            body,
        }
    }
}

/// Assemble the digest body. Pure: no network, no state.
///
/// Layout: title, introduction, then each rewritten article followed by a
/// `---` separator and its glossary, one `**term**: translation` line per
/// pair.
pub fn assemble(title: &str, introduction: &str, articles: &[TransformResult]) -> String {
    let mut body = format!("# {}\n\n{}\n\n## Articles:\n", title, introduction);

    for (i, article) in articles.iter().enumerate() {
        if i > 0 {
            body.push('\n');
        }
        body.push_str(&article.text);
        body.push_str("\n\n---\n");
        for entry in &article.glossary {
            body.push_str(&format!("**{}**: {}\n", entry.term, entry.translation));
        }
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GlossaryEntry;

    fn entry(term: &str, translation: &str) -> GlossaryEntry {
        GlossaryEntry {
            term: term.to_string(),
            translation: translation.to_string(),
        }
    }

    #[test]
    fn test_assemble_exact_format() {
        let articles = vec![
            TransformResult {
                text: "Der erste Artikel.".to_string(),
                glossary: vec![entry("der Artikel", "the article"), entry("erste", "first")],
            },
            TransformResult {
                text: "Der zweite Artikel.".to_string(),
                glossary: vec![entry("zweite", "second")],
            },
        ];

        let body = assemble("Your Newsletter Digest", "Willkommen!", &articles);

        let expected = "# Your Newsletter Digest\n\
            \n\
            Willkommen!\n\
            \n\
            ## Articles:\n\
            Der erste Artikel.\n\
            \n\
            ---\n\
            **der Artikel**: the article\n\
            **erste**: first\n\
            \n\
            Der zweite Artikel.\n\
            \n\
            ---\n\
            **zweite**: second\n";

        assert_eq!(body, expected);
    }

    #[test]
    fn test_assemble_empty_glossary() {
        let articles = vec![TransformResult {
            text: "Ein Artikel ohne Glossar.".to_string(),
            glossary: Vec::new(),
        }];

        let body = assemble("T", "Intro", &articles);

        assert_eq!(body, "# T\n\nIntro\n\n## Articles:\nEin Artikel ohne Glossar.\n\n---\n");
    }

    #[test]
    fn test_digest_new_builds_body_once() {
        let articles = vec![TransformResult {
            text: "Text.".to_string(),
            glossary: Vec::new(),
        }];

        let digest = Digest::new(DIGEST_TITLE, "Intro.".to_string(), articles);

        assert_eq!(digest.title, DIGEST_TITLE);
        assert!(digest.body.starts_with(&format!("# {}\n", DIGEST_TITLE)));
        assert_eq!(digest.articles.len(), 1);
    }
}
