use crate::config::LanguageConfig;

use super::response::{GLOSSARY_MARKER, GLOSSARY_PAIR_SEPARATOR};

pub const TRANSFORM_SYSTEM_PROMPT: &str = "You are a language tutor who rewrites \
newsletter articles for learners. You always follow the requested output format \
exactly, with no preamble and no commentary.";

pub const INTRODUCTION_SYSTEM_PROMPT: &str = "You are a language tutor writing a short, \
warm introduction for a learner's daily newsletter digest. You reply with the \
introduction text only, no preamble and no headings.";

/// Prompt for rewriting one article at the target language and level,
/// with the glossary reply convention spelled out.
pub fn transform_prompt(text: &str, language: &LanguageConfig) -> String {
    format!(
        "Rewrite the following newsletter article in {target}, at CEFR level {level}. \
Keep all the factual content, simplify the phrasing to match the level, and do not \
add information.\n\
\n\
After the rewritten article, output a line containing exactly `{marker}`, then one \
line per word or expression of the rewritten text that a {level} learner of {target} \
is unlikely to know, in order of first appearance, formatted as:\n\
term{separator}translation into {known}\n\
List each term at most once. If no term needs a translation, still output the \
`{marker}` line with nothing after it.\n\
\n\
Article:\n\
{text}",
        target = language.target,
        level = language.level,
        known = language.known,
        marker = GLOSSARY_MARKER,
        separator = GLOSSARY_PAIR_SEPARATOR,
        text = text,
    )
}

/// Prompt for the digest introduction, built from the full ordered list of
/// rewritten articles.
pub fn introduction_prompt(language: &LanguageConfig, article_texts: &[String]) -> String {
    let numbered: Vec<String> = article_texts
        .iter()
        .enumerate()
        .map(|(i, text)| format!("Article {}:\n{}", i + 1, text))
        .collect();

    format!(
        "Write a short introduction (3 to 5 sentences) in {target}, at CEFR level {level}, \
for a digest email containing the {count} article(s) below. Mention what the reader \
is about to read, without summarizing every detail.\n\
\n\
{articles}",
        target = language.target,
        level = language.level,
        count = article_texts.len(),
        articles = numbered.join("\n\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LanguageLevel;

    fn language() -> LanguageConfig {
        LanguageConfig {
            known: "English".to_string(),
            target: "German".to_string(),
            level: LanguageLevel::B1,
        }
    }

    #[test]
    fn test_transform_prompt_mentions_languages_and_level() {
        let prompt = transform_prompt("Some article text.", &language());

        assert!(prompt.contains("German"));
        assert!(prompt.contains("B1"));
        assert!(prompt.contains("English"));
        assert!(prompt.contains(GLOSSARY_MARKER));
        assert!(prompt.contains("Some article text."));
    }

    #[test]
    fn test_introduction_prompt_numbers_articles() {
        let texts = vec!["Erste Geschichte.".to_string(), "Zweite Geschichte.".to_string()];
        let prompt = introduction_prompt(&language(), &texts);

        assert!(prompt.contains("Article 1:"));
        assert!(prompt.contains("Article 2:"));
        assert!(prompt.contains("2 article(s)"));
    }
}
