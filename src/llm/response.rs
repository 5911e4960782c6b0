use log::debug;

use super::client::{GenerationError, GlossaryEntry, TransformResult};

/// Line separating the rewritten text from the glossary pairs in a
/// transform reply.
pub const GLOSSARY_MARKER: &str = "GLOSSARY:";

/// Separator between term and translation on each glossary line.
pub const GLOSSARY_PAIR_SEPARATOR: &str = " = ";

/// Parse a transform reply into rewritten text + glossary.
///
/// Expected shape:
/// ```text
/// <rewritten text>
/// GLOSSARY:
/// term = translation
/// term = translation
/// ```
/// A reply without a non-empty body, without the marker line, or with a
/// glossary line that cannot be split into a (term, translation) pair is an
/// `InvalidResponse`, never silently accepted.
pub fn parse_transform_reply(reply: &str) -> Result<TransformResult, GenerationError> {
    let mut text_lines: Vec<&str> = Vec::new();
    let mut glossary_lines: Vec<&str> = Vec::new();
    let mut marker_seen = false;

    for line in reply.lines() {
        if !marker_seen && line.trim() == GLOSSARY_MARKER {
            marker_seen = true;
        } else if marker_seen {
            glossary_lines.push(line);
        } else {
            text_lines.push(line);
        }
    }

    if !marker_seen {
        return Err(GenerationError::InvalidResponse(
            "reply has no glossary marker line".to_string(),
        ));
    }

    let text = text_lines.join("\n").trim().to_string();
    if text.is_empty() {
        return Err(GenerationError::InvalidResponse(
            "reply has an empty rewritten text".to_string(),
        ));
    }

    let glossary = parse_glossary_lines(&glossary_lines)?;
    debug!("Parsed transform reply: {} chars, {} glossary pair(s)", text.len(), glossary.len());

    Ok(TransformResult { text, glossary })
}

/// Parse an introduction reply. Plain text; an empty reply is invalid.
pub fn parse_introduction_reply(reply: &str) -> Result<String, GenerationError> {
    let text = reply.trim();
    if text.is_empty() {
        return Err(GenerationError::InvalidResponse(
            "introduction reply is empty".to_string(),
        ));
    }
    Ok(text.to_string())
}

fn parse_glossary_lines(lines: &[&str]) -> Result<Vec<GlossaryEntry>, GenerationError> {
    let mut entries: Vec<GlossaryEntry> = Vec::new();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (term, translation) = match line.split_once('=') {
            Some((term, translation)) => (term.trim(), translation.trim()),
            None => {
                return Err(GenerationError::InvalidResponse(format!(
                    "glossary line without '{}' separator: '{}'",
                    GLOSSARY_PAIR_SEPARATOR.trim(),
                    line
                )));
            }
        };

        if term.is_empty() || translation.is_empty() {
            return Err(GenerationError::InvalidResponse(format!(
                "glossary line with an empty side: '{}'",
                line
            )));
        }

        // A repeated term keeps its first translation
        if entries.iter().any(|e| e.term == term) {
            debug!("Dropping duplicate glossary term '{}'", term);
            continue;
        }

        entries.push(GlossaryEntry {
            term: term.to_string(),
            translation: translation.to_string(),
        });
    }

    Ok(entries)
}
