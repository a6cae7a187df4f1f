//! Splitting replies into human-sized WhatsApp messages and pacing them.

use std::time::Duration;

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

use crate::config::PacingConfig;

static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

const SENTENCE_END: &[char] = &['.', '!', '?', '…'];

/// Split `text` into parts of at most `max_len` characters.
///
/// Paragraphs (blank-line separated) are kept whole when they fit. Longer
/// paragraphs are cut between sentences and sentences are packed greedily.
/// A single sentence longer than `max_len` becomes its own oversized part.
pub fn segment(text: &str, max_len: usize) -> Vec<String> {
    let mut parts = Vec::new();

    for paragraph in PARAGRAPH_BREAK.split(text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if char_len(paragraph) <= max_len {
            parts.push(paragraph.to_string());
            continue;
        }

        let mut current = String::new();
        let mut pending_sep = ' ';
        for (sentence, sep) in split_sentences(paragraph) {
            if current.is_empty() {
                current.push_str(sentence);
            } else if char_len(&current) + 1 + char_len(sentence) <= max_len {
                current.push(pending_sep);
                current.push_str(sentence);
            } else {
                parts.push(std::mem::take(&mut current));
                current.push_str(sentence);
            }
            pending_sep = sep;
        }
        if !current.is_empty() {
            parts.push(current);
        }
    }

    parts
}

/// Sentences of a paragraph, each with the separator that followed it.
fn split_sentences(paragraph: &str) -> Vec<(&str, char)> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        let boundary = if c == '\n' {
            Some((idx, '\n'))
        } else if SENTENCE_END.contains(&c) {
            match chars.peek() {
                None => Some((idx + c.len_utf8(), ' ')),
                Some((_, next)) if next.is_whitespace() => Some((idx + c.len_utf8(), ' ')),
                _ => None,
            }
        } else {
            None
        };

        if let Some((end, sep)) = boundary {
            let sentence = paragraph[start..end].trim();
            if !sentence.is_empty() {
                sentences.push((sentence, sep));
            }
            start = if c == '\n' { idx + 1 } else { end };
        }
    }

    let tail = paragraph[start..].trim();
    if !tail.is_empty() {
        sentences.push((tail, ' '));
    }
    sentences
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Simulated typing time for a part; `jitter` is a factor in `[0.8, 1.2]`.
pub fn typing_duration(part: &str, pacing: &PacingConfig, jitter: f64) -> Duration {
    let base_ms = char_len(part) as f64 * pacing.typing_ms_per_char as f64;
    let ms = (base_ms * jitter).round() as u64;
    Duration::from_millis(ms).clamp(pacing.typing_min, pacing.typing_max)
}

pub fn random_typing_duration(part: &str, pacing: &PacingConfig) -> Duration {
    let jitter = rand::thread_rng().gen_range(0.8..=1.2);
    typing_duration(part, pacing, jitter)
}

pub fn random_gap(pacing: &PacingConfig) -> Duration {
    let min = pacing.gap_min.as_millis() as u64;
    let max = pacing.gap_max.as_millis() as u64;
    if max <= min {
        return pacing.gap_min;
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}
