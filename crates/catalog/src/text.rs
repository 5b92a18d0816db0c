use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

/// Topics kept per item
pub const DEFAULT_TOPIC_LIMIT: usize = 8;

const BRAND_SEPARATORS: &[&str] = &[" - ", " | ", ":", "–", "—", "(", ","];

const MIN_TOPIC_CHARS: usize = 3;

const NAME_WEIGHT: u32 = 2;
const DESCRIPTION_WEIGHT: u32 = 1;

const STOPWORDS: &[&str] = &[
    "about", "after", "all", "also", "and", "any", "are", "because", "been", "before", "being",
    "best", "both", "but", "can", "could", "did", "does", "each", "every", "few", "for", "from",
    "get", "gets", "had", "has", "have", "her", "here", "him", "his", "how", "into", "its",
    "just", "like", "made", "make", "makes", "many", "more", "most", "much", "new", "not", "now",
    "off", "one", "only", "other", "our", "out", "over", "own", "per", "same", "she", "should",
    "some", "such", "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "those", "through", "too", "top", "use", "used", "uses", "using", "very", "via",
    "was", "way", "were", "what", "when", "where", "which", "while", "who", "why", "will",
    "with", "within", "without", "would", "you", "your", "yours",
];

/// Brand is the leading token of the name before the first separator
/// ("Acme - Blue Widget" -> "acme"); without a separator, the first word.
#[must_use]
pub fn derive_brand(name: &str) -> String {
    let name = name.trim();
    let cut = BRAND_SEPARATORS
        .iter()
        .filter_map(|sep| name.find(sep))
        .min();

    let leading = cut.map(|idx| name[..idx].trim()).unwrap_or_default();
    let brand = if leading.is_empty() {
        name.split_whitespace().next().unwrap_or_default()
    } else {
        leading
    };

    brand.to_lowercase()
}

/// Salience-ranked keywords from name and description.
///
/// Name words count double. Ties keep first-occurrence order, so the result is
/// a pure function of the input text.
#[must_use]
pub fn extract_topics(name: &str, description: &str, limit: usize) -> Vec<String> {
    // word -> (weight, first position)
    let mut seen: HashMap<String, (u32, usize)> = HashMap::new();
    let mut position = 0usize;

    for (text, weight) in [(name, NAME_WEIGHT), (description, DESCRIPTION_WEIGHT)] {
        for word in text.unicode_words() {
            position += 1;
            let word = word.to_lowercase();
            if !is_topic_word(&word) {
                continue;
            }
            let entry = seen.entry(word).or_insert((0, position));
            entry.0 += weight;
        }
    }

    let mut ranked: Vec<(String, u32, usize)> = seen
        .into_iter()
        .map(|(word, (weight, first))| (word, weight, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(limit)
        .map(|(word, _, _)| word)
        .collect()
}

fn is_topic_word(word: &str) -> bool {
    word.chars().count() >= MIN_TOPIC_CHARS
        && word.chars().any(char::is_alphabetic)
        && word.chars().all(char::is_alphanumeric)
        && !STOPWORDS.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn brand_from_separator() {
        assert_eq!(derive_brand("Acme - Blue Widget"), "acme");
        assert_eq!(derive_brand("Zen Labs | Focus Timer"), "zen labs");
        assert_eq!(derive_brand("Orbit: Task Planner"), "orbit");
        assert_eq!(derive_brand("Nimbus (Pro Plan)"), "nimbus");
    }

    #[test]
    fn brand_falls_back_to_first_word() {
        assert_eq!(derive_brand("Lumen Desk Lamp"), "lumen");
        assert_eq!(derive_brand("  Solo  "), "solo");
        assert_eq!(derive_brand(""), "");
        assert_eq!(derive_brand("Untitled"), "untitled");
    }

    #[test]
    fn topics_rank_name_words_first() {
        let topics = extract_topics(
            "Focus Timer",
            "A pomodoro timer for deep focus sessions with pomodoro stats",
            8,
        );
        assert_eq!(topics[0], "focus");
        assert_eq!(topics[1], "timer");
        assert_eq!(topics[2], "pomodoro");
        assert!(topics.contains(&"sessions".to_string()));
        assert!(!topics.contains(&"for".to_string()));
        assert!(!topics.contains(&"with".to_string()));
    }

    #[test]
    fn topics_skip_numbers_and_short_words() {
        let topics = extract_topics("X 2024 ai", "go 123 kit", 8);
        assert_eq!(topics, vec!["kit".to_string()]);
    }

    #[test]
    fn topics_respect_limit_and_dedupe() {
        let topics = extract_topics("alpha beta gamma", "alpha delta epsilon zeta eta theta", 3);
        assert_eq!(topics, vec!["alpha", "beta", "gamma"]);
    }
}
