/// Hashtag and mention extraction
///
/// Parses free text into deduplicated, order-preserving, capped lists of
/// normalized tag strings. Fails soft: malformed or empty input yields an
/// empty list, never an error, so extraction can never block content
/// creation.

/// Maximum number of tags kept per post
pub const MAX_TAGS_PER_POST: usize = 5;
/// Maximum tag length in characters
pub const MAX_TAG_LENGTH: usize = 30;

/// Extract `#hashtags` from text
pub fn extract_hashtags(text: &str) -> Vec<String> {
    extract_marked(text, '#')
}

/// Extract `@mentions` from text
pub fn extract_mentions(text: &str) -> Vec<String> {
    extract_marked(text, '@')
}

fn extract_marked(text: &str, marker: char) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != marker {
            continue;
        }

        let mut tag = String::new();
        while let Some(&next) = chars.peek() {
            // Unicode letter/number classes plus underscore
            if next.is_alphanumeric() || next == '_' {
                tag.push(next);
                chars.next();
            } else {
                break;
            }
        }

        if tag.is_empty() || tag.chars().count() > MAX_TAG_LENGTH {
            continue;
        }

        let normalized = tag.to_lowercase();
        if !out.contains(&normalized) {
            out.push(normalized);
            if out.len() == MAX_TAGS_PER_POST {
                break;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extraction() {
        assert_eq!(
            extract_hashtags("shipping #Rust and #async today"),
            vec!["rust", "async"]
        );
        assert_eq!(extract_mentions("cc @Alice and @bob"), vec!["alice", "bob"]);
    }

    #[test]
    fn test_dedup_preserves_first_occurrence_order() {
        assert_eq!(
            extract_hashtags("#b #a #B #a #c"),
            vec!["b", "a", "c"]
        );
    }

    #[test]
    fn test_count_cap() {
        let text = "#one #two #three #four #five #six #seven";
        assert_eq!(extract_hashtags(text).len(), MAX_TAGS_PER_POST);
    }

    #[test]
    fn test_length_cap_drops_tag() {
        let long = format!("#{}", "x".repeat(MAX_TAG_LENGTH + 1));
        assert!(extract_hashtags(&long).is_empty());

        let exact = format!("#{}", "x".repeat(MAX_TAG_LENGTH));
        assert_eq!(extract_hashtags(&exact).len(), 1);
    }

    #[test]
    fn test_unicode_tags() {
        assert_eq!(extract_hashtags("#caf\u{e9} #日本語 #tag_1"), vec!["caf\u{e9}", "日本語", "tag_1"]);
    }

    #[test]
    fn test_fails_soft_on_junk() {
        assert!(extract_hashtags("").is_empty());
        assert!(extract_hashtags("# # ###").is_empty());
        assert!(extract_hashtags("no tags here").is_empty());
    }

    #[test]
    fn test_punctuation_terminates_tag() {
        assert_eq!(extract_hashtags("end #rust."), vec!["rust"]);
        assert_eq!(extract_hashtags("(#rust)"), vec!["rust"]);
    }
}
