use std::collections::HashMap;

pub const DEFAULT_TOKEN: &str = "item";

const RESERVED_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Replaces characters that are not allowed in file names with `_` and trims
/// surrounding whitespace. Falls back to `default_token` when nothing is left.
pub fn sanitize_identifier(raw: &str, default_token: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        default_token.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Hands out unique tokens for one run. The Nth repeat of a token gets the
/// suffix `_N`, so the mapping only depends on encounter order.
#[derive(Debug, Default)]
pub struct DuplicateResolver {
    seen: HashMap<String, usize>,
}

impl DuplicateResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, candidate: &str) -> String {
        let Some(&first_suffix) = self.seen.get(candidate) else {
            self.seen.insert(candidate.to_string(), 1);
            return candidate.to_string();
        };
        // A suffixed name may already exist as a literal input token.
        let mut suffix = first_suffix;
        let mut suffixed = format!("{}_{}", candidate, suffix);
        while self.seen.contains_key(&suffixed) {
            suffix += 1;
            suffixed = format!("{}_{}", candidate, suffix);
        }
        self.seen.insert(candidate.to_string(), suffix + 1);
        self.seen.insert(suffixed.clone(), 1);
        suffixed
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_identifier("Jo/hn:Doe", DEFAULT_TOKEN), "Jo_hn_Doe");
        assert_eq!(sanitize_identifier(r#"a\b*c?d"e<f>g|h"#, DEFAULT_TOKEN), "a_b_c_d_e_f_g_h");
    }

    #[test]
    fn sanitize_trims_and_falls_back() {
        assert_eq!(sanitize_identifier("  jane-doe  ", DEFAULT_TOKEN), "jane-doe");
        assert_eq!(sanitize_identifier("   ", DEFAULT_TOKEN), "item");
        assert_eq!(sanitize_identifier("", "record"), "record");
    }

    #[test]
    fn sanitize_keeps_replaced_only_names() {
        // underscores are content, not whitespace
        assert_eq!(sanitize_identifier("//", DEFAULT_TOKEN), "__");
    }

    #[test]
    fn resolver_suffixes_in_encounter_order() {
        let mut resolver = DuplicateResolver::new();
        let out: Vec<String> = ["a", "a", "a"].iter().map(|t| resolver.resolve(t)).collect();
        assert_eq!(out, vec!["a", "a_1", "a_2"]);
    }

    #[test]
    fn resolver_tracks_tokens_independently() {
        let mut resolver = DuplicateResolver::new();
        assert_eq!(resolver.resolve("alice"), "alice");
        assert_eq!(resolver.resolve("bob"), "bob");
        assert_eq!(resolver.resolve("alice"), "alice_1");
        assert_eq!(resolver.resolve("bob"), "bob_1");
        assert_eq!(resolver.len(), 4);
    }

    #[test]
    fn resolver_skips_suffixes_taken_by_literal_tokens() {
        let mut resolver = DuplicateResolver::new();
        assert_eq!(resolver.resolve("a"), "a");
        assert_eq!(resolver.resolve("a_1"), "a_1");
        assert_eq!(resolver.resolve("a"), "a_2");
        assert_eq!(resolver.resolve("a"), "a_3");
        assert_eq!(resolver.resolve("a_1"), "a_1_1");
    }
}
