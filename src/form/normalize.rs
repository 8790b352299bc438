use serde::{Deserialize, Serialize};

/// Number of leading characters of an alias used for prefix matching
pub const ALIAS_PREFIX_LEN: usize = 20;

/// How an alias pattern is tested against a raw label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "pattern", rename_all = "snake_case")]
pub enum Matcher {
    Contains(String),
    StartsWith(String),
}

impl Matcher {
    pub fn matches(&self, label: &str) -> bool {
        match self {
            Matcher::Contains(p) => !p.is_empty() && label.contains(p.as_str()),
            Matcher::StartsWith(p) => !p.is_empty() && label.starts_with(p.as_str()),
        }
    }
}

/// What a matching alias maps the label to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasTarget {
    Canonical(String),
    /// Recognized placeholder; rows carrying it are dropped
    Exclude,
}

/// One entry of the ordered alias table. It matches when any of its matchers does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRule {
    pub matchers: Vec<Matcher>,
    pub target: AliasTarget,
}

impl AliasRule {
    /// Rule matching labels that contain `alias` or start with its first
    /// [`ALIAS_PREFIX_LEN`] characters
    pub fn substring_or_prefix(alias: &str, target: AliasTarget) -> Self {
        let prefix: String = alias.chars().take(ALIAS_PREFIX_LEN).collect();
        AliasRule {
            matchers: vec![Matcher::Contains(alias.to_string()), Matcher::StartsWith(prefix)],
            target,
        }
    }

    pub fn canonical(alias: &str, canonical: &str) -> Self {
        Self::substring_or_prefix(alias, AliasTarget::Canonical(canonical.to_string()))
    }

    pub fn exclude(alias: &str) -> Self {
        Self::substring_or_prefix(alias, AliasTarget::Exclude)
    }

    pub fn matches(&self, label: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(label))
    }
}

/// Outcome of normalizing a raw entity label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Canonical(String),
    Excluded,
    Blank,
}

impl Normalized {
    pub fn into_name(self) -> Option<String> {
        match self {
            Normalized::Canonical(name) => Some(name),
            Normalized::Excluded | Normalized::Blank => None,
        }
    }
}

/// Map a raw label to its canonical name. The first matching rule wins; with
/// no match the trimmed label passes through.
pub fn normalize_name(raw: &str, aliases: &[AliasRule]) -> Normalized {
    let label = raw.trim();
    if label.is_empty() {
        return Normalized::Blank;
    }

    match aliases.iter().find(|rule| rule.matches(label)) {
        Some(AliasRule {
            target: AliasTarget::Canonical(name),
            ..
        }) => Normalized::Canonical(name.clone()),
        Some(AliasRule {
            target: AliasTarget::Exclude,
            ..
        }) => Normalized::Excluded,
        None => Normalized::Canonical(label.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_aliases;

    #[test]
    fn test_alias_variants_resolve_to_canonical() {
        let aliases = default_aliases();
        let expected = Normalized::Canonical("Ngenla (Pfizer)".to_string());
        assert_eq!(
            normalize_name("Other. (somatrogon (NGENLA) 60mg/1.2mL PFP 1's)", &aliases),
            expected
        );
        assert_eq!(normalize_name("  Other. (somatrogon (NGENLA) 24mg", &aliases), expected);
        assert_eq!(normalize_name("Other", &aliases), expected);
    }

    #[test]
    fn test_placeholder_is_excluded_before_general_alias() {
        let aliases = default_aliases();
        assert_eq!(normalize_name("Other, please specify", &aliases), Normalized::Excluded);
    }

    #[test]
    fn test_unmatched_label_passes_through_trimmed() {
        let aliases = default_aliases();
        assert_eq!(
            normalize_name("  Genotropin (Pfizer) ", &aliases),
            Normalized::Canonical("Genotropin (Pfizer)".to_string())
        );
        assert_eq!(normalize_name("   ", &aliases), Normalized::Blank);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let aliases = default_aliases();
        for raw in [
            "Other. (somatrogon (NGENLA)",
            "Genotropin (Pfizer)",
            "Omnitrope (Sandoz)",
            "Ngenla (Pfizer)",
        ] {
            let once = normalize_name(raw, &aliases).into_name().unwrap();
            let twice = normalize_name(&once, &aliases).into_name().unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_rule_order_is_significant() {
        let general_first = vec![
            AliasRule::canonical("Widget", "Widget"),
            AliasRule::canonical("Widget Pro", "Widget Pro"),
        ];
        assert_eq!(
            normalize_name("Widget Pro 2", &general_first),
            Normalized::Canonical("Widget".to_string())
        );
    }

    #[test]
    fn test_prefix_matcher_uses_first_twenty_chars() {
        let rule = AliasRule::canonical("ABCDEFGHIJKLMNOPQRSTUVWXYZ", "Alphabet");
        assert!(rule.matches("ABCDEFGHIJKLMNOPQRST-truncated"));
        assert!(!rule.matches("ABCDEFGHIJKLMNOPQRS"));
    }
}
