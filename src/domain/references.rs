//! Inline cross-reference extraction
//!
//! Prose may mention other units with `[skill:<id>]` or `[subagent:<id>]`.
//! Tokens are case-sensitive and ids are limited to `[a-z0-9-]`.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use super::id::UnitId;

static REFERENCE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?:skill|subagent):([a-z0-9-]+)\]").unwrap());

/// Ids referenced from a unit body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    /// First file line on which each id was referenced
    lines: BTreeMap<UnitId, usize>,
}

impl References {
    /// Deduplicated referenced ids, sorted
    pub fn ids(&self) -> impl Iterator<Item = &UnitId> {
        self.lines.keys()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lines.contains_key(id)
    }

    pub fn line_of(&self, id: &str) -> Option<usize> {
        self.lines.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Referenced ids that are not already declared dependencies
    pub fn inferred(&self, declared: &BTreeSet<UnitId>) -> BTreeSet<UnitId> {
        self.lines
            .keys()
            .filter(|id| !declared.contains(*id))
            .cloned()
            .collect()
    }
}

/// Scans `body` for reference tokens, skipping references to `self_id`
///
/// `first_line` is the file line the body starts on, so reported lines point
/// into the original file.
pub fn extract(body: &str, self_id: &UnitId, first_line: usize) -> References {
    let mut lines = BTreeMap::new();

    for (offset, line) in body.lines().enumerate() {
        for captures in REFERENCE_TOKEN.captures_iter(line) {
            let Some(id) = captures.get(1).and_then(|m| UnitId::new(m.as_str()).ok()) else {
                continue;
            };
            if &id == self_id {
                continue;
            }
            lines.entry(id).or_insert(first_line + offset);
        }
    }

    References { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(s: &str) -> UnitId {
        UnitId::new(s).unwrap()
    }

    fn ids(refs: &References) -> Vec<&str> {
        refs.ids().map(UnitId::as_str).collect()
    }

    #[test]
    fn finds_skill_and_subagent_tokens() {
        let body = "Use [skill:git-workflow] then ask [subagent:code-reviewer].";
        let refs = extract(body, &id("me"), 1);
        assert_eq!(ids(&refs), vec!["code-reviewer", "git-workflow"]);
    }

    #[test]
    fn deduplicates_and_keeps_first_line() {
        let body = "intro\n[skill:a]\n\n[skill:a] again";
        let refs = extract(body, &id("me"), 10);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs.line_of("a"), Some(11));
    }

    #[test]
    fn ignores_self_reference() {
        let refs = extract("see [skill:me] and [skill:other]", &id("me"), 1);
        assert_eq!(ids(&refs), vec!["other"]);
    }

    #[test]
    fn tokens_are_case_sensitive() {
        let refs = extract("[Skill:a] [skill:B] [SKILL:c] [command:d] [skill:My_Skill]", &id("me"), 1);
        assert!(refs.is_empty());
    }

    #[test]
    fn inferred_excludes_declared() {
        let refs = extract("[skill:d] [skill:e]", &id("c"), 1);
        let declared: BTreeSet<_> = [id("d")].into_iter().collect();

        let inferred = refs.inferred(&declared);
        assert!(!inferred.contains("d"));
        assert!(inferred.contains("e"));
        assert_eq!(inferred.len(), 1);
    }

    proptest! {
        #[test]
        fn embedded_token_is_always_found(
            target in "[a-z0-9]{1,6}(-[a-z0-9]{1,6}){0,2}",
            prefix in "[ a-zA-Z.,]{0,20}",
            suffix in "[ a-zA-Z.,]{0,20}",
        ) {
            let body = format!("{}[skill:{}]{}", prefix, target, suffix);
            let refs = extract(&body, &id("self-unit-x"), 1);
            prop_assert!(refs.contains(&target));
        }
    }
}
