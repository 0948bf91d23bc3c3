//! Conflict analysis between expected and triggered components

use std::collections::HashSet;

use crate::model::{ComponentRef, ConflictAnalysis, ConflictSeverity};

const TOKEN_SEPARATORS: &[char] = &['-', '_', ':', '.', '/'];

/// Lower-cased identifying tokens of a component name
///
/// Tokens shorter than `min_len` carry too little domain meaning to count as
/// overlap and are dropped.
pub fn domain_tokens(name: &str, min_len: usize) -> HashSet<String> {
    name.split(|c: char| c.is_whitespace() || TOKEN_SEPARATORS.contains(&c))
        .filter(|token| token.chars().count() >= min_len)
        .map(str::to_lowercase)
        .collect()
}

fn severity_of(
    expected_tokens: &HashSet<String>,
    other: &ComponentRef,
    min_len: usize,
) -> ConflictSeverity {
    let shares_domain = domain_tokens(&other.name, min_len)
        .iter()
        .any(|token| expected_tokens.contains(token));
    if shares_domain {
        ConflictSeverity::Minor
    } else {
        ConflictSeverity::Major
    }
}

/// Compare the deduplicated triggered set against the expected component
///
/// Any entry other than the expected one is a conflict. Severity is the worst
/// over the conflicting entries: minor when an entry shares a domain token of
/// at least `min_shared_token_len` characters with the expected name, major
/// otherwise.
pub fn analyze_conflicts(
    expected: &ComponentRef,
    triggered: &[ComponentRef],
    min_shared_token_len: usize,
) -> ConflictAnalysis {
    let expected_tokens = domain_tokens(&expected.name, min_shared_token_len);

    let severity = triggered
        .iter()
        .filter(|component| *component != expected)
        .map(|component| severity_of(&expected_tokens, component, min_shared_token_len))
        .max()
        .unwrap_or(ConflictSeverity::None);

    ConflictAnalysis {
        expected: expected.clone(),
        triggered: triggered.to_vec(),
        has_conflict: severity != ConflictSeverity::None,
        severity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens() {
        let tokens = domain_tokens("git-commit_helper", 4);
        assert!(tokens.contains("commit"));
        assert!(tokens.contains("helper"));
        assert!(!tokens.contains("git"));
    }

    #[test]
    fn test_only_expected_is_not_a_conflict() {
        let expected = ComponentRef::skill("commit");
        let analysis = analyze_conflicts(&expected, &[expected.clone()], 4);
        assert!(!analysis.has_conflict);
        assert_eq!(analysis.severity, ConflictSeverity::None);
    }

    #[test]
    fn test_empty_is_not_a_conflict() {
        let analysis = analyze_conflicts(&ComponentRef::skill("commit"), &[], 4);
        assert!(!analysis.has_conflict);
        assert!(analysis.triggered.is_empty());
    }

    #[test]
    fn test_shared_domain_is_minor() {
        let analysis = analyze_conflicts(
            &ComponentRef::skill("commit-message"),
            &[ComponentRef::skill("commit-lint")],
            4,
        );
        assert!(analysis.has_conflict);
        assert_eq!(analysis.severity, ConflictSeverity::Minor);
    }

    #[test]
    fn test_unrelated_is_major() {
        let analysis = analyze_conflicts(
            &ComponentRef::skill("my-skill"),
            &[ComponentRef::skill("other-skill")],
            6,
        );
        assert_eq!(analysis.severity, ConflictSeverity::Major);

        // With a lower threshold "skill" counts as shared domain.
        let lenient = analyze_conflicts(
            &ComponentRef::skill("my-skill"),
            &[ComponentRef::skill("other-skill")],
            4,
        );
        assert_eq!(lenient.severity, ConflictSeverity::Minor);
    }

    #[test]
    fn test_worst_severity_wins() {
        let expected = ComponentRef::command("deploy-prod");
        let analysis = analyze_conflicts(
            &expected,
            &[
                expected.clone(),
                ComponentRef::command("deploy-staging"),
                ComponentRef::agent("reviewer"),
            ],
            4,
        );
        assert_eq!(analysis.severity, ConflictSeverity::Major);
        assert_eq!(analysis.conflicting().count(), 2);
    }

    #[test]
    fn test_same_name_different_kind_conflicts() {
        let analysis = analyze_conflicts(
            &ComponentRef::skill("deploy"),
            &[ComponentRef::command("deploy")],
            4,
        );
        assert!(analysis.has_conflict);
        assert_eq!(analysis.severity, ConflictSeverity::Minor);
    }
}
