//! Search-term generation from issue metadata.
//!
//! Pages rarely mention every issue key, but they do name the squads and
//! initiatives that own the work. Terms are built in this order, each group
//! deduplicated and cut to its configured size:
//!
//! 1. `sync.extra_terms` (fixed prefixes or team names)
//! 2. distinct squad names
//! 3. distinct initiative names
//! 4. issue keys
//!
//! A term already present in an earlier group is not repeated. The per-run
//! cap is applied later, when the terms are queried.

use std::collections::HashSet;

use crate::config::SyncConfig;
use crate::models::Issue;

pub fn build_search_terms(issues: &[Issue], config: &SyncConfig) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut terms = Vec::new();

    push_group(
        &mut terms,
        &mut seen,
        config.extra_terms.iter().map(String::as_str),
        usize::MAX,
    );
    push_group(
        &mut terms,
        &mut seen,
        issues.iter().filter_map(|i| i.squad.as_deref()),
        config.squad_terms,
    );
    push_group(
        &mut terms,
        &mut seen,
        issues.iter().filter_map(|i| i.initiative.as_deref()),
        config.initiative_terms,
    );
    push_group(
        &mut terms,
        &mut seen,
        issues.iter().map(|i| i.key.as_str()),
        config.issue_key_terms,
    );

    terms
}

fn push_group<'a>(
    terms: &mut Vec<String>,
    seen: &mut HashSet<String>,
    group: impl Iterator<Item = &'a str>,
    limit: usize,
) {
    let mut taken = 0;
    for term in group {
        if taken == limit {
            break;
        }
        let term = term.trim();
        if term.is_empty() || !seen.insert(term.to_string()) {
            continue;
        }
        terms.push(term.to_string());
        taken += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IssueKey;

    fn issue(key: &str, squad: Option<&str>, initiative: Option<&str>) -> Issue {
        Issue {
            key: IssueKey::parse(key).unwrap(),
            summary: None,
            initiative: initiative.map(str::to_string),
            squad: squad.map(str::to_string),
        }
    }

    #[test]
    fn test_group_order_and_dedup() {
        let issues = vec![
            issue("OBD-1", Some("Checkout"), Some("Roadmap")),
            issue("OBD-2", Some("Checkout"), None),
            issue("APM-1", Some("Platform"), Some("Roadmap")),
        ];
        let config = SyncConfig {
            extra_terms: vec!["OBD".to_string(), "Platform".to_string()],
            ..SyncConfig::default()
        };
        let terms = build_search_terms(&issues, &config);
        assert_eq!(
            terms,
            vec!["OBD", "Platform", "Checkout", "Roadmap", "OBD-1", "OBD-2", "APM-1"]
        );
    }

    #[test]
    fn test_group_limits() {
        let issues: Vec<Issue> = (1..=40)
            .map(|n| {
                let key = format!("IN-{}", n);
                let squad = format!("squad {}", n);
                let init = format!("init {}", n);
                issue(&key, Some(&squad), Some(&init))
            })
            .collect();
        let terms = build_search_terms(&issues, &SyncConfig::default());
        // 5 squads + 10 initiatives + 30 keys
        assert_eq!(terms.len(), 45);
        assert_eq!(terms[0], "squad 1");
        assert_eq!(terms[5], "init 1");
        assert_eq!(terms[15], "IN-1");
        assert_eq!(terms.last().unwrap(), "IN-30");
    }

    #[test]
    fn test_blank_names_ignored() {
        let issues = vec![issue("OBD-1", Some("  "), Some(""))];
        assert_eq!(build_search_terms(&issues, &SyncConfig::default()), vec!["OBD-1"]);
    }
}
