//! Label selector parsing and matching
//!
//! Selectors use the Kubernetes `LabelSelector` type. The textual form
//! accepted by [`parse`] is the one `kubectl -l` takes:
//! `app=web,tier!=cache,env in (prod,staging),canary,!legacy`.

use anyhow::{bail, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use std::collections::BTreeMap;

/// Parse a `kubectl`-style selector string. An empty string selects everything.
pub fn parse(input: &str) -> Result<LabelSelector> {
    let mut match_labels = BTreeMap::new();
    let mut expressions = Vec::new();

    for term in split_terms(input)? {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }

        if let Some(key) = term.strip_prefix('!') {
            expressions.push(requirement(key.trim(), "DoesNotExist", None)?);
        } else if let Some((key, value)) = term.split_once("!=") {
            expressions.push(requirement(
                key.trim(),
                "NotIn",
                Some(vec![value.trim().to_string()]),
            )?);
        } else if let Some((key, value)) = term.split_once("==").or_else(|| term.split_once('=')) {
            let key = checked_key(key.trim())?;
            match_labels.insert(key.to_string(), value.trim().to_string());
        } else if let Some((key, values)) = set_term(term, " notin ") {
            expressions.push(requirement(key, "NotIn", Some(values?))?);
        } else if let Some((key, values)) = set_term(term, " in ") {
            expressions.push(requirement(key, "In", Some(values?))?);
        } else {
            expressions.push(requirement(term, "Exists", None)?);
        }
    }

    Ok(LabelSelector {
        match_labels: (!match_labels.is_empty()).then_some(match_labels),
        match_expressions: (!expressions.is_empty()).then_some(expressions),
    })
}

/// Whether `labels` satisfy every clause of `selector`
pub fn matches(selector: &LabelSelector, labels: &BTreeMap<String, String>) -> bool {
    let labels_match = selector
        .match_labels
        .iter()
        .flatten()
        .all(|(key, value)| labels.get(key) == Some(value));

    labels_match
        && selector
            .match_expressions
            .iter()
            .flatten()
            .all(|req| requirement_matches(req, labels))
}

fn requirement_matches(req: &LabelSelectorRequirement, labels: &BTreeMap<String, String>) -> bool {
    let value = labels.get(&req.key);
    let values = req.values.as_deref().unwrap_or_default();
    match req.operator.as_str() {
        "In" => value.is_some_and(|v| values.contains(v)),
        "NotIn" => value.map_or(true, |v| !values.contains(v)),
        "Exists" => value.is_some(),
        "DoesNotExist" => value.is_none(),
        _ => false,
    }
}

/// Split on commas that are not inside a parenthesised value set
fn split_terms(input: &str) -> Result<Vec<&str>> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    bail!("unbalanced ')' in selector {input:?}");
                }
                depth -= 1;
            }
            ',' if depth == 0 => {
                terms.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        bail!("unbalanced '(' in selector {input:?}");
    }
    terms.push(&input[start..]);
    Ok(terms)
}

fn set_term<'a>(term: &'a str, operator: &str) -> Option<(&'a str, Result<Vec<String>>)> {
    let (key, rest) = term.split_once(operator)?;
    let rest = rest.trim();
    let values = match rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => Ok(inner
            .split(',')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()),
        None => Err(anyhow::anyhow!("expected a parenthesised value set in {term:?}")),
    };
    Some((key.trim(), values))
}

fn checked_key(key: &str) -> Result<&str> {
    if key.is_empty() || key.contains(char::is_whitespace) {
        bail!("invalid label key {key:?}");
    }
    Ok(key)
}

fn requirement(
    key: &str,
    operator: &str,
    values: Option<Vec<String>>,
) -> Result<LabelSelectorRequirement> {
    Ok(LabelSelectorRequirement {
        key: checked_key(key)?.to_string(),
        operator: operator.to_string(),
        values,
    })
}
