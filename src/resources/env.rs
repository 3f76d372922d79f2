//! Environment variable union.

use std::collections::HashMap;

use crate::crd::EnvVar;

/// Merge env layers in order
///
/// A later layer replaces an earlier entry of the same name in place, so the
/// first-seen order of names is preserved.
#[must_use]
pub fn merge_env(layers: &[&[EnvVar]]) -> Vec<EnvVar> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut merged: Vec<EnvVar> = Vec::new();

    for env in layers.iter().flat_map(|layer| layer.iter()) {
        if let Some(&idx) = seen.get(env.name.as_str()) {
            merged[idx] = env.clone();
        } else {
            seen.insert(env.name.as_str(), merged.len());
            merged.push(env.clone());
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(env: &[EnvVar]) -> Vec<(String, String)> {
        env.iter()
            .map(|e| (e.name.clone(), e.value.clone().unwrap_or_default()))
            .collect()
    }

    #[test]
    fn test_later_layer_wins_in_place() {
        let template = vec![EnvVar::literal("A", "1"), EnvVar::literal("B", "2")];
        let instance = vec![EnvVar::literal("B", "override"), EnvVar::literal("C", "3")];
        let merged = merge_env(&[template.as_slice(), instance.as_slice()]);
        assert_eq!(
            pairs(&merged),
            vec![
                ("A".into(), "1".into()),
                ("B".into(), "override".into()),
                ("C".into(), "3".into())
            ]
        );
    }

    #[test]
    fn test_empty_layers() {
        assert!(merge_env(&[&[] as &[EnvVar], &[]]).is_empty());
    }

    #[test]
    fn test_duplicate_within_one_layer() {
        let layer = vec![EnvVar::literal("A", "1"), EnvVar::literal("A", "2")];
        assert_eq!(pairs(&merge_env(&[layer.as_slice()])), vec![("A".into(), "2".into())]);
    }
}
