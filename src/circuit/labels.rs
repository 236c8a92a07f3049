//! Bidirectional mapping between node labels and matrix indices.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{Result, SimError};

/// Label to index map that stays a bijection.
///
/// Adding a label removes any previous label at the same index and any
/// previous index of the same label, so the last write wins on both sides.
#[derive(Debug, Clone, Default)]
pub struct LabelResolver {
    label_to_index: HashMap<String, usize>,
    index_to_label: BTreeMap<usize, String>,
}

impl LabelResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a label list where position is the index. Empty entries are skipped.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut resolver = Self::new();
        for (index, label) in labels.iter().enumerate() {
            let label = label.as_ref();
            if !label.is_empty() {
                resolver.insert(label.to_string(), index);
            }
        }
        resolver
    }

    /// Build from an explicit label map.
    pub fn from_map(map: &HashMap<String, usize>) -> Self {
        let mut resolver = Self::new();
        let mut entries: Vec<_> = map.iter().collect();
        entries.sort_by_key(|(label, index)| (**index, (*label).clone()));
        for (label, index) in entries {
            if !label.is_empty() {
                resolver.insert(label.clone(), *index);
            }
        }
        resolver
    }

    /// Map `label` to `index`, replacing previous mappings of either.
    pub fn add_label(&mut self, label: &str, index: usize) -> Result<()> {
        if label.is_empty() {
            return Err(SimError::InvalidLabel {
                message: "label cannot be empty".to_string(),
            });
        }
        self.insert(label.to_string(), index);
        Ok(())
    }

    pub(crate) fn insert(&mut self, label: String, index: usize) {
        if let Some(old_index) = self.label_to_index.remove(&label) {
            self.index_to_label.remove(&old_index);
        }
        if let Some(old_label) = self.index_to_label.remove(&index) {
            self.label_to_index.remove(&old_label);
        }
        self.label_to_index.insert(label.clone(), index);
        self.index_to_label.insert(index, label);
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.label_to_index.get(label).copied()
    }

    pub fn label_at(&self, index: usize) -> Option<&str> {
        self.index_to_label.get(&index).map(String::as_str)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.label_to_index.contains_key(label)
    }

    pub fn has_label_at_index(&self, index: usize) -> bool {
        self.index_to_label.contains_key(&index)
    }

    /// Index of `label`, or a [`SimError::LabelNotFound`] naming `component`.
    pub fn index_or_error(&self, label: &str, component: &str) -> Result<usize> {
        self.index_of(label)
            .ok_or_else(|| SimError::label_not_found(label, component))
    }

    pub fn len(&self) -> usize {
        self.label_to_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.label_to_index.is_empty()
    }

    /// All labels, ordered by index.
    pub fn labels(&self) -> Vec<&str> {
        self.index_to_label.values().map(String::as_str).collect()
    }

    /// All mapped indices in ascending order.
    pub fn indices(&self) -> Vec<usize> {
        self.index_to_label.keys().copied().collect()
    }

    /// Dense list where position `i` holds the label of index `i` (empty if none).
    pub fn label_list(&self) -> Vec<String> {
        let len = self.index_to_label.keys().next_back().map_or(0, |max| max + 1);
        let mut list = vec![String::new(); len];
        for (index, label) in &self.index_to_label {
            list[*index] = label.clone();
        }
        list
    }

    pub fn find_labels_with_prefix(&self, prefix: &str) -> Vec<&str> {
        self.index_to_label
            .values()
            .filter(|label| label.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }

    /// The subset of `required` that has no mapping.
    pub fn validate_labels<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        required
            .into_iter()
            .filter(|label| !self.has_label(label))
            .map(str::to_string)
            .collect()
    }

    pub fn remove_label(&mut self, label: &str) -> bool {
        match self.label_to_index.remove(label) {
            Some(index) => {
                self.index_to_label.remove(&index);
                true
            }
            None => false,
        }
    }

    pub fn remove_label_at_index(&mut self, index: usize) -> bool {
        match self.index_to_label.remove(&index) {
            Some(label) => {
                self.label_to_index.remove(&label);
                true
            }
            None => false,
        }
    }

    /// New resolver with the mappings of `self` and `other`; `other` wins.
    pub fn merge(&self, other: &LabelResolver) -> LabelResolver {
        let mut merged = self.clone();
        for (index, label) in &other.index_to_label {
            merged.insert(label.clone(), *index);
        }
        merged
    }

    pub fn clear(&mut self) {
        self.label_to_index.clear();
        self.index_to_label.clear();
    }
}

impl PartialEq for LabelResolver {
    fn eq(&self, other: &Self) -> bool {
        self.label_to_index == other.label_to_index
    }
}

impl fmt::Display for LabelResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LabelResolver[count={}]", self.len())?;
        for (index, label) in &self.index_to_label {
            writeln!(f, "  \"{}\" -> {}", label, index)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut labels = LabelResolver::new();
        labels.add_label("Vout", 7).unwrap();
        assert_eq!(labels.index_of("Vout"), Some(7));
        assert_eq!(labels.label_at(7), Some("Vout"));
    }

    #[test]
    fn test_missing_label_names_component() {
        let labels = LabelResolver::new();
        let err = labels.index_or_error("missing", "M1").unwrap_err();
        assert!(matches!(
            &err,
            SimError::LabelNotFound { label, component } if label == "missing" && component == "M1"
        ));
        assert!(err.to_string().contains("M1"));
    }

    #[test]
    fn test_last_write_wins() {
        let mut labels = LabelResolver::new();
        labels.add_label("a", 1).unwrap();
        labels.add_label("b", 1).unwrap();
        assert!(!labels.has_label("a"));
        assert_eq!(labels.label_at(1), Some("b"));

        labels.add_label("b", 2).unwrap();
        assert!(!labels.has_label_at_index(1));
        assert_eq!(labels.index_of("b"), Some(2));
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn test_empty_label_rejected() {
        let mut labels = LabelResolver::new();
        assert!(matches!(labels.add_label("", 3), Err(SimError::InvalidLabel { .. })));
    }

    #[test]
    fn test_construction_and_queries() {
        let labels = LabelResolver::from_labels(&["gnd", "", "in", "out"]);
        assert_eq!(labels.indices(), vec![0, 2, 3]);
        assert_eq!(labels.label_list(), vec!["gnd", "", "in", "out"]);
        assert_eq!(labels.validate_labels(["in", "x"]), vec!["x".to_string()]);

        let map: HashMap<String, usize> = [("o1".to_string(), 4), ("o2".to_string(), 5)].into();
        let other = LabelResolver::from_map(&map);
        assert_eq!(other.find_labels_with_prefix("o"), vec!["o1", "o2"]);

        let merged = labels.merge(&other);
        assert_eq!(merged.len(), 5);
        assert_eq!(merged.labels(), vec!["gnd", "in", "out", "o1", "o2"]);
    }

    #[test]
    fn test_remove() {
        let mut labels = LabelResolver::from_labels(&["a", "b"]);
        assert!(labels.remove_label("a"));
        assert!(!labels.remove_label("a"));
        assert!(labels.remove_label_at_index(1));
        assert!(labels.is_empty());
        labels.add_label("c", 0).unwrap();
        labels.clear();
        assert!(labels.is_empty());
    }
}
