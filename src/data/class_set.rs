use serde::{Deserialize, Serialize};

/// Ordered set of diagnostic class labels.
///
/// The order is significant: it defines the index mapping of the
/// probability vector and must match the order the classifier was trained
/// with. One entry is designated the healthy class; predictions of any
/// other label get a heatmap attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSet {
    names: Vec<String>,
    healthy: usize,
}

impl Default for ClassSet {
    fn default() -> Self {
        Self {
            names: vec!["NORMAL".to_string(), "BACTERIAL".to_string(), "VIRAL".to_string()],
            healthy: 0,
        }
    }
}

impl ClassSet {
    pub fn from_names(names: &[&str], healthy_label: &str) -> Option<Self> {
        if names.is_empty() {
            return None;
        }
        let healthy = names.iter().position(|n| *n == healthy_label)?;
        Some(Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            healthy,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(|n| n.as_str())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn healthy_index(&self) -> usize {
        self.healthy
    }

    pub fn healthy_name(&self) -> &str {
        &self.names[self.healthy]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_order_matches_training_order() {
        let classes = ClassSet::default();
        assert_eq!(classes.len(), 3);
        assert_eq!(classes.name(0), Some("NORMAL"));
        assert_eq!(classes.name(1), Some("BACTERIAL"));
        assert_eq!(classes.name(2), Some("VIRAL"));
        assert_eq!(classes.healthy_name(), "NORMAL");
    }

    #[test]
    fn from_names_resolves_healthy_index() {
        let classes = ClassSet::from_names(&["A", "B", "HEALTHY"], "HEALTHY").unwrap();
        assert_eq!(classes.healthy_index(), 2);

        assert!(ClassSet::from_names(&["A", "B"], "missing").is_none());
        assert!(ClassSet::from_names(&[], "A").is_none());
    }
}
