//! The subject registry: what is installed right now.
//!
//! Enumerating installed applications is the host's job. The engine only
//! needs to list them (to build the search index) and to check whether a
//! subject with usage history still exists.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::core::search::Candidate;

/// Lists and resolves live subjects.
pub trait SubjectRegistry: Send + Sync {
    /// Every subject that can currently be chosen.
    fn list_candidates(&self) -> Vec<Candidate>;

    /// The display name of a subject, or `None` once it is gone.
    fn resolve_label(&self, subject_id: &str) -> Option<String>;
}

/// A registry backed by a list the host keeps up to date.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    subjects: RwLock<Vec<Candidate>>,
}

impl StaticRegistry {
    pub fn new(subjects: Vec<Candidate>) -> Self {
        Self {
            subjects: RwLock::new(subjects),
        }
    }

    /// Replace the whole list (e.g. after a rescan).
    pub fn replace(&self, subjects: Vec<Candidate>) {
        if let Ok(mut current) = self.subjects.write() {
            *current = subjects;
        }
    }

    /// Add a subject, or rename it if the id is already known.
    pub fn insert(&self, candidate: Candidate) {
        if let Ok(mut current) = self.subjects.write() {
            match current.iter_mut().find(|c| c.subject_id == candidate.subject_id) {
                Some(existing) => existing.name = candidate.name,
                None => current.push(candidate),
            }
        }
    }

    /// Drop a subject. Returns whether it was present.
    pub fn remove(&self, subject_id: &str) -> bool {
        match self.subjects.write() {
            Ok(mut current) => {
                let before = current.len();
                current.retain(|c| c.subject_id != subject_id);
                current.len() != before
            }
            Err(_) => false,
        }
    }
}

impl SubjectRegistry for StaticRegistry {
    fn list_candidates(&self) -> Vec<Candidate> {
        self.subjects
            .read()
            .map(|subjects| subjects.clone())
            .unwrap_or_default()
    }

    fn resolve_label(&self, subject_id: &str) -> Option<String> {
        let subjects = self.subjects.read().ok()?;
        subjects
            .iter()
            .find(|c| c.subject_id == subject_id)
            .map(|c| c.name.clone())
    }
}

/// Lookup-only registry, handy when the host already has a map.
impl SubjectRegistry for HashMap<String, String> {
    fn list_candidates(&self) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = self
            .iter()
            .map(|(id, name)| Candidate::new(name.clone(), id.clone()))
            .collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        candidates
    }

    fn resolve_label(&self, subject_id: &str) -> Option<String> {
        self.get(subject_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_registry() {
        let registry = StaticRegistry::new(vec![Candidate::new("Maps", "app.maps")]);
        assert_eq!(registry.resolve_label("app.maps").as_deref(), Some("Maps"));
        assert_eq!(registry.resolve_label("app.gone"), None);

        registry.insert(Candidate::new("Clock", "app.clock"));
        registry.insert(Candidate::new("Google Maps", "app.maps"));
        assert_eq!(registry.list_candidates().len(), 2);
        assert_eq!(
            registry.resolve_label("app.maps").as_deref(),
            Some("Google Maps")
        );

        assert!(registry.remove("app.clock"));
        assert!(!registry.remove("app.clock"));
        assert_eq!(registry.list_candidates().len(), 1);
    }

    #[test]
    fn test_map_registry_lists_sorted() {
        let mut map = HashMap::new();
        map.insert("b".to_string(), "Zebra".to_string());
        map.insert("a".to_string(), "Ant".to_string());

        let names: Vec<String> = map.list_candidates().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Ant", "Zebra"]);
        assert_eq!(map.resolve_label("b").as_deref(), Some("Zebra"));
    }
}
