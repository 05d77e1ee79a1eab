//! Value-set resolution
//!
//! Resolves value-set names to [`CodeSet`]s restricted to the systems a
//! criterion cares about. An unknown name resolves to an empty set; the
//! engine validates names up front so that only happens for ad-hoc queries.

use log::debug;
use octofhir_cqm_types::{CodeSet, CodeSystem, ValueSetLibrary};
use std::sync::Arc;

use crate::error::{EvalError, EvalResult};

/// Name-based lookup over a shared [`ValueSetLibrary`]
#[derive(Debug, Clone)]
pub struct TerminologyResolver {
    library: Arc<ValueSetLibrary>,
}

impl TerminologyResolver {
    pub fn new(library: Arc<ValueSetLibrary>) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &Arc<ValueSetLibrary> {
        &self.library
    }

    /// Fail when `name` is not in the library
    pub fn require(&self, name: &str) -> EvalResult<()> {
        if self.library.contains(name) {
            Ok(())
        } else {
            Err(EvalError::value_set_not_found(name))
        }
    }

    /// Codes of `name` in the requested systems; empty `systems` means all
    pub fn codes(&self, name: &str, systems: &[CodeSystem]) -> CodeSet {
        match self.library.get(name) {
            Some(set) if systems.is_empty() => set.all_codes(),
            Some(set) => set.codes(systems),
            None => {
                debug!("Value set '{}' is not loaded; resolving to no codes", name);
                CodeSet::new()
            }
        }
    }

    /// Union over several value sets
    pub fn codes_for_all<S: AsRef<str>>(&self, names: &[S], systems: &[CodeSystem]) -> CodeSet {
        names
            .iter()
            .fold(CodeSet::new(), |acc, name| acc.union(&self.codes(name.as_ref(), systems)))
    }

    /// Deterministic representative code, used to pre-populate orders
    pub fn first_code(&self, name: &str, system: CodeSystem) -> Option<String> {
        self.library
            .get(name)?
            .codes
            .get(&system)?
            .iter()
            .next()
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_cqm_types::ValueSet;

    fn resolver() -> TerminologyResolver {
        let library: ValueSetLibrary = [
            ValueSet::new("Colonoscopy")
                .with_codes(CodeSystem::Cpt, ["45378", "44388"])
                .with_codes(CodeSystem::SnomedCt, ["73761001"]),
            ValueSet::new("FOBT").with_codes(CodeSystem::Loinc, ["2335-8"]),
        ]
        .into_iter()
        .collect();
        TerminologyResolver::new(Arc::new(library))
    }

    #[test]
    fn test_codes_restricted_to_systems() {
        let codes = resolver().codes("Colonoscopy", &[CodeSystem::Cpt]);
        assert_eq!(codes.len(), 2);
        assert!(!codes.contains_code(CodeSystem::SnomedCt, "73761001"));
    }

    #[test]
    fn test_empty_systems_means_all() {
        assert_eq!(resolver().codes("Colonoscopy", &[]).len(), 3);
    }

    #[test]
    fn test_unknown_value_set_is_empty() {
        let r = resolver();
        assert!(r.codes("Nope", &[]).is_empty());
        assert!(matches!(r.require("Nope"), Err(EvalError::ValueSetNotFound { .. })));
        assert!(r.require("FOBT").is_ok());
    }

    #[test]
    fn test_union_and_first_code() {
        let r = resolver();
        assert_eq!(r.codes_for_all(&["Colonoscopy", "FOBT"], &[]).len(), 4);
        assert_eq!(r.first_code("Colonoscopy", CodeSystem::Cpt).as_deref(), Some("44388"));
        assert_eq!(r.first_code("FOBT", CodeSystem::Cpt), None);
    }
}
