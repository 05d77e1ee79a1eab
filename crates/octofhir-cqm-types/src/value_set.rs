//! Value sets and resolved code sets

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::codes::{CodeSystem, Coding};
use crate::error::TypesResult;

/// A named, versioned enumeration of codes across terminology systems
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSet {
    /// Human readable name, used as the lookup key
    pub name: String,
    /// Published object identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expansion_version: Option<String>,
    /// Codes grouped by system
    #[serde(default)]
    pub codes: BTreeMap<CodeSystem, BTreeSet<String>>,
}

impl ValueSet {
    /// Create an empty value set
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            oid: None,
            definition_version: None,
            expansion_version: None,
            codes: BTreeMap::new(),
        }
    }

    /// Set the object identifier
    pub fn with_oid(mut self, oid: impl Into<String>) -> Self {
        self.oid = Some(oid.into());
        self
    }

    /// Add codes for a system
    pub fn with_codes<I, S>(mut self, system: CodeSystem, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self.codes.entry(system).or_default();
        entry.extend(codes.into_iter().map(|c| system.normalize_code(c.as_ref()).into_owned()));
        self
    }

    /// Union of the requested systems' codes. Systems the value set does not
    /// define contribute nothing.
    pub fn codes(&self, systems: &[CodeSystem]) -> CodeSet {
        let mut set = CodeSet::default();
        for system in systems {
            if let Some(codes) = self.codes.get(system) {
                set.extend(*system, codes.iter().map(String::as_str));
            }
        }
        set
    }

    /// Every code in every system
    pub fn all_codes(&self) -> CodeSet {
        let mut set = CodeSet::default();
        for (system, codes) in &self.codes {
            set.extend(*system, codes.iter().map(String::as_str));
        }
        set
    }
}

/// A resolved set of `(system, code)` pairs used for membership tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeSet {
    entries: BTreeMap<CodeSystem, BTreeSet<String>>,
}

impl CodeSet {
    /// Create an empty code set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a code set from literal pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (CodeSystem, &'a str)>) -> Self {
        let mut set = Self::default();
        for (system, code) in pairs {
            set.insert(system, code);
        }
        set
    }

    /// Insert a single code
    pub fn insert(&mut self, system: CodeSystem, code: &str) {
        self.entries
            .entry(system)
            .or_default()
            .insert(system.normalize_code(code).into_owned());
    }

    /// Insert several codes of one system
    pub fn extend<'a>(&mut self, system: CodeSystem, codes: impl IntoIterator<Item = &'a str>) {
        let entry = self.entries.entry(system).or_default();
        entry.extend(codes.into_iter().map(|c| system.normalize_code(c).into_owned()));
    }

    /// Merge another code set into this one
    pub fn union(mut self, other: &CodeSet) -> Self {
        for (system, codes) in &other.entries {
            self.entries.entry(*system).or_default().extend(codes.iter().cloned());
        }
        self
    }

    /// Membership on the `(system, code)` pair
    pub fn contains_code(&self, system: CodeSystem, code: &str) -> bool {
        self.entries
            .get(&system)
            .is_some_and(|codes| codes.contains(system.normalize_code(code).as_ref()))
    }

    /// Membership of a recorded coding; unrecognised systems never match
    pub fn contains(&self, coding: &Coding) -> bool {
        coding
            .code_system()
            .is_some_and(|system| self.contains_code(system, &coding.code))
    }

    /// True when any of the codings is a member
    pub fn contains_any<'a>(&self, codings: impl IntoIterator<Item = &'a Coding>) -> bool {
        codings.into_iter().any(|c| self.contains(c))
    }

    /// Codes of one system, in sorted order
    pub fn codes_for(&self, system: CodeSystem) -> impl Iterator<Item = &str> {
        self.entries.get(&system).into_iter().flatten().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(BTreeSet::is_empty)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }
}

/// An ordered collection of value sets keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueSetLibrary {
    sets: IndexMap<String, ValueSet>,
}

impl ValueSetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of value sets
    pub fn from_json(json: &str) -> TypesResult<Self> {
        let sets: Vec<ValueSet> = serde_json::from_str(json)?;
        Ok(sets.into_iter().collect())
    }

    /// Add a value set, replacing any previous set with the same name
    pub fn insert(&mut self, value_set: ValueSet) -> Option<ValueSet> {
        self.sets.insert(value_set.name.clone(), value_set)
    }

    /// Merge another library into this one; later sets win
    pub fn merge(&mut self, other: ValueSetLibrary) {
        self.sets.extend(other.sets);
    }

    pub fn get(&self, name: &str) -> Option<&ValueSet> {
        self.sets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValueSet> {
        self.sets.values()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl FromIterator<ValueSet> for ValueSetLibrary {
    fn from_iter<T: IntoIterator<Item = ValueSet>>(iter: T) -> Self {
        let mut library = Self::default();
        for set in iter {
            library.insert(set);
        }
        library
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hospice() -> ValueSet {
        ValueSet::new("Hospice Care Ambulatory")
            .with_oid("2.16.840.1.113762.1.4.1584.1")
            .with_codes(CodeSystem::SnomedCt, ["385763009", "385765002"])
            .with_codes(CodeSystem::Cpt, ["99377"])
    }

    #[test]
    fn test_codes_union_of_requested_systems() {
        let set = hospice().codes(&[CodeSystem::SnomedCt, CodeSystem::Loinc]);
        assert_eq!(set.len(), 2);
        assert!(set.contains_code(CodeSystem::SnomedCt, "385763009"));
        assert!(!set.contains_code(CodeSystem::Cpt, "99377"));
    }

    #[test]
    fn test_membership_is_on_pair() {
        let set = hospice().all_codes();
        assert!(set.contains(&Coding::new(CodeSystem::Cpt, "99377")));
        assert!(!set.contains(&Coding::new(CodeSystem::Loinc, "99377")));
        assert!(!set.contains(&Coding {
            system: "local".into(),
            code: "99377".into(),
            display: None,
        }));
    }

    #[test]
    fn test_icd_codes_normalised_on_insert() {
        let set = ValueSet::new("Colorectal Cancer")
            .with_codes(CodeSystem::Icd10Cm, ["C18.0"])
            .all_codes();
        assert!(set.contains_code(CodeSystem::Icd10Cm, "C180"));
        assert!(set.contains_code(CodeSystem::Icd10Cm, "c18.0"));
    }

    #[test]
    fn test_library_from_json() {
        let json = r#"[
            {
                "name": "Fecal Occult Blood Test (FOBT)",
                "oid": "2.16.840.1.113883.3.464.1003.198.12.1011",
                "expansion_version": "eCQM Update 2024-05-02",
                "codes": { "LOINC": ["2335-8", "12503-9"] }
            }
        ]"#;
        let library = ValueSetLibrary::from_json(json).unwrap();
        assert_eq!(library.len(), 1);
        let fobt = library.get("Fecal Occult Blood Test (FOBT)").unwrap();
        assert_eq!(fobt.codes(&[CodeSystem::Loinc]).codes_for(CodeSystem::Loinc).collect::<Vec<_>>(), vec!["12503-9", "2335-8"]);
    }

    #[test]
    fn test_library_rejects_unknown_system() {
        let json = r#"[{ "name": "x", "codes": { "FDB": ["1"] } }]"#;
        assert!(ValueSetLibrary::from_json(json).is_err());
    }

    #[test]
    fn test_union() {
        let a = CodeSet::from_pairs([(CodeSystem::Loinc, "4548-4")]);
        let b = CodeSet::from_pairs([(CodeSystem::Loinc, "97506-0")]);
        let merged = a.union(&b);
        assert_eq!(merged.len(), 2);
        assert!(CodeSet::new().is_empty());
    }
}
