//! Clinical fact locator
//!
//! Filters a patient record by fact kind, countability, code membership and
//! date window, returning matches most recent first.

use log::warn;
use octofhir_cqm_model::{ClinicalFact, Fact, FactKind, PatientRecord};
use octofhir_cqm_types::CodeSet;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::error::EvalResult;
use crate::temporal::Window;

/// Facts of `kinds` coded in `codes` and admitted by `window`, sorted by
/// relevant date descending. Undated facts sort last; ties break on id.
pub fn find<'r>(
    record: &'r PatientRecord,
    kinds: &[FactKind],
    codes: &CodeSet,
    window: &Window,
) -> EvalResult<Vec<&'r ClinicalFact>> {
    find_where(record, kinds, window, |fact| fact.matches(codes))
}

/// Like [`find`] with an arbitrary coding predicate
pub fn find_where<'r, P>(
    record: &'r PatientRecord,
    kinds: &[FactKind],
    window: &Window,
    predicate: P,
) -> EvalResult<Vec<&'r ClinicalFact>>
where
    P: Fn(&ClinicalFact) -> bool,
{
    let mut found = Vec::new();
    for fact in &record.facts {
        if !kinds.contains(&fact.kind()) || !fact.is_countable() || !predicate(fact) {
            continue;
        }
        if window.admits(fact.relevant_date(), fact.active_span())? {
            found.push(fact);
        }
    }
    sort_most_recent_first(&mut found);
    Ok(found)
}

/// The most recent match, if any
pub fn latest<'r>(
    record: &'r PatientRecord,
    kinds: &[FactKind],
    codes: &CodeSet,
    window: &Window,
) -> EvalResult<Option<&'r ClinicalFact>> {
    Ok(find(record, kinds, codes, window)?.into_iter().next())
}

/// True when at least one fact matches
pub fn exists(record: &PatientRecord, kinds: &[FactKind], codes: &CodeSet, window: &Window) -> EvalResult<bool> {
    Ok(!find(record, kinds, codes, window)?.is_empty())
}

/// Owning note ids of the given facts; facts without a note are skipped
pub fn notes_with<'r>(facts: &[&'r ClinicalFact]) -> BTreeSet<&'r str> {
    facts
        .iter()
        .copied()
        .filter_map(|fact| match fact {
            ClinicalFact::Encounter(e) => e.note_id.as_deref(),
            ClinicalFact::Observation(o) => o.note_id.as_deref(),
            ClinicalFact::Device(d) => d.note_id.as_deref(),
            _ => {
                warn!("Fact {} of kind {} has no owning note", fact.id(), fact.kind());
                None
            }
        })
        .collect()
}

pub fn sort_most_recent_first(facts: &mut [&ClinicalFact]) {
    facts.sort_by(|a, b| compare_recency(a, b));
}

fn compare_recency(a: &ClinicalFact, b: &ClinicalFact) -> Ordering {
    match (a.relevant_date(), b.relevant_date()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id().cmp(b.id()))
}
