//! Per-evaluation population outcome

use crate::exclusion::{Exclusion, ExclusionReason};
use crate::numerator::QualifyingFact;
use crate::population::{DenominatorMiss, PopulationState};

/// Where a patient landed in the measure's populations.
///
/// Borrowed from the record it was computed on and discarded once the card
/// is composed.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationOutcome<'r> {
    pub population: PopulationState,
    pub denominator_miss: Option<DenominatorMiss>,
    pub exclusion: Option<Exclusion<'r>>,
    pub numerator_met: bool,
    pub qualifying_fact: Option<QualifyingFact<'r>>,
}

impl<'r> PopulationOutcome<'r> {
    pub fn not_in_population(population: PopulationState) -> Self {
        Self {
            population,
            denominator_miss: None,
            exclusion: None,
            numerator_met: false,
            qualifying_fact: None,
        }
    }

    pub fn in_initial_population(&self) -> bool {
        self.population.is_in()
    }

    pub fn in_denominator(&self) -> bool {
        self.in_initial_population() && self.denominator_miss.is_none()
    }

    pub fn excluded(&self) -> bool {
        self.exclusion.is_some()
    }

    pub fn exclusion_reason(&self) -> Option<&ExclusionReason> {
        self.exclusion.as_ref().map(|e| &e.reason)
    }

    /// In the denominator and not excluded
    pub fn in_scope(&self) -> bool {
        self.in_denominator() && !self.excluded()
    }
}
