//! Bundled measures
//!
//! Two measures ship with the engine, each a [`MeasureDefinition`] over the
//! bundled value-set library:
//!
//! - `CMS130v14` Colorectal Cancer Screening
//! - `CMS122v14` Diabetes: Glycemic Status Assessment Greater Than 9%

use octofhir_cqm_model::{EventKind, FactKind};
use octofhir_cqm_types::{CodeSystem, CommandKind, TypesResult, ValueSetLibrary};
use rust_decimal::Decimal;
use serde_json::{Map, Value, json};

use crate::composer::{CommandTemplate, OrderCodes, RecommendationTemplate, RecommendationTrigger};
use crate::exclusion::{DISCHARGE_TO_HOSPICE, ExclusionRule, FrailtySignals};
use crate::measure::{MeasureDefinition, Polarity};
use crate::numerator::{Comparison, LabThreshold, NumeratorCriterion, ScreeningType, TestType};
use crate::population::{AgeCriterion, DenominatorCriterion};
use crate::temporal::Lookback;

const BUNDLED_VALUE_SETS: &str = include_str!("value_sets.json");

pub const COLORECTAL_SCREENING_KEY: &str = "CMS130v14";
pub const GLYCEMIC_POOR_CONTROL_KEY: &str = "CMS122v14";

/// ICD-10: encounter for screening for malignant neoplasm of colon
pub const COLON_SCREENING_DIAGNOSIS: &str = "Z1211";
/// LOINC: glucose management indicator
pub const GMI_LOINC: &str = "97506-0";

const LIFESTYLE_INSTRUCTION: &str = "Discuss lifestyle modification and medication adherence. \
Consider diabetes education and medication intensification as appropriate.";

/// The value sets the bundled measures reference
pub fn bundled_value_sets() -> TypesResult<ValueSetLibrary> {
    ValueSetLibrary::from_json(BUNDLED_VALUE_SETS)
}

/// Every bundled measure
pub fn bundled_definitions() -> Vec<MeasureDefinition> {
    vec![colorectal_screening(), glycemic_poor_control()]
}

/// Look up a bundled measure by key, ignoring case
pub fn bundled_definition(key: &str) -> Option<MeasureDefinition> {
    bundled_definitions()
        .into_iter()
        .find(|d| d.key.eq_ignore_ascii_case(key))
}

fn names(value_sets: &[&str]) -> Vec<String> {
    value_sets.iter().map(|s| (*s).to_string()).collect()
}

fn hospice_rules() -> Vec<ExclusionRule> {
    vec![
        ExclusionRule::HospiceDiagnosis {
            value_set: "Hospice Diagnosis".into(),
        },
        ExclusionRule::HospiceEncounter {
            value_sets: names(&["Hospice Encounter"]),
        },
        ExclusionRule::HospiceDischarge {
            inpatient_value_set: "Encounter Inpatient".into(),
            dispositions: names(&DISCHARGE_TO_HOSPICE),
        },
        ExclusionRule::HospiceAssessment {
            intervention_value_set: Some("Hospice Care Ambulatory".into()),
        },
    ]
}

fn nursing_home_rule() -> ExclusionRule {
    ExclusionRule::NursingHome {
        value_sets: names(&["Care Services in Long Term Residential Facility", "Nursing Facility Visit"]),
        min_age: Some(66),
    }
}

fn frailty_rule() -> ExclusionRule {
    ExclusionRule::FrailtyWithAdvancedIllness {
        frailty: FrailtySignals {
            diagnosis: "Frailty Diagnosis".into(),
            symptom: "Frailty Symptom".into(),
            device: "Frailty Device".into(),
            encounter: "Frailty Encounter".into(),
        },
        advanced_illness: "Advanced Illness".into(),
        dementia_medications: "Dementia Medications".into(),
        lookback: Lookback::years(1),
        min_age: Some(66),
    }
}

fn palliative_rule() -> ExclusionRule {
    ExclusionRule::PalliativeCare {
        diagnosis: "Palliative Care Diagnosis".into(),
        encounter: "Palliative Care Encounter".into(),
        intervention: Some("Palliative Care Intervention".into()),
    }
}

fn screening(label: &str, kinds: &[FactKind], value_set: &str, systems: &[CodeSystem], years: u32, days: u32) -> ScreeningType {
    ScreeningType {
        label: label.into(),
        kinds: kinds.to_vec(),
        value_sets: names(&[value_set]),
        systems: systems.to_vec(),
        lookback: Lookback::years(years),
        interval_days: days,
    }
}

fn screening_context(specialty: Option<&str>) -> Map<String, Value> {
    let mut context = Map::new();
    context.insert(
        "conditions".into(),
        json!([[{
            "code": COLON_SCREENING_DIAGNOSIS,
            "system": "ICD-10",
            "display": "Encounter for screening for malignant neoplasm of colon"
        }]]),
    );
    if let Some(specialty) = specialty {
        context.insert("specialties".into(), json!([specialty]));
    }
    context
}

fn colorectal_recommendation(
    title: &str,
    kind: CommandKind,
    order_codes: Option<OrderCodes>,
    specialty: Option<&str>,
    note: Option<&str>,
) -> RecommendationTemplate {
    let mut context = screening_context(specialty);
    if let Some(note) = note {
        context.insert("notes".into(), Value::from(note));
    }
    RecommendationTemplate {
        title: title.into(),
        button: "Order".into(),
        trigger: RecommendationTrigger::Always,
        command: Some(CommandTemplate {
            kind,
            order_codes,
            diagnosis_codes: vec![COLON_SCREENING_DIAGNOSIS.into()],
            patient_diagnoses: None,
            context,
        }),
    }
}

/// CMS130v14: adults 46-75 with an appropriate colorectal cancer screening
pub fn colorectal_screening() -> MeasureDefinition {
    use FactKind::{ImagingReport, LabReport, ReferralReport};

    let procedure = &[ImagingReport, ReferralReport];
    MeasureDefinition {
        key: COLORECTAL_SCREENING_KEY.into(),
        title: "Colorectal Cancer Screening".into(),
        subject: "colorectal cancer screening".into(),
        description: Some(
            "Percentage of adults 46-75 years of age who had appropriate screening for colorectal cancer.".into(),
        ),
        responds_to: vec![
            EventKind::PatientCreated,
            EventKind::PatientUpdated,
            EventKind::ConditionCreated,
            EventKind::ConditionUpdated,
            EventKind::ConditionResolved,
            EventKind::LabReportCreated,
            EventKind::LabReportUpdated,
            EventKind::ImagingReportCreated,
            EventKind::ImagingReportUpdated,
            EventKind::ReferralReportCreated,
            EventKind::ReferralReportUpdated,
            EventKind::EncounterCreated,
            EventKind::ClaimCreated,
            EventKind::ObservationCreated,
            EventKind::ObservationUpdated,
            EventKind::DeviceCreated,
            EventKind::MedicationStatementCreated,
        ],
        polarity: Polarity::Positive,
        age: AgeCriterion::between(46, 75),
        denominator: vec![DenominatorCriterion::QualifyingEncounter {
            value_sets: names(&[
                "Office Visit",
                "Preventive Care Services Established Office Visit, 18 and Up",
                "Preventive Care Services Initial Office Visit, 18 and Up",
                "Home Healthcare Services",
                "Annual Wellness Visit",
                "Virtual Encounter",
                "Telephone Visits",
            ]),
            optimistic: true,
        }],
        exclusions: {
            let mut rules = hospice_rules();
            rules.push(nursing_home_rule());
            rules.push(frailty_rule());
            rules.push(ExclusionRule::StructuralHistory {
                value_sets: names(&["Total Colectomy"]),
                label: "total colectomy".into(),
            });
            rules.push(ExclusionRule::StructuralHistory {
                value_sets: names(&["Malignant Neoplasm of Colon"]),
                label: "malignant neoplasm of colon".into(),
            });
            rules.push(palliative_rule());
            rules
        },
        numerator: NumeratorCriterion::MostRecentScreening {
            screenings: vec![
                screening("FOBT", &[LabReport], "Fecal Occult Blood Test (FOBT)", &[CodeSystem::Loinc], 1, 365),
                screening("FIT-DNA", &[LabReport], "sDNA FIT Test", &[CodeSystem::Loinc], 3, 1095),
                screening("Flexible sigmoidoscopy", procedure, "Flexible Sigmoidoscopy", &[], 5, 1825),
                screening("CT Colonography", procedure, "CT Colonography", &[], 5, 1825),
                screening("Colonoscopy", procedure, "Colonoscopy", &[], 10, 3650),
            ],
        },
        recommendations: vec![
            colorectal_recommendation(
                "Order a FOBT",
                CommandKind::LabOrder,
                Some(OrderCodes::FirstOf {
                    value_set: "Fecal Occult Blood Test (FOBT)".into(),
                    system: CodeSystem::Loinc,
                }),
                None,
                None,
            ),
            colorectal_recommendation(
                "Order a FIT-DNA",
                CommandKind::LabOrder,
                Some(OrderCodes::FirstOf {
                    value_set: "sDNA FIT Test".into(),
                    system: CodeSystem::Loinc,
                }),
                None,
                None,
            ),
            colorectal_recommendation(
                "Order a Flexible sigmoidoscopy",
                CommandKind::Refer,
                None,
                Some("Gastroenterology"),
                Some("For flexible sigmoidoscopy screening."),
            ),
            colorectal_recommendation(
                "Order a CT Colonography",
                CommandKind::ImagingOrder,
                Some(OrderCodes::FirstOf {
                    value_set: "CT Colonography".into(),
                    system: CodeSystem::Cpt,
                }),
                Some("Radiology"),
                None,
            ),
            colorectal_recommendation(
                "Order a Colonoscopy",
                CommandKind::Refer,
                None,
                Some("Gastroenterology"),
                Some("For colonoscopy screening."),
            ),
        ],
        display_interval_days: Some(365 * 9),
        can_be_snoozed: true,
    }
}

/// CMS122v14: diabetic adults 18-75 whose latest glycemic status is above 9%
/// or missing. Being in the numerator is the poor outcome.
pub fn glycemic_poor_control() -> MeasureDefinition {
    MeasureDefinition {
        key: GLYCEMIC_POOR_CONTROL_KEY.into(),
        title: "Diabetes: Glycemic Status Assessment Greater Than 9%".into(),
        subject: "diabetes glycemic status assessment".into(),
        description: Some(
            "Percentage of patients 18-75 years of age with diabetes who had a glycemic status \
             assessment (HbA1c or GMI) > 9.0% during the measurement period."
                .into(),
        ),
        responds_to: vec![
            EventKind::ConditionCreated,
            EventKind::ConditionUpdated,
            EventKind::ConditionResolved,
            EventKind::LabReportCreated,
            EventKind::LabReportUpdated,
            EventKind::PatientCreated,
            EventKind::PatientUpdated,
            EventKind::ObservationCreated,
            EventKind::ObservationUpdated,
            EventKind::EncounterCreated,
            EventKind::EncounterUpdated,
            EventKind::ClaimCreated,
            EventKind::ClaimUpdated,
        ],
        polarity: Polarity::Inverse,
        age: AgeCriterion::between(18, 75),
        denominator: vec![
            DenominatorCriterion::RequiredDiagnosis {
                value_set: "Diabetes".into(),
                label: "diabetes".into(),
            },
            DenominatorCriterion::QualifyingEncounter {
                value_sets: names(&[
                    "Office Visit",
                    "Annual Wellness Visit",
                    "Preventive Care Services Established Office Visit, 18 and Up",
                    "Preventive Care Services Initial Office Visit, 18 and Up",
                    "Home Healthcare Services",
                    "Nutrition Services",
                    "Telephone Visits",
                ]),
                optimistic: false,
            },
        ],
        exclusions: {
            let mut rules = hospice_rules();
            rules.push(nursing_home_rule());
            rules.push(frailty_rule());
            rules.push(palliative_rule());
            rules
        },
        numerator: NumeratorCriterion::LabThreshold(LabThreshold {
            value_sets: names(&["HbA1c Laboratory Test"]),
            systems: vec![CodeSystem::Loinc],
            test_types: vec![TestType {
                label: "GMI".into(),
                system: CodeSystem::Loinc,
                codes: vec![GMI_LOINC.into()],
            }],
            default_test_type: "HbA1c".into(),
            threshold: Decimal::new(90, 1),
            comparison: Comparison::Greater,
            missing_counts_as_met: true,
            result_label: "glycemic status assessment".into(),
        }),
        recommendations: vec![
            RecommendationTemplate {
                title: "Order HbA1c".into(),
                button: "Order".into(),
                trigger: RecommendationTrigger::MissingResult,
                command: Some(CommandTemplate {
                    kind: CommandKind::LabOrder,
                    order_codes: Some(OrderCodes::FirstOf {
                        value_set: "HbA1c Laboratory Test".into(),
                        system: CodeSystem::Loinc,
                    }),
                    diagnosis_codes: Vec::new(),
                    patient_diagnoses: Some("Diabetes".into()),
                    context: Map::new(),
                }),
            },
            RecommendationTemplate {
                title: LIFESTYLE_INSTRUCTION.into(),
                button: "Instruct".into(),
                trigger: RecommendationTrigger::ResultPresent,
                command: Some(CommandTemplate {
                    kind: CommandKind::Instruct,
                    order_codes: Some(OrderCodes::FirstOf {
                        value_set: "Dietary Recommendations".into(),
                        system: CodeSystem::SnomedCt,
                    }),
                    diagnosis_codes: Vec::new(),
                    patient_diagnoses: None,
                    context: {
                        let mut context = Map::new();
                        context.insert("comment".into(), Value::from(LIFESTYLE_INSTRUCTION));
                        context
                    },
                }),
            },
        ],
        display_interval_days: None,
        can_be_snoozed: true,
    }
}
