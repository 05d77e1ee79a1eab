//! Code systems and codings
//!
//! A code only has meaning as a `(system, code)` pair. Records arrive with
//! system identifiers in many spellings (short names, canonical URIs), so
//! [`CodeSystem::from_identifier`] normalises them onto a closed set.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;

/// Terminology systems the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CodeSystem {
    Loinc,
    SnomedCt,
    Icd10Cm,
    Icd10Pcs,
    Icd9Cm,
    Cpt,
    HcpcsLevelII,
    RxNorm,
    Cvx,
}

impl CodeSystem {
    /// Every supported system, in declaration order
    pub const ALL: [CodeSystem; 9] = [
        CodeSystem::Loinc,
        CodeSystem::SnomedCt,
        CodeSystem::Icd10Cm,
        CodeSystem::Icd10Pcs,
        CodeSystem::Icd9Cm,
        CodeSystem::Cpt,
        CodeSystem::HcpcsLevelII,
        CodeSystem::RxNorm,
        CodeSystem::Cvx,
    ];

    /// Canonical short name used in value-set documents
    pub fn as_str(self) -> &'static str {
        match self {
            CodeSystem::Loinc => "LOINC",
            CodeSystem::SnomedCt => "SNOMEDCT",
            CodeSystem::Icd10Cm => "ICD10CM",
            CodeSystem::Icd10Pcs => "ICD10PCS",
            CodeSystem::Icd9Cm => "ICD9CM",
            CodeSystem::Cpt => "CPT",
            CodeSystem::HcpcsLevelII => "HCPCSLEVELII",
            CodeSystem::RxNorm => "RXNORM",
            CodeSystem::Cvx => "CVX",
        }
    }

    /// Canonical URI for the system
    pub fn uri(self) -> &'static str {
        match self {
            CodeSystem::Loinc => "http://loinc.org",
            CodeSystem::SnomedCt => "http://snomed.info/sct",
            CodeSystem::Icd10Cm => "http://hl7.org/fhir/sid/icd-10-cm",
            CodeSystem::Icd10Pcs => "http://www.cms.gov/Medicare/Coding/ICD10",
            CodeSystem::Icd9Cm => "http://hl7.org/fhir/sid/icd-9-cm",
            CodeSystem::Cpt => "http://www.ama-assn.org/go/cpt",
            CodeSystem::HcpcsLevelII => "https://www.cms.gov/Medicare/Coding/HCPCSReleaseCodeSets",
            CodeSystem::RxNorm => "http://www.nlm.nih.gov/research/umls/rxnorm",
            CodeSystem::Cvx => "http://hl7.org/fhir/sid/cvx",
        }
    }

    /// Resolve a raw system identifier (short name or URI, any case)
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let trimmed = identifier.trim();
        if let Some(system) = Self::ALL
            .iter()
            .copied()
            .find(|s| s.uri().eq_ignore_ascii_case(trimmed))
        {
            return Some(system);
        }

        let key: String = trimmed
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match key.as_str() {
            "LOINC" | "LN" => Some(CodeSystem::Loinc),
            "SNOMED" | "SNOMEDCT" | "SNOMEDCTUS" | "SCT" => Some(CodeSystem::SnomedCt),
            "ICD10" | "ICD10CM" => Some(CodeSystem::Icd10Cm),
            "ICD10PCS" => Some(CodeSystem::Icd10Pcs),
            "ICD9" | "ICD9CM" => Some(CodeSystem::Icd9Cm),
            "CPT" | "CPT4" => Some(CodeSystem::Cpt),
            "HCPCS" | "HCPCSLEVELII" | "HCPCSII" => Some(CodeSystem::HcpcsLevelII),
            "RXNORM" => Some(CodeSystem::RxNorm),
            "CVX" => Some(CodeSystem::Cvx),
            _ => None,
        }
    }

    /// Normalise a code for comparison within this system.
    ///
    /// ICD codes are stored without the separator dot (`Z12.11` and `Z1211`
    /// are the same code); every other system compares trimmed codes verbatim.
    pub fn normalize_code(self, code: &str) -> Cow<'_, str> {
        let trimmed = code.trim();
        match self {
            CodeSystem::Icd10Cm | CodeSystem::Icd10Pcs | CodeSystem::Icd9Cm => {
                Cow::Owned(trimmed.replace('.', "").to_ascii_uppercase())
            }
            _ => Cow::Borrowed(trimmed),
        }
    }
}

impl fmt::Display for CodeSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeSystem {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_identifier(s).ok_or_else(|| TypesError::UnknownCodeSystem {
            identifier: s.to_string(),
        })
    }
}

impl Serialize for CodeSystem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CodeSystem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_identifier(&raw).ok_or_else(|| D::Error::custom(format!("unknown code system '{raw}'")))
    }
}

/// A single code as it appears on a clinical record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coding {
    /// Raw system identifier as recorded
    pub system: String,
    /// Code value
    pub code: String,
    /// Display text (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    /// Create a coding in a known system
    pub fn new(system: CodeSystem, code: impl Into<String>) -> Self {
        Self {
            system: system.as_str().to_string(),
            code: code.into(),
            display: None,
        }
    }

    /// Attach display text
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// The normalised system, if recognised
    pub fn code_system(&self) -> Option<CodeSystem> {
        CodeSystem::from_identifier(&self.system)
    }

    /// Check whether this coding names the given `(system, code)` pair
    pub fn is(&self, system: CodeSystem, code: &str) -> bool {
        self.code_system() == Some(system) && system.normalize_code(&self.code) == system.normalize_code(code)
    }
}

impl fmt::Display for Coding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.system, self.code)?;
        if let Some(display) = &self.display {
            write!(f, " '{}'", display)?;
        }
        Ok(())
    }
}
