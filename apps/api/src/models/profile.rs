use std::fmt;

use serde::{Deserialize, Serialize};

/// Inspector roles offered in the role picker, in display order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetRole {
    #[default]
    #[serde(rename = "Field Inspector")]
    FieldInspector,
    #[serde(rename = "Property Inspector")]
    PropertyInspector,
    #[serde(rename = "Home Inspector")]
    HomeInspector,
    #[serde(rename = "Building Inspector")]
    BuildingInspector,
    #[serde(rename = "Commercial Inspector")]
    CommercialInspector,
    #[serde(rename = "Appraiser")]
    Appraiser,
    #[serde(rename = "Vehicle Inspector")]
    VehicleInspector,
    #[serde(rename = "Compliance Inspector")]
    ComplianceInspector,
    #[serde(rename = "Quality Control Inspector")]
    QualityControlInspector,
    #[serde(rename = "Safety Inspector")]
    SafetyInspector,
    #[serde(rename = "Insurance Inspector")]
    InsuranceInspector,
    #[serde(rename = "Construction Inspector")]
    ConstructionInspector,
    #[serde(rename = "Environmental Inspector")]
    EnvironmentalInspector,
    /// Free-text role; the value lives in `Profile::custom_role`.
    #[serde(rename = "Other (Specify)")]
    Other,
}

impl TargetRole {
    pub const ALL: [TargetRole; 14] = [
        TargetRole::FieldInspector,
        TargetRole::PropertyInspector,
        TargetRole::HomeInspector,
        TargetRole::BuildingInspector,
        TargetRole::CommercialInspector,
        TargetRole::Appraiser,
        TargetRole::VehicleInspector,
        TargetRole::ComplianceInspector,
        TargetRole::QualityControlInspector,
        TargetRole::SafetyInspector,
        TargetRole::InsuranceInspector,
        TargetRole::ConstructionInspector,
        TargetRole::EnvironmentalInspector,
        TargetRole::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TargetRole::FieldInspector => "Field Inspector",
            TargetRole::PropertyInspector => "Property Inspector",
            TargetRole::HomeInspector => "Home Inspector",
            TargetRole::BuildingInspector => "Building Inspector",
            TargetRole::CommercialInspector => "Commercial Inspector",
            TargetRole::Appraiser => "Appraiser",
            TargetRole::VehicleInspector => "Vehicle Inspector",
            TargetRole::ComplianceInspector => "Compliance Inspector",
            TargetRole::QualityControlInspector => "Quality Control Inspector",
            TargetRole::SafetyInspector => "Safety Inspector",
            TargetRole::InsuranceInspector => "Insurance Inspector",
            TargetRole::ConstructionInspector => "Construction Inspector",
            TargetRole::EnvironmentalInspector => "Environmental Inspector",
            TargetRole::Other => "Other (Specify)",
        }
    }

    pub fn is_other(self) -> bool {
        self == TargetRole::Other
    }
}

impl fmt::Display for TargetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything the user has entered for the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub name: String,
    pub contact: String,
    pub target_role: TargetRole,
    /// Only consulted when `target_role` is `Other`.
    pub custom_role: String,
    pub job_description: String,
    /// Text of the uploaded resume. Not echoed back in snapshots.
    #[serde(skip_serializing)]
    pub resume_text: String,
    pub file_name: Option<String>,
}

impl Profile {
    /// The role name used in prompts.
    pub fn effective_role(&self) -> &str {
        if self.target_role.is_other() {
            self.custom_role.trim()
        } else {
            self.target_role.label()
        }
    }

    pub fn job_description(&self) -> Option<&str> {
        let jd = self.job_description.trim();
        (!jd.is_empty()).then_some(jd)
    }

    pub fn apply(&mut self, update: ProfileUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(contact) = update.contact {
            self.contact = contact;
        }
        if let Some(role) = update.target_role {
            self.target_role = role;
        }
        if let Some(custom) = update.custom_role {
            self.custom_role = custom;
        }
        if let Some(jd) = update.job_description {
            self.job_description = jd;
        }
        if let Some(text) = update.resume_text {
            self.resume_text = text;
            self.file_name = None;
        }
    }
}

/// Partial profile update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub contact: Option<String>,
    pub target_role: Option<TargetRole>,
    pub custom_role: Option<String>,
    pub job_description: Option<String>,
    /// Pasted resume text, as an alternative to uploading a file.
    pub resume_text: Option<String>,
}
