use thiserror::Error;

use crate::models::Profile;

/// A required profile field is missing. The display text is shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter your name.")]
    MissingName,

    #[error("Please enter your contact information.")]
    MissingContact,

    #[error("Please upload your current resume.")]
    MissingResume,

    #[error("Please specify your target inspector role.")]
    MissingCustomRole,
}

/// Checks that a profile is complete enough to generate from.
/// Fields are checked in form order and the first failure wins.
pub fn validate(profile: &Profile) -> Result<(), ValidationError> {
    if profile.name.trim().is_empty() {
        return Err(ValidationError::MissingName);
    }
    if profile.contact.trim().is_empty() {
        return Err(ValidationError::MissingContact);
    }
    if profile.resume_text.trim().is_empty() {
        return Err(ValidationError::MissingResume);
    }
    if profile.target_role.is_other() && profile.custom_role.trim().is_empty() {
        return Err(ValidationError::MissingCustomRole);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetRole;

    fn complete_profile() -> Profile {
        Profile {
            name: "Jane Doe".to_string(),
            contact: "jane@x.com".to_string(),
            target_role: TargetRole::HomeInspector,
            resume_text: "10 years retail QA".to_string(),
            ..Profile::default()
        }
    }

    #[test]
    fn test_complete_profile_passes() {
        assert_eq!(validate(&complete_profile()), Ok(()));
    }

    #[test]
    fn test_blank_name_rejected() {
        let profile = Profile {
            name: "   ".to_string(),
            ..complete_profile()
        };
        assert_eq!(validate(&profile), Err(ValidationError::MissingName));
    }

    #[test]
    fn test_blank_contact_rejected() {
        let profile = Profile {
            contact: String::new(),
            ..complete_profile()
        };
        assert_eq!(validate(&profile), Err(ValidationError::MissingContact));
    }

    #[test]
    fn test_blank_resume_rejected() {
        let profile = Profile {
            resume_text: "\n\n".to_string(),
            ..complete_profile()
        };
        assert_eq!(validate(&profile), Err(ValidationError::MissingResume));
    }

    #[test]
    fn test_other_role_without_custom_value_rejected() {
        let profile = Profile {
            target_role: TargetRole::Other,
            custom_role: "  ".to_string(),
            ..complete_profile()
        };
        assert_eq!(validate(&profile), Err(ValidationError::MissingCustomRole));
    }

    #[test]
    fn test_other_role_with_custom_value_passes() {
        let profile = Profile {
            target_role: TargetRole::Other,
            custom_role: "Elevator Inspector".to_string(),
            ..complete_profile()
        };
        assert!(validate(&profile).is_ok());
    }

    #[test]
    fn test_first_missing_field_wins() {
        assert_eq!(
            validate(&Profile::default()),
            Err(ValidationError::MissingName)
        );
    }

    #[test]
    fn test_messages_are_user_facing() {
        assert_eq!(
            ValidationError::MissingResume.to_string(),
            "Please upload your current resume."
        );
    }
}
