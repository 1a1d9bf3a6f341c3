// All LLM prompt constants for the resume workflow.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::{bullet_list, CANDIDATE_NAME_FALLBACK, CONTACT_FALLBACK};
use crate::models::Profile;

/// Skills extraction prompt. Replace: {jd_context}, {role}, {resume_text}
pub const SKILLS_PROMPT_TEMPLATE: &str = r#"You are an expert resume analyst. Analyze the resume below.
{jd_context}
Identify 5-7 key transferable skills from the resume that are most relevant for a '{role}' role.
Focus on skills such as attention to detail, compliance, report writing, technical aptitude and problem-solving. If a job description is provided, prioritize the skills it mentions.
Return the skills as a JSON array of short strings.

**Original Resume Text:**
---
{resume_text}
---"#;

/// Replace: {jd}
pub const SKILLS_JD_CONTEXT: &str = r#"
**Target Job Description (for context):**
---
{jd}
---
Your primary goal is to find skills in the resume that directly match the requirements in this job description.
"#;

/// Resume synthesis prompt.
/// Replace: {jd_context}, {role}, {name}, {contact}, {resume_text}, {skills}
pub const RESUME_PROMPT_TEMPLATE: &str = r#"You are a professional resume writer specializing in compelling resumes for inspector roles, including '{role}'.
{jd_context}
Generate a tailored resume from the user details, their original resume and the list of key skills. The resume must engage a recruiter and pass applicant tracking systems (ATS) for this specific role.

**Instructions:**
1. **Structure:** The resume MUST include these sections: Full Name, Contact Information, Target Role Statement, Summary, Transferable Skills, Professional Experience, and Education/Certifications.
2. **Content Focus & Tone:**
   * Rewrite the **Summary** and **Professional Experience** bullet points to incorporate keywords and required skills from the job description if one is provided.
   * Use strong, quantifiable action verbs relevant to an inspector (e.g., Inspected, Verified, Documented, Assessed, Audited).
   * Keep the resume professional, concise, and impactful.

**User Details:**
* Name: {name}
* Contact: {contact}
* Target Inspector Role: {role}

**Original Resume Text (for context and experience extraction):**
---
{resume_text}
---

**Key Transferable Skills to Highlight:**
---
{skills}
---

Generate the tailored resume now."#;

/// Replace: {jd}
pub const RESUME_JD_CONTEXT: &str = r#"
**Crucial Context: Target Job Description**
---
{jd}
---
**VERY IMPORTANT**: You MUST tailor the resume to the keywords, skills, and requirements found in this job description. Rephrase experience bullet points to reflect its language.
"#;

/// Cover letter prompt. Replace: {jd_context}, {role}, {name}, {skills}
pub const COVER_LETTER_PROMPT_TEMPLATE: &str = r#"You are a professional career coach specializing in inspector roles. Write a compelling cover letter for a '{role}' position.
{jd_context}
**User Details:**
* Name: {name}
* Target Role: {role}

**Key Skills to Highlight:**
{skills}

**Instructions:**
1. Write a professional, engaging cover letter that highlights relevant experience
2. Focus on transferable skills that apply to inspection work
3. Include specific examples of attention to detail, compliance, and problem-solving
4. Keep it concise (3-4 paragraphs)
5. Use a professional but personable tone

Generate the cover letter now."#;

/// Replace: {jd}
pub const COVER_LETTER_JD_CONTEXT: &str = r#"
**Target Job Description:**
---
{jd}
---
Use this job description to customize the cover letter with its specific requirements and company details.
"#;

/// Interview preparation prompt. Replace: {role}, {skills}
pub const INTERVIEW_PROMPT_TEMPLATE: &str = r#"You are an expert interview coach specializing in inspector roles. Generate 8-10 likely interview questions for a '{role}' position, with guidance on how to answer each one.

**Target Role:** {role}
**Key Skills:** {skills}

**Instructions:**
1. Include a mix of behavioral, technical, and situational questions
2. Focus on inspection-specific scenarios (quality control, compliance, documentation)
3. Provide brief guidance on how to structure a good answer
4. Include questions about attention to detail, problem-solving, and communication

Format as:
**Question:** [Question text]
**How to Answer:** [Brief guidance]

Generate the interview preparation guide now."#;

/// Fills `{key}` placeholders in one pass. Substituted text is never rescanned,
/// so braces inside user input stay literal.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let hit = values.iter().find(|(key, _)| {
            tail.strip_prefix(key)
                .is_some_and(|after| after.starts_with('}'))
        });
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn jd_context(template: &str, profile: &Profile) -> String {
    profile
        .job_description()
        .map(|jd| fill(template, &[("jd", jd)]))
        .unwrap_or_default()
}

fn display_name(profile: &Profile) -> &str {
    match profile.name.trim() {
        "" => CANDIDATE_NAME_FALLBACK,
        name => name,
    }
}

fn display_contact(profile: &Profile) -> &str {
    match profile.contact.trim() {
        "" => CONTACT_FALLBACK,
        contact => contact,
    }
}

pub fn build_skills_prompt(profile: &Profile) -> String {
    fill(
        SKILLS_PROMPT_TEMPLATE,
        &[
            ("jd_context", &jd_context(SKILLS_JD_CONTEXT, profile)),
            ("role", profile.effective_role()),
            ("resume_text", &profile.resume_text),
        ],
    )
}

pub fn build_resume_prompt(profile: &Profile, skills: &[String]) -> String {
    fill(
        RESUME_PROMPT_TEMPLATE,
        &[
            ("jd_context", &jd_context(RESUME_JD_CONTEXT, profile)),
            ("role", profile.effective_role()),
            ("name", display_name(profile)),
            ("contact", display_contact(profile)),
            ("resume_text", &profile.resume_text),
            ("skills", &bullet_list(skills)),
        ],
    )
}

pub fn build_cover_letter_prompt(profile: &Profile, skills: &[String]) -> String {
    fill(
        COVER_LETTER_PROMPT_TEMPLATE,
        &[
            ("jd_context", &jd_context(COVER_LETTER_JD_CONTEXT, profile)),
            ("role", profile.effective_role()),
            ("name", display_name(profile)),
            ("skills", &bullet_list(skills)),
        ],
    )
}

pub fn build_interview_prompt(profile: &Profile, skills: &[String]) -> String {
    fill(
        INTERVIEW_PROMPT_TEMPLATE,
        &[
            ("role", profile.effective_role()),
            ("skills", &skills.join(", ")),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetRole;

    fn jane() -> Profile {
        Profile {
            name: "Jane Doe".to_string(),
            contact: "jane@x.com".to_string(),
            target_role: TargetRole::HomeInspector,
            resume_text: "10 years retail QA".to_string(),
            ..Profile::default()
        }
    }

    fn skills() -> Vec<String> {
        vec!["attention to detail".to_string(), "reporting".to_string()]
    }

    #[test]
    fn test_skills_prompt_embeds_role_and_resume() {
        let prompt = build_skills_prompt(&jane());
        assert!(prompt.contains("'Home Inspector' role"));
        assert!(prompt.contains("10 years retail QA"));
        assert!(!prompt.contains("Target Job Description"));
        assert!(!prompt.contains('{'), "unfilled placeholder in: {prompt}");
    }

    #[test]
    fn test_skills_prompt_includes_job_description_when_present() {
        let profile = Profile {
            job_description: "  Must hold an ASHI certification  ".to_string(),
            ..jane()
        };
        let prompt = build_skills_prompt(&profile);
        assert!(prompt.contains("Target Job Description"));
        assert!(prompt.contains("Must hold an ASHI certification\n"));
    }

    #[test]
    fn test_resume_prompt_lists_skills_as_bullets() {
        let prompt = build_resume_prompt(&jane(), &skills());
        assert!(prompt.contains("* attention to detail\n* reporting"));
        assert!(prompt.contains("* Name: Jane Doe"));
        assert!(prompt.contains("* Contact: jane@x.com"));
        assert!(prompt.contains("* Target Inspector Role: Home Inspector"));
    }

    #[test]
    fn test_resume_prompt_uses_custom_role() {
        let profile = Profile {
            target_role: TargetRole::Other,
            custom_role: "Elevator Inspector".to_string(),
            ..jane()
        };
        let prompt = build_resume_prompt(&profile, &skills());
        assert!(prompt.contains("including 'Elevator Inspector'"));
        assert!(!prompt.contains("Other (Specify)"));
    }

    #[test]
    fn test_cover_letter_prompt_falls_back_to_placeholder_name() {
        let profile = Profile {
            name: " ".to_string(),
            ..jane()
        };
        let prompt = build_cover_letter_prompt(&profile, &skills());
        assert!(prompt.contains("* Name: Inspector Candidate"));
    }

    #[test]
    fn test_interview_prompt_joins_skills_inline() {
        let prompt = build_interview_prompt(&jane(), &skills());
        assert!(prompt.contains("**Key Skills:** attention to detail, reporting"));
        assert!(prompt.contains("'Home Inspector' position"));
    }

    #[test]
    fn test_user_text_placeholders_stay_literal() {
        let profile = Profile {
            resume_text: "Wrote docs about {role} and {jd_context} templating".to_string(),
            job_description: "Needs {name} on site".to_string(),
            ..jane()
        };
        let prompt = build_skills_prompt(&profile);
        assert!(prompt.contains("Wrote docs about {role} and {jd_context} templating"));
        assert_eq!(prompt.matches("Target Job Description").count(), 1);
        assert!(prompt.contains("Needs {name} on site"));
    }

    #[test]
    fn test_role_and_name_placeholders_stay_literal() {
        let profile = Profile {
            name: "{contact}".to_string(),
            target_role: TargetRole::Other,
            custom_role: "{resume_text}".to_string(),
            ..jane()
        };
        let prompt = build_resume_prompt(&profile, &skills());
        assert!(prompt.contains("* Name: {contact}"));
        assert!(prompt.contains("* Target Inspector Role: {resume_text}"));
        assert_eq!(prompt.matches("10 years retail QA").count(), 1);
        assert_eq!(prompt.matches("jane@x.com").count(), 1);
    }

    #[test]
    fn test_fill_leaves_unknown_braces_alone() {
        assert_eq!(fill("{a} {b} {", &[("a", "1")]), "1 {b} {");
        assert_eq!(fill("{{a}}", &[("a", "x")]), "{x}");
    }
}
