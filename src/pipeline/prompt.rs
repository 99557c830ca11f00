//! Classification prompt.

use crate::taxonomy::{GENERAL, RECRUITING, Taxonomy};

/// Renders the fixed instruction template around one email.
///
/// The taxonomy part of the template is rendered once at construction;
/// [`PromptBuilder::build`] only splices the text in.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    header: String,
}

impl PromptBuilder {
    pub fn new(taxonomy: &Taxonomy) -> Self {
        Self {
            header: render_header(taxonomy),
        }
    }

    /// Prompt for `text`. The text is embedded verbatim.
    pub fn build(&self, text: &str) -> String {
        let mut prompt = String::with_capacity(self.header.len() + text.len() + 16);
        prompt.push_str(&self.header);
        prompt.push_str("---\n");
        prompt.push_str(text);
        prompt.push_str("\n---\n");
        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(&Taxonomy::recruiting())
    }
}

fn render_header(taxonomy: &Taxonomy) -> String {
    let mains = taxonomy
        .main_categories()
        .map(|m| format!("- '{m}'"))
        .collect::<Vec<_>>()
        .join("\n");

    let subs = taxonomy
        .sub_categories(RECRUITING)
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are an expert email classifier. Your task is to accurately classify the given email \
         into a two-level category system.\n\n\
         The main categories are:\n\
         {mains}\n\n\
         If the main_category is '{RECRUITING}', the sub_category must be one of the following: [{subs}].\n\
         If the main_category is '{GENERAL}', the sub_category must be 'N/A'.\n\n\
         Analyze the content of the email and provide the classification in a single, valid JSON \
         object. Do not include any text before or after the JSON object.\n\n\
         Example output:\n\
         {{\"main_category\": \"recruiting\", \"sub_category\": \"interview_schedule\"}}\n\n\
         Now, classify this email:\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_taxonomy() {
        let prompt = PromptBuilder::default().build("hello");
        assert!(prompt.contains("- 'recruiting'"));
        assert!(prompt.contains("- 'general'"));
        assert!(prompt.contains("'interview_schedule'"));
        assert!(prompt.contains("'work_location'"));
        assert!(prompt.contains("must be 'N/A'"));
    }

    #[test]
    fn recruiting_listed_before_general() {
        let prompt = PromptBuilder::default().build("hello");
        let recruiting = prompt.find("- 'recruiting'").unwrap();
        let general = prompt.find("- 'general'").unwrap();
        assert!(recruiting < general);
    }

    #[test]
    fn prompt_demands_json_only() {
        let prompt = PromptBuilder::default().build("hello");
        assert!(prompt.contains("single, valid JSON object"));
        assert!(prompt.contains(r#"{"main_category": "recruiting", "sub_category": "interview_schedule"}"#));
    }

    #[test]
    fn text_embedded_verbatim_between_fences() {
        let text = "Hi {name}, your interview is on \"Monday\" <b>10am</b>";
        let prompt = PromptBuilder::default().build(text);
        assert!(prompt.ends_with(&format!("---\n{text}\n---\n")));
    }

    #[test]
    fn build_is_deterministic() {
        let builder = PromptBuilder::default();
        assert_eq!(builder.build("same"), builder.build("same"));
    }
}
