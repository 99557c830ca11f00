//! Two-level label taxonomy: main category, and a sub-category that is only
//! meaningful under "recruiting".

use std::collections::BTreeSet;

/// Main category whose sub-categories form a closed set.
pub const RECRUITING: &str = "recruiting";

/// Catch-all main category.
pub const GENERAL: &str = "general";

/// Sub-category required for every main category other than "recruiting".
pub const NOT_APPLICABLE: &str = "not_applicable";

/// Spellings of "not applicable" seen in model replies and labelled data.
const NOT_APPLICABLE_SYNONYMS: &[&str] = &["", "n/a", "na", "nan", "none", "not applicable"];

const RECRUITING_SUB_CATEGORIES: &[&str] = &[
    "add_to_calender",
    "assignment",
    "availability",
    "cancelled_call",
    "deadline_change",
    "document_request",
    "document_submission",
    "feedback",
    "follow_up",
    "interview_cancel",
    "interview_confirmation",
    "interview_feedback",
    "interview_invite",
    "interview_prep",
    "interview_reschedule",
    "interview_schedule",
    "next_interview",
    "next_round",
    "no_text",
    "phone_screen",
    "post_interview_debrief",
    "referral_confirmation",
    "rejection",
    "rescheduling",
    "role_outreach",
    "schedule_delay",
    "scheduling",
    "screening_call",
    "shortlisted",
    "status_update",
    "status_update_pending",
    "work_location",
];

/// Why a label pair is outside the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaxonomyViolation {
    #[error("unknown main category '{0}'")]
    UnknownMain(String),

    #[error("sub-category '{sub}' is not valid under '{main}'")]
    InvalidSub { main: String, sub: String },
}

/// Read-only label set. An empty sub-category set means the main category
/// only accepts [`NOT_APPLICABLE`]. Main categories keep declaration order.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    categories: Vec<(String, BTreeSet<String>)>,
}

impl Taxonomy {
    /// Build from `(main, subs)` pairs.
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<S>)>,
        S: Into<String>,
    {
        let mut merged: Vec<(String, BTreeSet<String>)> = Vec::new();
        for (main, subs) in categories {
            let main = normalize_main(&main.into());
            let subs = subs.into_iter().map(|s| normalize_sub(&s.into()));
            match merged.iter_mut().find(|(m, _)| *m == main) {
                Some((_, existing)) => existing.extend(subs),
                None => merged.push((main, subs.collect())),
            }
        }
        Self { categories: merged }
    }

    fn subs_of(&self, main: &str) -> Option<&BTreeSet<String>> {
        self.categories
            .iter()
            .find(|(m, _)| m == main)
            .map(|(_, subs)| subs)
    }

    /// The recruiting / general taxonomy the classifier prompt is written for.
    pub fn recruiting() -> Self {
        Self::new([
            (RECRUITING, RECRUITING_SUB_CATEGORIES.to_vec()),
            (GENERAL, Vec::new()),
        ])
    }

    /// Main categories in declaration order.
    pub fn main_categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|(main, _)| main.as_str())
    }

    /// Valid sub-categories of `main` (empty for "not applicable" categories).
    pub fn sub_categories(&self, main: &str) -> impl Iterator<Item = &str> {
        self.subs_of(main)
            .into_iter()
            .flat_map(|subs| subs.iter().map(String::as_str))
    }

    /// Check an already-normalized label pair.
    pub fn validate(&self, main: &str, sub: &str) -> Result<(), TaxonomyViolation> {
        let subs = self
            .subs_of(main)
            .ok_or_else(|| TaxonomyViolation::UnknownMain(main.to_string()))?;

        let ok = if subs.is_empty() {
            sub == NOT_APPLICABLE
        } else {
            subs.contains(sub)
        };

        if ok {
            Ok(())
        } else {
            Err(TaxonomyViolation::InvalidSub {
                main: main.to_string(),
                sub: sub.to_string(),
            })
        }
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::recruiting()
    }
}

/// Lowercase and trim a main category.
pub fn normalize_main(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Lowercase and trim a sub-category, folding "N/A" spellings.
pub fn normalize_sub(raw: &str) -> String {
    fold_not_applicable(raw)
}

/// Lowercase and trim any label, mapping empty and "N/A" spellings to
/// [`NOT_APPLICABLE`].
pub fn fold_not_applicable(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    if NOT_APPLICABLE_SYNONYMS.contains(&lowered.as_str()) {
        NOT_APPLICABLE.to_string()
    } else {
        lowered
    }
}
