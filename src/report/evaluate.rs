//! Precision / recall / F1 of predictions against a labelled set.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::dataset::{EmailRecord, PredictionRecord};
use crate::error::ReportError;
use crate::pipeline::types::FAILURE_LABELS;
use crate::taxonomy::{NOT_APPLICABLE, RECRUITING, fold_not_applicable, normalize_sub};

/// Scores for one label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-label scores plus accuracy and averages for one label level.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub title: String,
    pub labels: Vec<LabelScore>,
    pub accuracy: f64,
    /// Number of rows scored.
    pub total: usize,
    pub macro_avg: (f64, f64, f64),
    pub weighted_avg: (f64, f64, f64),
}

/// Both levels of the taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    /// Rows matched by text, before failed predictions were dropped.
    pub matched: usize,
    /// Matched rows whose prediction was a failure label.
    pub skipped_failures: usize,
    pub main: ClassificationReport,
    /// Absent when no scored row is truly `recruiting`.
    pub sub: Option<ClassificationReport>,
}

/// Score `predictions` against `ground_truth`, joined on the email text.
///
/// Both sides are de-duplicated by text (first occurrence wins). Rows whose
/// prediction is a failure label are not scored.
pub fn evaluate(
    predictions: &[PredictionRecord],
    ground_truth: &[EmailRecord],
) -> Result<EvaluationReport, ReportError> {
    let mut truth_by_text: HashMap<&str, &EmailRecord> = HashMap::new();
    for record in ground_truth {
        truth_by_text.entry(record.text.as_str()).or_insert(record);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut matched = 0;
    let mut skipped_failures = 0;
    let mut rows: Vec<((String, String), (String, String))> = Vec::new();
    for pred in predictions {
        let text = pred.record.text.as_str();
        if !seen.insert(text) {
            continue;
        }
        let Some(truth) = truth_by_text.get(text) else {
            continue;
        };
        matched += 1;
        if FAILURE_LABELS.contains(&pred.pred_main.as_str()) {
            skipped_failures += 1;
            continue;
        }
        rows.push((
            truth_labels(truth),
            (fold_not_applicable(&pred.pred_main), normalize_sub(&pred.pred_sub)),
        ));
    }

    if matched == 0 {
        return Err(ReportError::NoOverlap);
    }

    let main_pairs: Vec<(&str, &str)> = rows
        .iter()
        .map(|(t, p)| (t.0.as_str(), p.0.as_str()))
        .collect();
    let sub_pairs: Vec<(&str, &str)> = rows
        .iter()
        .filter(|(t, _)| t.0 == RECRUITING)
        .map(|(t, p)| (t.1.as_str(), p.1.as_str()))
        .collect();

    Ok(EvaluationReport {
        matched,
        skipped_failures,
        main: ClassificationReport::score("Main category", &main_pairs),
        sub: (!sub_pairs.is_empty())
            .then(|| ClassificationReport::score("Sub category (recruiting only)", &sub_pairs)),
    })
}

/// Ground-truth labels; a missing label reads as `not_applicable`, which
/// keeps the row scored but out of the per-label rows.
fn truth_labels(record: &EmailRecord) -> (String, String) {
    (
        fold_not_applicable(record.main_category.as_deref().unwrap_or("")),
        normalize_sub(record.sub_category.as_deref().unwrap_or("")),
    )
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ClassificationReport {
    /// Score `(truth, prediction)` pairs over the union of labels seen on
    /// either side, excluding `not_applicable`.
    pub fn score(title: &str, pairs: &[(&str, &str)]) -> Self {
        let labels: BTreeSet<&str> = pairs
            .iter()
            .flat_map(|(t, p)| [*t, *p])
            .filter(|l| *l != NOT_APPLICABLE)
            .collect();

        let scores: Vec<LabelScore> = labels
            .iter()
            .map(|&label| {
                let tp = pairs.iter().filter(|(t, p)| *t == label && *p == label).count();
                let predicted = pairs.iter().filter(|(_, p)| *p == label).count();
                let support = pairs.iter().filter(|(t, _)| *t == label).count();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                LabelScore {
                    label: label.to_string(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let correct = pairs.iter().filter(|(t, p)| t == p).count();
        let n = scores.len() as f64;
        let macro_avg = if scores.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                scores.iter().map(|s| s.precision).sum::<f64>() / n,
                scores.iter().map(|s| s.recall).sum::<f64>() / n,
                scores.iter().map(|s| s.f1).sum::<f64>() / n,
            )
        };
        let total_support: usize = scores.iter().map(|s| s.support).sum();
        let weighted_avg = if total_support == 0 {
            (0.0, 0.0, 0.0)
        } else {
            let w = |f: fn(&LabelScore) -> f64| {
                scores.iter().map(|s| f(s) * s.support as f64).sum::<f64>() / total_support as f64
            };
            (
                w(|s: &LabelScore| s.precision),
                w(|s: &LabelScore| s.recall),
                w(|s: &LabelScore| s.f1),
            )
        };

        Self {
            title: title.to_string(),
            labels: scores,
            accuracy: ratio(correct, pairs.len()),
            total: pairs.len(),
            macro_avg,
            weighted_avg,
        }
    }

    pub fn label(&self, name: &str) -> Option<&LabelScore> {
        self.labels.iter().find(|s| s.label == name)
    }

    fn support_sum(&self) -> usize {
        self.labels.iter().map(|s| s.support).sum()
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .labels
            .iter()
            .map(|s| s.label.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(0);

        writeln!(f, "{}", self.title)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for s in &self.labels {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                s.label, s.precision, s.recall, s.f1, s.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.total
        )?;
        let support = self.support_sum();
        for (name, (p, r, f1)) in [("macro avg", self.macro_avg), ("weighted avg", self.weighted_avg)] {
            writeln!(
                f,
                "{name:>width$} {p:>9.2} {r:>9.2} {f1:>9.2} {support:>9}"
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Matched {} records ({} failed predictions skipped)",
            self.matched, self.skipped_failures
        )?;
        writeln!(f)?;
        write!(f, "{}", self.main)?;
        if let Some(sub) = &self.sub {
            writeln!(f)?;
            write!(f, "{sub}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truth(text: &str, main: &str, sub: &str) -> EmailRecord {
        EmailRecord {
            main_category: Some(main.into()),
            sub_category: Some(sub.into()),
            ..EmailRecord::new(text)
        }
    }

    fn pred(id: usize, text: &str, main: &str, sub: &str) -> PredictionRecord {
        let outcome = if FAILURE_LABELS.contains(&main) { main } else { "classified" };
        PredictionRecord {
            id,
            record: EmailRecord::new(text),
            pred_main: main.into(),
            pred_sub: sub.into(),
            outcome: outcome.into(),
            status_code: None,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn main_scores_per_label() {
        let gt = vec![
            truth("a", "recruiting", "rejection"),
            truth("b", "recruiting", "next_round"),
            truth("c", "general", "N/A"),
        ];
        let preds = vec![
            pred(0, "a", "recruiting", "rejection"),
            pred(1, "b", "general", "not_applicable"),
            pred(2, "c", "general", "n/a"),
        ];
        let report = evaluate(&preds, &gt).unwrap();
        assert_eq!(report.matched, 3);

        let recruiting = report.main.label("recruiting").unwrap();
        assert!(close(recruiting.precision, 1.0));
        assert!(close(recruiting.recall, 0.5));
        assert_eq!(recruiting.support, 2);

        let general = report.main.label("general").unwrap();
        assert!(close(general.precision, 0.5));
        assert!(close(general.recall, 1.0));
        assert!(close(report.main.accuracy, 2.0 / 3.0));
    }

    #[test]
    fn sub_report_restricted_to_true_recruiting() {
        let gt = vec![
            truth("a", "recruiting", "rejection"),
            truth("b", "recruiting", "rejection"),
            truth("c", "general", "N/A"),
        ];
        let preds = vec![
            pred(0, "a", "recruiting", "rejection"),
            pred(1, "b", "recruiting", "next_round"),
            pred(2, "c", "recruiting", "rejection"),
        ];
        let sub = evaluate(&preds, &gt).unwrap().sub.unwrap();
        assert_eq!(sub.total, 2);
        assert_eq!(sub.label("rejection").unwrap().support, 2);
        assert!(close(sub.label("rejection").unwrap().recall, 0.5));
        assert!(close(sub.label("next_round").unwrap().precision, 0.0));
    }

    #[test]
    fn no_recruiting_truth_means_no_sub_report() {
        let gt = vec![truth("a", "general", "")];
        let preds = vec![pred(0, "a", "general", "not_applicable")];
        assert!(evaluate(&preds, &gt).unwrap().sub.is_none());
    }

    #[test]
    fn failures_are_skipped_and_counted() {
        let gt = vec![truth("a", "general", ""), truth("b", "general", "")];
        let preds = vec![
            pred(0, "a", "general", "not_applicable"),
            pred(1, "b", "api_error", "api_error"),
        ];
        let report = evaluate(&preds, &gt).unwrap();
        assert_eq!(report.matched, 2);
        assert_eq!(report.skipped_failures, 1);
        assert_eq!(report.main.total, 1);
        assert!(report.main.label("api_error").is_none());
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let gt = vec![truth("a", "general", ""), truth("a", "recruiting", "rejection")];
        let preds = vec![
            pred(0, "a", "general", "not_applicable"),
            pred(1, "a", "recruiting", "rejection"),
        ];
        let report = evaluate(&preds, &gt).unwrap();
        assert_eq!(report.matched, 1);
        assert!(close(report.main.accuracy, 1.0));
    }

    #[test]
    fn not_applicable_excluded_from_labels() {
        let report = ClassificationReport::score("t", &[("not_applicable", "rejection")]);
        assert_eq!(report.labels.len(), 1);
        assert_eq!(report.labels[0].label, "rejection");
        assert!(close(report.labels[0].precision, 0.0));
        assert_eq!(report.labels[0].support, 0);
    }

    #[test]
    fn no_overlap_is_an_error() {
        let gt = vec![truth("a", "general", "")];
        let preds = vec![pred(0, "zzz", "general", "")];
        assert!(matches!(evaluate(&preds, &gt), Err(ReportError::NoOverlap)));
    }

    #[test]
    fn unlabeled_truth_rows_do_not_abort() {
        let gt = vec![
            truth("a", "general", ""),
            EmailRecord::new("never-predicted"),
            EmailRecord::new("b"),
        ];
        let preds = vec![
            pred(0, "a", "general", "not_applicable"),
            pred(1, "b", "recruiting", "rejection"),
        ];
        let report = evaluate(&preds, &gt).unwrap();
        assert_eq!(report.matched, 2);
        assert_eq!(report.main.total, 2);
        assert!(report.main.label("not_applicable").is_none());
        assert_eq!(report.main.label("general").unwrap().support, 1);
        assert_eq!(report.main.label("recruiting").unwrap().support, 0);
        assert!(report.sub.is_none());
    }

    #[test]
    fn renders_table() {
        let report = ClassificationReport::score(
            "Main category",
            &[("general", "general"), ("recruiting", "general")],
        );
        let text = report.to_string();
        assert!(text.starts_with("Main category\n"));
        assert!(text.contains("precision"));
        assert!(text.contains("     general      0.50      1.00      0.67         1"));
        assert!(text.contains("    accuracy                          0.50         2"));
        assert!(text.contains("weighted avg"));
    }
}
