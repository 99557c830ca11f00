//! End-to-end batch flow on disk: load records, classify with a stub model,
//! write predictions, then evaluate and build the timeline from the file.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use mail_classify::config::ClassifierConfig;
use mail_classify::dataset;
use mail_classify::error::LlmError;
use mail_classify::llm::CompletionTransport;
use mail_classify::pipeline::{Dispatcher, OutcomeSummary};
use mail_classify::report;
use mail_classify::taxonomy::Taxonomy;

/// Answers from keywords in the prompt; "broken" emails get a 503.
struct KeywordModel;

#[async_trait]
impl CompletionTransport for KeywordModel {
    fn model_name(&self) -> &str {
        "keyword"
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let email = prompt.rsplit("---\n").nth(1).unwrap_or_default();
        if email.contains("broken") {
            return Err(LlmError::Service {
                provider: "keyword".into(),
                status: 503,
                body: "unavailable".into(),
            });
        }
        let reply = if email.contains("regret") {
            r#"{"main_category": "recruiting", "sub_category": "rejection"}"#
        } else if email.contains("interview") {
            r#"Here you go: {"main_category": "recruiting", "sub_category": "interview_schedule"}"#
        } else {
            r#"{"main_category": "general", "sub_category": "N/A"}"#
        };
        Ok(reply.to_string())
    }
}

const INPUT: &str = r#"[
  {
    "text": "<p>We regret to inform you &amp; wish you luck</p>",
    "headers": {"date": "Tue, 05 Mar 2024 09:30:00 +0000", "from": "Acme Jobs <jobs@acme.com>", "subject": "Your application"},
    "main_category": "recruiting",
    "sub_category": "rejection"
  },
  {
    "text": "Weekly newsletter",
    "headers.date": "2024-03-01 08:00:00",
    "headers.from": "news@paper.com",
    "main_category": "general",
    "sub_category": "N/A"
  },
  {
    "text": "Let's set up an interview",
    "headers": {"date": "2024-02-20T10:00:00Z", "from": "recruiter@acme.com", "subject": "Next steps"},
    "main_category": "recruiting",
    "sub_category": "interview_schedule"
  },
  {
    "text": "broken message",
    "main_category": "general",
    "sub_category": ""
  }
]"#;

fn dispatcher() -> Dispatcher {
    let config = ClassifierConfig::new("keyword", SecretString::from("k")).without_delays();
    Dispatcher::from_config(
        Arc::new(KeywordModel),
        Arc::new(Taxonomy::recruiting()),
        &config,
    )
}

#[tokio::test]
async fn classify_write_evaluate_and_timeline() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("emails.json");
    let output = dir.path().join("predictions.json");
    std::fs::write(&input, INPUT).unwrap();

    let records = dataset::load_records(&input, None).unwrap();
    let outcomes = dispatcher().run(dataset::to_items(&records)).await;

    let summary = OutcomeSummary::from_outcomes(&outcomes);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.count("classified"), 3);
    assert_eq!(summary.count("api_error"), 1);

    let predictions = dataset::to_predictions(records, &outcomes).unwrap();
    dataset::write_predictions(&output, &predictions).unwrap();

    let reloaded = dataset::load_predictions(&output).unwrap();
    assert_eq!(reloaded, predictions);
    assert_eq!(reloaded[0].pred_sub, "rejection");
    assert_eq!(reloaded[1].pred_sub, "not_applicable");
    assert_eq!(reloaded[3].pred_main, "api_error");
    assert_eq!(reloaded[3].status_code, Some(503));
    assert_eq!(reloaded[1].record.header("from").as_deref(), Some("news@paper.com"));

    let ground_truth = dataset::load_records(&input, None).unwrap();
    let evaluation = report::evaluate(&reloaded, &ground_truth).unwrap();
    assert_eq!(evaluation.matched, 4);
    assert_eq!(evaluation.skipped_failures, 1);
    assert_eq!(evaluation.main.accuracy, 1.0);
    assert_eq!(evaluation.sub.as_ref().unwrap().accuracy, 1.0);

    let timeline = report::build_timeline(&reloaded);
    let acme = &timeline.companies["acme.com"];
    assert_eq!(acme.len(), 2);
    assert_eq!(acme[0].subject, "Next steps");
    assert_eq!(acme[1].sub_category, "rejection");
    assert!(!timeline.companies.contains_key("paper.com"));
}

#[tokio::test]
async fn limit_truncates_batch() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("emails.json");
    std::fs::write(&input, INPUT).unwrap();

    let records = dataset::load_records(&input, Some(2)).unwrap();
    let outcomes = dispatcher().run(dataset::to_items(&records)).await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.outcome.is_classified()));
}

#[test]
fn missing_input_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = dataset::load_records(&dir.path().join("nope.json"), None).unwrap_err();
    assert!(err.to_string().contains("nope.json"));
}
