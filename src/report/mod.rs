//! Offline reports over a predictions file.

pub mod evaluate;
pub mod timeline;

pub use evaluate::{ClassificationReport, EvaluationReport, LabelScore, evaluate};
pub use timeline::{Timeline, TimelineEvent, build_timeline, render_html, write_html};
