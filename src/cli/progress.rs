//! Console Progress
//!
//! Drains the pipeline's event channel and prints stage headers, per-unit
//! progress bars and errors. Agent thoughts are shown only when verbose.

use console::style;
use std::time::Instant;
use tokio::sync::broadcast::{Receiver, error::RecvError};
use tokio::task::JoinHandle;

use crate::events::{EventBus, PipelineEvent, Stage};

pub struct ConsoleRenderer {
    verbose: bool,
    started: Instant,
}

impl ConsoleRenderer {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            started: Instant::now(),
        }
    }

    /// Subscribe now and render on a background task until the run ends
    pub fn spawn(self, events: &EventBus) -> JoinHandle<()> {
        let rx = events.subscribe();
        tokio::spawn(self.drain(rx))
    }

    async fn drain(self, mut rx: Receiver<PipelineEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = self.render(&event) {
                        println!("{}", line);
                    }
                    if is_terminal(&event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    println!("{}", style(format!("  ... {} events skipped", skipped)).dim());
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    pub fn render(&self, event: &PipelineEvent) -> Option<String> {
        match event {
            PipelineEvent::StageChange { stage, message } => {
                let title = match stage {
                    Stage::Completed => format!(
                        "{} {} ({})",
                        style("✓").green(),
                        message,
                        format_duration(self.started.elapsed().as_secs())
                    ),
                    Stage::Failed => format!("{} {}", style("✗").red(), message),
                    _ => format!(
                        "{} {}",
                        style(format!("[{}]", stage)).cyan().bold(),
                        message
                    ),
                };
                Some(title)
            }
            PipelineEvent::Progress {
                current,
                total,
                message,
                ..
            } => Some(format!(
                "  {} {}/{} {}",
                render_progress_bar(*current, *total, 20),
                current,
                total,
                message
            )),
            PipelineEvent::Navigation { data, .. } => {
                let top = data
                    .get("tree")
                    .and_then(|t| t.as_array())
                    .map_or(0, Vec::len);
                Some(format!("  Navigation ready: {} top-level entries", top))
            }
            PipelineEvent::Error { stage, message } => Some(format!(
                "  {} {}: {}",
                style("error").red().bold(),
                stage,
                message
            )),
            PipelineEvent::AgentThought { subtype, data } if self.verbose => Some(
                style(format!("    · {:?} {}", subtype, data))
                    .dim()
                    .to_string(),
            ),
            PipelineEvent::AgentThought { .. } => None,
        }
    }
}

fn is_terminal(event: &PipelineEvent) -> bool {
    matches!(
        event,
        PipelineEvent::StageChange {
            stage: Stage::Completed | Stage::Failed,
            ..
        }
    )
}

/// Render a simple progress bar
fn render_progress_bar(completed: usize, total: usize, width: usize) -> String {
    if total == 0 {
        return format!("[{}]", " ".repeat(width));
    }

    let progress = (completed as f32 / total as f32).min(1.0);
    let filled = (progress * width as f32) as usize;
    let empty = width.saturating_sub(filled);

    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// Format duration as human-readable string
fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ThoughtKind;
    use serde_json::json;

    #[test]
    fn test_progress_bar_render() {
        assert_eq!(render_progress_bar(0, 10, 10), "[░░░░░░░░░░]");
        assert_eq!(render_progress_bar(5, 10, 10), "[█████░░░░░]");
        assert_eq!(render_progress_bar(10, 10, 10), "[██████████]");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3700), "1h 1m");
    }

    #[test]
    fn test_thoughts_hidden_unless_verbose() {
        let thought = PipelineEvent::AgentThought {
            subtype: ThoughtKind::ToolCalls,
            data: json!({"calls": ["submit_facts"]}),
        };
        assert!(ConsoleRenderer::new(false).render(&thought).is_none());
        assert!(ConsoleRenderer::new(true).render(&thought).is_some());
    }

    #[test]
    fn test_progress_line() {
        let line = ConsoleRenderer::new(false)
            .render(&PipelineEvent::Progress {
                stage: Stage::Mining,
                message: "Analyzed app.py".into(),
                current: 1,
                total: 2,
            })
            .unwrap();
        assert!(line.contains("1/2 Analyzed app.py"));
    }

    #[tokio::test]
    async fn test_renderer_stops_on_completion() {
        let events = EventBus::new();
        let handle = ConsoleRenderer::new(false).spawn(&events);
        events.stage(Stage::Mining, "mining");
        events.stage(Stage::Completed, "done");
        handle.await.unwrap();
    }
}
