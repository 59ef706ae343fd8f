use stagewatch_core::{ConnectionState, ProgressViewModel, StageOutcome, StageStatus};

/// Renders the progress screen as terminal lines.
pub fn render(
    task_id: &str,
    view: &ProgressViewModel,
    connection: ConnectionState,
    stamp: &str,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(view.stages.len() + 3);
    lines.push(format!(
        "[{stamp}] task {task_id}  {:>3}%  {}",
        view.percent,
        connection_label(connection, view.outcome.as_ref())
    ));
    for row in &view.stages {
        lines.push(format!(
            "  {} {}. {}",
            status_marker(row.status),
            row.id,
            row.label
        ));
    }
    if let Some(message) = &view.message {
        lines.push(format!("  {message}"));
    }
    lines
}

fn status_marker(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Pending => "[ ]",
        StageStatus::Processing => "[>]",
        StageStatus::Completed => "[x]",
        StageStatus::Error => "[!]",
    }
}

fn connection_label(connection: ConnectionState, outcome: Option<&StageOutcome>) -> &'static str {
    match (outcome, connection) {
        (Some(StageOutcome::Completed { .. }), _) => "done",
        (Some(StageOutcome::Failed { .. }), _) => "failed",
        (None, ConnectionState::Idle | ConnectionState::Connecting) => "connecting",
        (None, ConnectionState::Open) => "live",
        (None, ConnectionState::Reconnecting) => "reconnecting",
        (None, ConnectionState::Closed) => "closed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stagewatch_core::{StageMapper, StatusMessage, TaskStatus};

    #[test]
    fn renders_stage_rows_with_markers() {
        let mut mapper = StageMapper::new();
        let mut msg = StatusMessage::with_status(TaskStatus::Scraping);
        msg.progress_current = Some(42.0);
        msg.human_message = Some("Fetching comments for 12 videos".to_string());
        mapper.apply(&msg);

        let lines = render("t-1", &mapper.view(), ConnectionState::Open, "10:00:00");
        assert_eq!(
            lines,
            vec![
                "[10:00:00] task t-1   42%  live".to_string(),
                "  [x] 1. Searching for videos".to_string(),
                "  [>] 2. Collecting comments".to_string(),
                "  [ ] 3. Running AI analysis".to_string(),
                "  [ ] 4. Generating report".to_string(),
                "  Fetching comments for 12 videos".to_string(),
            ]
        );
    }

    #[test]
    fn failure_overrides_connection_label() {
        let mut mapper = StageMapper::new();
        mapper.apply(&StatusMessage::with_status(TaskStatus::Analyzing));
        let mut failed = StatusMessage::with_status(TaskStatus::Error);
        failed.error_detail = Some("quota exceeded".to_string());
        mapper.apply(&failed);

        let lines = render("t-1", &mapper.view(), ConnectionState::Closed, "10:00:01");
        assert_eq!(lines[0], "[10:00:01] task t-1    0%  failed");
        assert_eq!(lines[3], "  [!] 3. Running AI analysis");
    }
}
