use crate::view_model::{ProgressViewModel, StageRowView};
use crate::{StatusMessage, TaskStatus};

pub const STAGE_COUNT: usize = 4;

/// Labels for the fixed pipeline: search, scrape, analyze, generate.
pub const STAGE_LABELS: [&str; STAGE_COUNT] = [
    "Searching for videos",
    "Collecting comments",
    "Running AI analysis",
    "Generating report",
];

/// Upper bounds (exclusive) of the progress bands for stages 0..=2.
const PROGRESS_BANDS: [f64; STAGE_COUNT - 1] = [20.0, 50.0, 85.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

impl StageStatus {
    /// Display rank; a stage never moves to a lower rank.
    pub fn rank(self) -> u8 {
        match self {
            StageStatus::Pending => 0,
            StageStatus::Processing => 1,
            StageStatus::Completed | StageStatus::Error => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub id: u8,
    pub label: &'static str,
    pub status: StageStatus,
}

/// How a finished task ended, as seen by the stage list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed { report_id: Option<String> },
    Failed { detail: String },
}

/// Folds status messages into the four-stage view model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageMapper {
    stages: [Stage; STAGE_COUNT],
    percent: u8,
    message: Option<String>,
    outcome: Option<StageOutcome>,
    dirty: bool,
}

impl Default for StageMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl StageMapper {
    pub fn new() -> Self {
        let stages = std::array::from_fn(|index| Stage {
            id: index as u8 + 1,
            label: STAGE_LABELS[index],
            status: StageStatus::Pending,
        });
        Self {
            stages,
            percent: 0,
            message: None,
            outcome: None,
            dirty: false,
        }
    }

    pub fn stages(&self) -> &[Stage; STAGE_COUNT] {
        &self.stages
    }

    pub fn statuses(&self) -> [StageStatus; STAGE_COUNT] {
        std::array::from_fn(|index| self.stages[index].status)
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn outcome(&self) -> Option<&StageOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Returns whether anything changed since the last call.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Applies one message. Messages after a terminal one are ignored.
    ///
    /// The percentage is always the latest reported progress, terminal
    /// messages included; a message without progress leaves it unchanged.
    pub fn apply(&mut self, msg: &StatusMessage) {
        if self.outcome.is_some() {
            return;
        }
        let before = self.clone();

        if let Some(percent) = msg.percent() {
            self.percent = percent;
        }
        if let Some(text) = &msg.human_message {
            self.message = Some(text.clone());
        }

        match &msg.status {
            TaskStatus::Completed => {
                for stage in &mut self.stages {
                    stage.status = StageStatus::Completed;
                }
                self.outcome = Some(StageOutcome::Completed {
                    report_id: msg.stage_hint.clone(),
                });
            }
            TaskStatus::Error => {
                for stage in &mut self.stages {
                    if stage.status == StageStatus::Processing {
                        stage.status = StageStatus::Error;
                    }
                }
                self.outcome = Some(StageOutcome::Failed {
                    detail: failure_detail(msg),
                });
            }
            _ => {
                if let Some(current) = stage_index(msg) {
                    self.advance_to(current);
                }
            }
        }

        let changed = self.stages != before.stages
            || self.percent != before.percent
            || self.message != before.message
            || self.outcome != before.outcome;
        self.dirty |= changed;
    }

    /// Raises every stage toward the target implied by `current`; never lowers.
    fn advance_to(&mut self, current: usize) {
        for (index, stage) in self.stages.iter_mut().enumerate() {
            let target = if index < current {
                StageStatus::Completed
            } else if index == current {
                StageStatus::Processing
            } else {
                StageStatus::Pending
            };
            if target.rank() > stage.status.rank() {
                stage.status = target;
            }
        }
    }

    pub fn view(&self) -> ProgressViewModel {
        ProgressViewModel {
            stages: self
                .stages
                .iter()
                .map(|stage| StageRowView {
                    id: stage.id,
                    label: stage.label.to_string(),
                    status: stage.status,
                })
                .collect(),
            percent: self.percent,
            message: self.message.clone(),
            outcome: self.outcome.clone(),
        }
    }
}

/// Stage implied by a non-terminal message. The status keyword wins over the
/// numeric progress; unknown keywords fall back to the progress bands.
pub fn stage_index(msg: &StatusMessage) -> Option<usize> {
    match msg.status {
        TaskStatus::Searching => Some(0),
        TaskStatus::Scraping => Some(1),
        TaskStatus::Analyzing => Some(2),
        TaskStatus::Generating => Some(3),
        TaskStatus::Completed | TaskStatus::Error => None,
        TaskStatus::Connected | TaskStatus::Unspecified | TaskStatus::Other(_) => msg
            .progress_current
            .filter(|value| value.is_finite())
            .map(stage_for_progress),
    }
}

fn stage_for_progress(progress: f64) -> usize {
    PROGRESS_BANDS
        .iter()
        .position(|bound| progress < *bound)
        .unwrap_or(STAGE_COUNT - 1)
}

fn failure_detail(msg: &StatusMessage) -> String {
    msg.error_detail
        .clone()
        .or_else(|| msg.human_message.clone())
        .unwrap_or_else(|| "task failed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress_only(value: f64) -> StatusMessage {
        let mut msg = StatusMessage::with_status(TaskStatus::Other("tick".to_string()));
        msg.progress_current = Some(value);
        msg
    }

    #[test]
    fn progress_bands_map_to_stages() {
        assert_eq!(stage_index(&progress_only(0.0)), Some(0));
        assert_eq!(stage_index(&progress_only(19.9)), Some(0));
        assert_eq!(stage_index(&progress_only(20.0)), Some(1));
        assert_eq!(stage_index(&progress_only(49.0)), Some(1));
        assert_eq!(stage_index(&progress_only(50.0)), Some(2));
        assert_eq!(stage_index(&progress_only(84.0)), Some(2));
        assert_eq!(stage_index(&progress_only(85.0)), Some(3));
        assert_eq!(stage_index(&progress_only(250.0)), Some(3));
    }

    #[test]
    fn status_keyword_beats_progress() {
        let mut msg = StatusMessage::with_status(TaskStatus::Scraping);
        msg.progress_current = Some(90.0);
        assert_eq!(stage_index(&msg), Some(1));
    }

    #[test]
    fn handshake_without_progress_maps_nowhere() {
        let msg = StatusMessage::with_status(TaskStatus::Connected);
        assert_eq!(stage_index(&msg), None);
    }

    #[test]
    fn error_ranks_with_completed() {
        assert!(StageStatus::Pending.rank() < StageStatus::Processing.rank());
        assert!(StageStatus::Processing.rank() < StageStatus::Completed.rank());
        assert_eq!(StageStatus::Completed.rank(), StageStatus::Error.rank());
    }
}
