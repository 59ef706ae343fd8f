use crate::{StageOutcome, StageStatus};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressViewModel {
    pub stages: Vec<StageRowView>,
    pub percent: u8,
    pub message: Option<String>,
    pub outcome: Option<StageOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRowView {
    pub id: u8,
    pub label: String,
    pub status: StageStatus,
}
