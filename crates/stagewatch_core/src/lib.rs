//! Stagewatch core: pure task-progress state machines and the status codec.
mod effect;
mod msg;
mod retry;
mod stage;
mod state;
mod status;
mod task;
mod update;
mod view_model;

pub use effect::{Effect, Failure, FailureKind, Notification, Outcome};
pub use msg::Msg;
pub use retry::{ResetPolicy, RetryBudget, RetryPolicy};
pub use stage::{
    stage_index, Stage, StageMapper, StageOutcome, StageStatus, STAGE_COUNT, STAGE_LABELS,
};
pub use state::{ConnectionState, SubscriptionState};
pub use status::{decode_status, ParseFailure, StatusMessage, TaskStatus};
pub use task::{SubscribeError, TaskId};
pub use update::update;
pub use view_model::{ProgressViewModel, StageRowView};
