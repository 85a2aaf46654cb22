pub mod booking;
pub mod drafting;
pub mod error;
pub mod lifecycle;
pub mod messages;
pub mod scheduler;

pub use booking::{AppointmentBooker, BookingError, CalendarConfig, GoogleCalendarBooker, UnconfiguredBooker};
pub use drafting::{outreach_instruction, DraftContext, DraftingAgent, LlmDraftingAgent, OutreachContext};
pub use error::{AgentError, EngineError, Result};
pub use lifecycle::{
    CreateAppointment, CreateFollowup, CreatedFollowup, DecisionRequest, FollowupEngine, FollowupPatch, IgnoreReason,
    IngestOutcome, InboundRoute, ReminderPatch,
};
pub use scheduler::{
    CleanupReport, JobSummary, ReminderHandler, ReminderScheduler, SchedulerConfig,
    SchedulerHandle, SchedulerStatus,
};
