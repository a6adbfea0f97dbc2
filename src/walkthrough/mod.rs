pub mod controller;
pub mod service;
pub mod state;

pub use controller::Walkthrough;
pub use service::{Ingested, StudyService};
pub use state::{
    AttentionProbe, Outcome, ParticipantProgress, PresentationUnit, ProgressInfo, Startup, Step,
    StudyRecord, Transition, UnitItem, WalkthroughPhase,
};
