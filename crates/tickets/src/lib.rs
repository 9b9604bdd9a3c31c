//! Ticket session routing.
//!
//! Flow: inbound message → eligibility check → session lookup (create if
//! absent) → state machine → optional AI draft → reply through the injected
//! sender → session written back.
//!
//! The startup guard lives here too: it starts the bridge subsystems once per
//! process no matter how many times the platform reports ready.

pub mod command;
pub mod draft;
pub mod eligibility;
pub mod error;
pub mod machine;
pub mod outbound;
pub mod reference;
pub mod router;
pub mod session;
pub mod startup;
pub mod sweeper;
pub mod table;

pub use {
    draft::{DraftingAdapter, OutgoingMessage},
    eligibility::{Eligibility, is_eligible},
    error::{BootstrapError, DraftError, RouterError},
    outbound::MessageSender,
    reference::ReferenceTexts,
    router::{RouterSettings, TicketRouter},
    session::{ControlFlags, Session, SessionState, Speaker, Turn},
    startup::{Bridge, StartupGuard, StartupOutcome},
    sweeper::spawn_idle_sweeper,
    table::{SessionHandle, SessionTable},
};
