//! Emergency escalation
//!
//! - `engine`: per-reading state machine deciding when to alert
//! - `handle`: shared state, manual trigger, cooldown reservation, dispatch
//! - `alert`: alert message texts

mod alert;
mod engine;
mod handle;

pub use alert::{Alert, AlertKind};
pub use engine::{EscalationEngine, EscalationOutcome};
pub use handle::{DispatchTicket, EscalationError, EscalationHandle};
