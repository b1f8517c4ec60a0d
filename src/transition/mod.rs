pub mod coordinator;
pub mod queue;

pub use coordinator::{
    CompletionEvent, CompletionKind, PendingCompletion, TransitionCoordinator, WaitOutcome, FRAME,
};
pub use queue::{QueueTicket, TransitionQueue};
