pub mod account;
pub mod profile;
pub mod session;

pub use account::Account;
pub use profile::Profile;
pub use session::{FeedbackRecord, ResponseRecord, SessionRecord};
