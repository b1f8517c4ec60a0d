pub mod store;

pub use store::{SetOptions, StateKey, StateStore, StateValue, Subscription};
