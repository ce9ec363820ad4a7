//! Entity building blocks: the subscriber contract, shared core state,
//! sparse merge and change notification.

mod base;
pub mod merge;
mod notifier;
mod traits;

pub use base::{EntityCore, EquipmentClass, EquipmentId, MatchRule, Route};
pub use merge::SparseMerge;
pub use notifier::{ChangeNotifier, StateChange};
pub use traits::{CommandSink, EntityContext, Subscriber};

#[cfg(test)]
pub(crate) use traits::tests::{RecordingSink, context as test_context};
