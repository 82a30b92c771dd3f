//! Business logic services module.

pub mod aggregator;
pub mod destination;
pub mod ledger;
pub mod pipeline;
pub mod publishers;
pub mod relay;
pub mod scheduler;

pub use aggregator::Aggregator;
pub use destination::{ApplicationState, DestinationApplier};
pub use ledger::{RoundLedger, RoundStore};
pub use pipeline::{CycleReport, Pipeline, RelayOutcome};
pub use publishers::PublisherRegistry;
pub use relay::{Destination, Relay};
pub use scheduler::{Schedule, Scheduler};
