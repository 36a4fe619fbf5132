//! Domain services: recording, assembly, attribution, and sync

pub mod attribution;
pub mod journey;
pub mod recorder;
pub mod sync;

pub use attribution::{AttributionModel, AttributionResult, CreditShare};
pub use journey::{Journey, JourneyAssembler, JourneyTouchpoint};
pub use recorder::TouchpointRecorder;
