pub mod booking;
pub mod schema;
pub mod selection;

pub use booking::{BookingField, BookingRecord, ExtractionOutcome, ServiceType};
pub use schema::StructuredOutput;
pub use selection::{ProviderCandidate, SelectionOutcome};
