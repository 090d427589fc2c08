pub mod layout;
pub mod pricing;
pub mod search;

pub use layout::{SeatLayoutService, SeatLayoutView};
pub use pricing::PricingEngine;
pub use search::ScheduleSearchService;
