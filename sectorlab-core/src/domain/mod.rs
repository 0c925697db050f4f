//! Domain types shared across the data layer, analytics, and engine.

pub mod event;
pub mod membership;
pub mod price;
pub mod returns;

pub use event::{Event, EventResult, PathPoint};
pub use membership::{IndustryInfo, IndustryMembership, MembershipRow};
pub use price::{PricePanel, PriceRow};
pub use returns::{ReturnObs, ReturnSeries};
