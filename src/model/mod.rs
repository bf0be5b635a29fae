pub mod esports;
pub mod event;
pub mod football;
pub mod key;
pub mod market_name;
pub mod outcome;

pub use esports::{EsportsMatch, EsportsOutcomeType, Market as EsportsMarket, EsportsMarketType};
pub use event::{Event, EventType};
pub use football::Match;
pub use key::canonical_key;
pub use outcome::{Outcome, OutcomeType};
