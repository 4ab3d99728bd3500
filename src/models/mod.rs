pub mod activity;
pub mod athlete;
pub mod gear;
pub mod location;
pub mod split;

pub use activity::ActivityRow;
pub use athlete::{Athlete, AthleteLookup, NewAthlete};
pub use gear::GearRow;
pub use location::{CoordKey, LocationRow};
pub use split::{KmSplitRow, MileSplitRow};
