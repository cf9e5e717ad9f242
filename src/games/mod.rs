pub mod five_d;
pub mod k3;
pub mod rules;
pub mod space;
pub mod types;
pub mod wingo;

pub use rules::{GameRules, RulesRegistry};
pub use space::{CombinationSpace, SpaceRegistry, DEFAULT_LARGE_SPACE_THRESHOLD};
pub use types::*;
