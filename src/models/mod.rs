//! Core data models for the leaderboard engine.

mod game_id;
mod kill_event;
mod map_result;
mod table;
mod value;

pub use game_id::*;
pub use kill_event::*;
pub use map_result::*;
pub use table::*;
pub use value::*;
