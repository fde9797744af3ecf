//! Journal chain walking: replay from genesis and chained writes.

mod replay;
mod writer;

pub use replay::{replay, replay_step, Replay};
pub use writer::JournalWriter;
