//! Task domain for voice-captured tasks: the parsed-task model, the
//! spoken-command parser, and the store boundary the embedding shell
//! implements.

pub mod spoken;
pub mod task;

pub use spoken::parse_spoken_task;
pub use task::{ParsedTask, TaskStore};
