//! Event broadcasting

mod fanout;

pub use fanout::{Fanout, PREVIEW_CHARS};
