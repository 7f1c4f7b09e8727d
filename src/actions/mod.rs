//! Actions module: the catalog and its dispatcher.

mod command;
mod handler;

pub use command::{ActionCommand, ActionName, UnknownActionName};
pub use handler::{
    ActionDispatcher, DispatchError, Dispatched, DEFAULT_FINISH_MESSAGE, DEFAULT_WAIT_SECS,
    MAX_WAIT_SECS, SCROLL_DURATION_MS,
};
