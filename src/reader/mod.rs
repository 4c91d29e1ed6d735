//! View adapter and reader session on top of a container engine.

pub mod adapter;
pub mod input;
pub mod session;
pub mod theme;

pub use adapter::{AdapterState, PagePosition, ViewAdapter, ViewEvent};
pub use input::{InputAction, Key, Swipe};
pub use session::{ReaderContext, ReaderSession, ReaderSessionState};
pub use theme::ThemeId;
