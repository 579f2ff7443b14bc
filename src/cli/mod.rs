//! Terminal front-end: setup, dispatch and reporting commands.

pub mod dispatch;
pub mod monthly;
pub mod pending;
pub mod setup;
pub mod ui;
