//! Terminal front end for the blue-dollar rate.
//!
//! The UI owns an explicit [`SessionContext`] (amount, chart mode, source)
//! and hands a copy to each interaction. An interaction runs on a background
//! task: the quote first, then the one-year chart, each reported back to the
//! event loop as soon as it completes.

mod command;
mod feeders;
mod raster;
pub mod report;
pub mod session;
mod styles;
mod transcript;
mod tui;
mod view;

pub use command::parse_amount;
pub use session::{InteractionReport, RateView, Session, SessionContext};
pub use tui::{TuiApp, TuiMsg};
