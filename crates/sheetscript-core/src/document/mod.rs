//! Document state and logic (UI-agnostic).

mod io;
mod ops;
mod state;

pub use io::history_path;
pub use state::Document;
