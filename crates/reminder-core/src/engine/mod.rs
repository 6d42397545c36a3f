mod dedup;
mod presenter;

pub use dedup::{DedupEngine, IngestReport, Selection};
pub use presenter::{Presenter, PresenterState};
