mod view_manager;
mod view_set;

pub use view_manager::{recompute, ViewQuery, ViewSink, ViewStagger};
pub use view_set::ViewSet;
