pub mod net;
pub mod pipeline;
pub mod render;
pub mod util;

pub use pipeline::{Pipeline, QuerySink, Status};
