//! Embassy tasks

mod bridge;
mod pipeline;
mod shutdown;

pub use bridge::{bridge_task, reply_timeout_ms};
pub use pipeline::pipeline_task;
pub use shutdown::shutdown_button_task;
