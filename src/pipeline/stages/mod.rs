//! Built-in pipeline stages.

pub mod post_processor;
pub mod processor;
pub mod trigger;

pub use post_processor::{PostProcessorSettings, PostProcessorStage};
pub use processor::{ProcessorSettings, ProcessorStage};
pub use trigger::{TriggerEdge, TriggerSettings, TriggerStage};
