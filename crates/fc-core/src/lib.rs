pub mod config;
pub mod error;
pub mod flow;
pub mod id;
pub mod layout;
pub mod model;
pub mod object_model;
pub mod palette;
pub mod pipeline;
pub mod store;

pub use config::{AutoLayoutConfig, CanvasConfig, LayoutDirection, NodeLayoutConfig};
pub use error::FlowError;
pub use flow::{PipelineFlow, emit_pipeline_flow, parse_pipeline_flow};
pub use id::{IdGenerator, IdKind, ObjectId, SequentialIdGenerator, UuidIdGenerator};
pub use layout::{LayoutResult, auto_layout};
pub use model::*;
pub use object_model::{CopiedObjects, ObjectModel, SelectionChange, SelectionHandler};
pub use palette::{Palette, PaletteCategory};
pub use pipeline::ApiPipeline;
pub use store::{
    Action, CanvasInfo, ExpandDisplacement, LinkEndPositions, SelectionInfo, Store, SupernodeRestructure,
};
