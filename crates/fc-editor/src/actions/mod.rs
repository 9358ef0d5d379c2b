//! One struct per edit. Constructors do all the reading and ID
//! allocation; the [`Command`](crate::commands::Command) impls only
//! replay store actions.

mod attach;
mod comments;
mod delete;
mod expand;
mod layout;
mod links;
mod navigation;
mod nodes;
mod paste;
mod supernode;

pub use attach::{AttachNodeToLinks, CreateNodeAttachLinks, CreateNodeOnLink};
pub use comments::{CreateComment, EditComment};
pub use delete::DeleteObjects;
pub use expand::{CollapseSuperNodeInPlace, ExpandSuperNodeInPlace};
pub use layout::ArrangeLayout;
pub use links::{CreateCommentLinks, CreateNodeLinks, DeleteLink, DisconnectNodes, UpdateLink};
pub use navigation::{DisplayPreviousPipeline, DisplaySubPipeline};
pub use nodes::{
    CreateAutoNode, CreateNode, MoveObjects, SetLinksStyle, SetNodeLabel, SetNodeParameters,
    SetObjectsStyle, SizeAndPositionObjects,
};
pub use paste::Paste;
pub use supernode::{CreateSuperNode, DeconstructSuperNode};
