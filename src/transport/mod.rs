//! Client transport boundary: wire requests, replies, and dispatch.
//!
//! The transport layer is deliberately thin. [`HierarchyRequest`] carries
//! one serde-tagged variant per engine operation, [`HierarchyReply`] returns
//! the committed changes or a snapshot, and failures cross the wire as
//! [`ErrorBody`] with a stable kind plus a human-readable message. Position
//! tokens (`start`, `end`, `after:<uuid>`) are decoded here, so the engine
//! only ever sees typed placements. [`HierarchyApi`] resolves request
//! credentials through the [`OwnerDirectory`](crate::hierarchy::ports::OwnerDirectory)
//! port and routes each request to the engine.

mod api;
mod reply;
mod request;

pub use api::HierarchyApi;
pub use reply::{ErrorBody, HierarchyReply};
pub use request::{HierarchyRequest, ParsePositionError, PositionToken};
