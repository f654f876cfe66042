//! Request dispatch: identity resolution plus routing to the engine.

use crate::hierarchy::domain::{HierarchyError, HierarchyResult, Placement};
use crate::hierarchy::ports::{
    ForestStore, IdentityError, OwnerDirectory, RequestContext, StoreError,
};
use crate::hierarchy::services::{HierarchyService, NewSubtaskParams, NewTaskParams};
use crate::transport::reply::{ErrorBody, HierarchyReply};
use crate::transport::request::{HierarchyRequest, PositionToken};
use mockable::Clock;
use std::sync::Arc;

/// Client-facing entry point for the hierarchy engine.
///
/// Resolves request credentials to an owning account, decodes wire-level
/// fields such as position tokens, and routes each request to the matching
/// engine operation.
#[derive(Clone)]
pub struct HierarchyApi<S, C, D>
where
    S: ForestStore,
    C: Clock + Send + Sync,
    D: OwnerDirectory,
{
    service: HierarchyService<S, C>,
    directory: Arc<D>,
}

impl<S, C, D> HierarchyApi<S, C, D>
where
    S: ForestStore,
    C: Clock + Send + Sync,
    D: OwnerDirectory,
{
    /// Creates an API over the given engine and identity directory.
    #[must_use]
    pub const fn new(service: HierarchyService<S, C>, directory: Arc<D>) -> Self {
        Self { service, directory }
    }

    /// Handles one request, returning the typed outcome.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Unauthorized`] for unknown credentials,
    /// [`HierarchyError::Validation`] for malformed position tokens, and
    /// whatever the routed operation surfaces.
    pub async fn handle(
        &self,
        context: &RequestContext,
        request: HierarchyRequest,
    ) -> HierarchyResult<HierarchyReply> {
        let owner = self
            .directory
            .resolve(context)
            .await
            .map_err(identity_error)?;
        match request {
            HierarchyRequest::CreateSpace { name, color } => self
                .service
                .create_space(owner, name, color)
                .await
                .map(HierarchyReply::Mutation),
            HierarchyRequest::CreateTask {
                space,
                name,
                description,
            } => {
                let mut params = NewTaskParams::new(space, name);
                if let Some(text) = description {
                    params = params.with_description(text);
                }
                self.service
                    .create_task(owner, params)
                    .await
                    .map(HierarchyReply::Mutation)
            }
            HierarchyRequest::CreateSubtask {
                parent,
                position,
                name,
                description,
            } => {
                let placement = parse_position(&position)?;
                let mut params = NewSubtaskParams::new(parent, placement, name);
                if let Some(text) = description {
                    params = params.with_description(text);
                }
                self.service
                    .create_subtask(owner, params)
                    .await
                    .map(HierarchyReply::Mutation)
            }
            HierarchyRequest::UpdateTask { task, patch } => self
                .service
                .update_task(owner, task, patch)
                .await
                .map(HierarchyReply::Mutation),
            HierarchyRequest::Reparent {
                task,
                new_parent,
                position,
                to_space,
            } => {
                let placement = parse_position(&position)?;
                self.service
                    .reparent(owner, task, new_parent, placement, to_space)
                    .await
                    .map(HierarchyReply::Mutation)
            }
            HierarchyRequest::Archive { task } => self
                .service
                .archive(owner, task)
                .await
                .map(HierarchyReply::Mutation),
            HierarchyRequest::Delete { task } => self
                .service
                .delete(owner, task)
                .await
                .map(HierarchyReply::Mutation),
            HierarchyRequest::Duplicate { roots } => self
                .service
                .duplicate(owner, roots)
                .await
                .map(HierarchyReply::Mutation),
            HierarchyRequest::ReorderTasks {
                space,
                task,
                position,
            } => {
                let placement = parse_position(&position)?;
                self.service
                    .reorder_tasks(owner, space, task, placement)
                    .await
                    .map(HierarchyReply::Mutation)
            }
            HierarchyRequest::ReorderSubtasks {
                parent,
                task,
                position,
            } => {
                let placement = parse_position(&position)?;
                self.service
                    .reorder_subtasks(owner, parent, task, placement)
                    .await
                    .map(HierarchyReply::Mutation)
            }
            HierarchyRequest::MoveTask {
                task,
                from_space,
                to_space,
                position,
            } => {
                let placement = parse_position(&position)?;
                self.service
                    .move_task(owner, task, from_space, to_space, placement)
                    .await
                    .map(HierarchyReply::Mutation)
            }
            HierarchyRequest::MoveSubtask {
                task,
                from_parent,
                to_parent,
                position,
            } => {
                let placement = parse_position(&position)?;
                self.service
                    .move_subtask(owner, task, from_parent, to_parent, placement)
                    .await
                    .map(HierarchyReply::Mutation)
            }
            HierarchyRequest::Snapshot => self
                .service
                .snapshot(owner)
                .await
                .map(HierarchyReply::Snapshot),
        }
    }

    /// Handles one request, serialising any failure for the wire.
    ///
    /// # Errors
    ///
    /// Returns the [`ErrorBody`] form of whatever [`handle`](Self::handle)
    /// surfaces.
    pub async fn dispatch(
        &self,
        context: &RequestContext,
        request: HierarchyRequest,
    ) -> Result<HierarchyReply, ErrorBody> {
        self.handle(context, request)
            .await
            .map_err(|err| ErrorBody::from(&err))
    }
}

fn parse_position(token: &PositionToken) -> HierarchyResult<Placement> {
    token
        .parse()
        .map_err(|err| HierarchyError::Validation(err.to_string()))
}

fn identity_error(err: IdentityError) -> HierarchyError {
    match err {
        IdentityError::UnknownCredentials => {
            HierarchyError::Unauthorized("unknown credentials".to_owned())
        }
        IdentityError::Backend(source) => HierarchyError::Store(StoreError::Persistence(source)),
    }
}
