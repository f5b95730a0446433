//! REST endpoint handlers organized by resource.

pub mod providers;
pub mod status;
pub mod system;
pub mod tasks;
pub mod virtual_pool;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(tasks::routes())
        .merge(status::routes())
        .merge(virtual_pool::routes())
        .merge(providers::routes())
}
