/// API routes and handlers
pub mod admin;
pub mod appeals;
pub mod content;
pub mod graph;
pub mod middleware;
pub mod posts;
pub mod users;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(users::routes())
        .merge(content::routes())
        .merge(posts::routes())
        .merge(graph::routes())
        .merge(appeals::routes())
        .merge(admin::routes())
}
