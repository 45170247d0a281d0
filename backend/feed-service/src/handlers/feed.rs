use actix_web::{get, web, HttpResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::FeedResult;
use crate::models::FeedIdsResponse;
use crate::services::FeedAggregator;

pub struct FeedHandlerState {
    pub aggregator: Arc<FeedAggregator>,
    pub request_timeout: Duration,
}

impl FeedHandlerState {
    pub fn new(aggregator: Arc<FeedAggregator>, request_timeout: Duration) -> Self {
        Self {
            aggregator,
            request_timeout,
        }
    }

    fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.request_timeout)
    }
}

// Each handler holds a drop guard on its context: if actix drops the handler
// future (client went away) the context fires and in-flight store calls stop.

#[get("/home/{user_id}")]
pub async fn get_home_feed(
    path: web::Path<u32>,
    state: web::Data<FeedHandlerState>,
) -> FeedResult<HttpResponse> {
    let user_id = path.into_inner();
    let ctx = state.request_context();
    let _cancel_guard = ctx.cancel_on_drop();

    debug!(user_id, "Getting home feed");
    let posts = state.aggregator.home(&ctx, user_id).await?;

    Ok(HttpResponse::Ok().json(FeedIdsResponse::new(user_id, &posts)))
}

#[get("/explore/{user_id}")]
pub async fn get_explore_feed(
    path: web::Path<u32>,
    state: web::Data<FeedHandlerState>,
) -> FeedResult<HttpResponse> {
    let user_id = path.into_inner();
    let ctx = state.request_context();
    let _cancel_guard = ctx.cancel_on_drop();

    debug!(user_id, "Getting explore feed");
    let posts = state.aggregator.explore(&ctx, user_id).await?;

    Ok(HttpResponse::Ok().json(FeedIdsResponse::new(user_id, &posts)))
}

#[get("/popular")]
pub async fn get_popular_feed(state: web::Data<FeedHandlerState>) -> FeedResult<HttpResponse> {
    let ctx = state.request_context();
    let _cancel_guard = ctx.cancel_on_drop();

    let posts = state.aggregator.popular(&ctx).await?;

    Ok(HttpResponse::Ok().json(FeedIdsResponse::global(&posts)))
}

#[get("/random")]
pub async fn get_random_feed(state: web::Data<FeedHandlerState>) -> FeedResult<HttpResponse> {
    let ctx = state.request_context();
    let _cancel_guard = ctx.cancel_on_drop();

    let posts = state.aggregator.random(&ctx).await?;

    Ok(HttpResponse::Ok().json(FeedIdsResponse::global(&posts)))
}

/// Register the feed routes under `/feed`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/feed")
            .service(get_home_feed)
            .service(get_explore_feed)
            .service(get_popular_feed)
            .service(get_random_feed),
    );
}
