// HTTP request handlers for the crawl trigger

use crate::api::models::*;
use crate::api::server::AppState;
use crate::models::{ProgressState, RunReport};
use actix_web::{web, HttpRequest, HttpResponse, Result};

/// Health check endpoint
pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse> {
    let db_status = match &state.db {
        Some(db) => {
            if db.ping().await {
                "connected"
            } else {
                "disconnected"
            }
        }
        None => "not configured",
    };

    let response = ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: db_status.to_string(),
        crawl_running: state.run_lock.try_lock().is_err(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    });

    Ok(HttpResponse::Ok().json(response))
}

/// Run one engine invocation and return its report
pub async fn run_crawl(state: web::Data<AppState>) -> Result<HttpResponse> {
    let Ok(_guard) = state.run_lock.try_lock() else {
        tracing::warn!("crawl trigger rejected: a run is already in progress");
        return Ok(HttpResponse::Conflict()
            .json(ApiResponse::<RunReport>::error("a crawl run is already in progress")));
    };

    tracing::info!("crawl triggered");
    match state.engine.run().await {
        Ok(report) => Ok(HttpResponse::Ok().json(ApiResponse::success(report))),
        Err(e) => {
            tracing::error!(error = %e, "crawl run failed");
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<RunReport>::error(e.to_string())))
        }
    }
}

/// Current crawl progress
pub async fn crawl_status(state: web::Data<AppState>) -> Result<HttpResponse> {
    match state.engine.progress().read().await {
        Ok(progress) => Ok(HttpResponse::Ok().json(ApiResponse::success(progress))),
        Err(e) => {
            tracing::error!(error = %e, "failed to read crawl progress");
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<ProgressState>::error(e.to_string())))
        }
    }
}

/// Anything but GET on the crawl resources
pub async fn method_not_allowed(req: HttpRequest) -> HttpResponse {
    tracing::warn!(method = %req.method(), path = %req.path(), "rejected non-GET trigger");
    HttpResponse::MethodNotAllowed()
        .insert_header(("Allow", "GET"))
        .json(ApiResponse::<()>::error(format!(
            "{} is not allowed; use GET",
            req.method()
        )))
}
