//! Task route handlers

use crate::error::{not_found_error, ApiResult};
use crate::models::{SuccessResponse, TaskInfo, TaskQuery};
use crate::report::render::html_page;
use crate::report::{parse_days_back, Cutoff, TASK_SLUG, TASK_TITLE};
use crate::state::SharedState;
use crate::store::ChangeStore;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    Json,
};
use tracing::{error, info};

/// List the tasks this server can run
pub async fn list_tasks() -> Json<SuccessResponse<Vec<TaskInfo>>> {
    Json(SuccessResponse::with_data(
        "Available tasks",
        vec![TaskInfo::changed_data_objects()],
    ))
}

/// Run a task and render its report as HTML.
///
/// A pass that fails part-way still returns the lines it produced, followed
/// by the error, with the error's status code.
pub async fn run_task<S>(
    State(state): State<SharedState<S>>,
    Path(slug): Path<String>,
    Query(query): Query<TaskQuery>,
) -> ApiResult<(StatusCode, Html<String>)>
where
    S: ChangeStore + Send + Sync + 'static,
{
    if slug != TASK_SLUG {
        return Err(not_found_error(format!("No task named '{}'", slug)));
    }

    let days_back = parse_days_back(query.days_back.as_deref(), state.default_days_back);
    let cutoff = Cutoff::resolve(days_back);

    let mut events = Vec::new();
    let (status, failure) = match state.reporter.run(&cutoff, &mut events).await {
        Ok(summary) => {
            info!(
                "Task {} finished: {} records, {} raw rows",
                TASK_SLUG, summary.changed_records, summary.changed_rows
            );
            (StatusCode::OK, None)
        }
        Err(e) => {
            error!("Task {} failed: {}", TASK_SLUG, e);
            (e.status().0, Some(e.to_string()))
        }
    };

    Ok((
        status,
        Html(html_page(TASK_TITLE, days_back, &events, failure.as_deref())),
    ))
}
