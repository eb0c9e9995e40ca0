use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use std::sync::Arc;

use super::protocol::*;
use super::service::NameNode;
use crate::error::{DfsError, DfsResult};
use crate::transport::MessageResponse;

/// All coordinator routes, with `namenode` attached as an extension.
pub fn router(namenode: Arc<NameNode>) -> Router {
    Router::new()
        .route("/", get(handle_health))
        .route("/heartbeat/", put(handle_heartbeat))
        .route("/block_report/", put(handle_block_report))
        .route("/file/", post(handle_plan_write))
        .route(
            "/file/:directory/:file_name",
            get(handle_plan_read).delete(handle_plan_delete),
        )
        .route(
            "/directories/",
            post(handle_list_directory).delete(handle_delete_directory),
        )
        .route("/directories/sub_dir/", delete(handle_delete_subdirectory))
        .route("/directories/sub/:parent/:name/", get(handle_create_subdirectory))
        .route("/directories/:path/", get(handle_create_directory))
        .route("/variables/", get(handle_variables))
        .layer(Extension(namenode))
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> DfsResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| DfsError::Malformed(rejection.body_text()))
}

fn ok<T>(body: T) -> DfsResult<(StatusCode, Json<T>)> {
    Ok((StatusCode::OK, Json(body)))
}

pub async fn handle_health() -> &'static str {
    "True"
}

pub async fn handle_heartbeat(
    Extension(namenode): Extension<Arc<NameNode>>,
    payload: Result<Json<HeartbeatRequest>, JsonRejection>,
) -> DfsResult<(StatusCode, Json<MessageResponse>)> {
    let req = parse_body(payload)?;
    let message = namenode.receive_heartbeat(&req.id)?;
    ok(MessageResponse::new(message))
}

pub async fn handle_block_report(
    Extension(namenode): Extension<Arc<NameNode>>,
    payload: Result<Json<BlockReportRequest>, JsonRejection>,
) -> DfsResult<(StatusCode, Json<MessageResponse>)> {
    let req = parse_body(payload)?;
    let message = namenode.receive_block_report(&req.id, req.block_data)?;
    ok(MessageResponse::new(message))
}

pub async fn handle_plan_write(
    Extension(namenode): Extension<Arc<NameNode>>,
    payload: Result<Json<WriteFileRequest>, JsonRejection>,
) -> DfsResult<(StatusCode, Json<WritePlanResponse>)> {
    let req = parse_body(payload)?;
    let plan = namenode.plan_write(&req.file_name, &req.directory, req.size)?;
    ok(WritePlanResponse {
        block_count: plan.block_count,
        block_size: plan.block_size,
        blocks_and_dns: plan.blocks,
    })
}

pub async fn handle_plan_read(
    Extension(namenode): Extension<Arc<NameNode>>,
    Path((directory, file_name)): Path<(String, String)>,
) -> DfsResult<(StatusCode, Json<ReadPlanResponse>)> {
    let blocks = namenode.plan_read(&file_name, &directory)?;
    ok(ReadPlanResponse { message: blocks })
}

pub async fn handle_plan_delete(
    Extension(namenode): Extension<Arc<NameNode>>,
    Path((directory, file_name)): Path<(String, String)>,
) -> DfsResult<(StatusCode, Json<DeletePlanResponse>)> {
    let blocks = namenode.plan_delete(&file_name, &directory)?;
    ok(DeletePlanResponse {
        blocks_and_dns: blocks,
    })
}

pub async fn handle_create_directory(
    Extension(namenode): Extension<Arc<NameNode>>,
    Path(path): Path<String>,
) -> DfsResult<(StatusCode, Json<MessageResponse>)> {
    let message = namenode.create_directory(&path)?;
    ok(MessageResponse::new(message))
}

pub async fn handle_create_subdirectory(
    Extension(namenode): Extension<Arc<NameNode>>,
    Path((parent, name)): Path<(String, String)>,
) -> DfsResult<(StatusCode, Json<MessageResponse>)> {
    let message = namenode.create_subdirectory(&parent, &name)?;
    ok(MessageResponse::new(message))
}

pub async fn handle_delete_directory(
    Extension(namenode): Extension<Arc<NameNode>>,
    payload: Result<Json<DirectoryRequest>, JsonRejection>,
) -> DfsResult<(StatusCode, Json<MessageResponse>)> {
    let req = parse_body(payload)?;
    let message = namenode.delete_directory(&req.directory)?;
    ok(MessageResponse::new(message))
}

pub async fn handle_delete_subdirectory(
    Extension(namenode): Extension<Arc<NameNode>>,
    payload: Result<Json<DeleteSubdirectoryRequest>, JsonRejection>,
) -> DfsResult<(StatusCode, Json<MessageResponse>)> {
    let req = parse_body(payload)?;
    let message = namenode.delete_subdirectory(&req.parent, &req.sub_directory)?;
    ok(MessageResponse::new(message))
}

pub async fn handle_list_directory(
    Extension(namenode): Extension<Arc<NameNode>>,
    payload: Result<Json<DirectoryRequest>, JsonRejection>,
) -> DfsResult<(StatusCode, Json<MessageResponse>)> {
    let req = parse_body(payload)?;
    let listing = namenode.list_directory(&req.directory)?;
    ok(MessageResponse::new(listing))
}

pub async fn handle_variables(
    Extension(namenode): Extension<Arc<NameNode>>,
) -> DfsResult<(StatusCode, Json<VariablesResponse>)> {
    ok(namenode.variables()?)
}
