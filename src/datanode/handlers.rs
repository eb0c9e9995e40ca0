use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;

use super::protocol::*;
use super::service::DataNode;
use crate::error::{DfsError, DfsResult};
use crate::metadata::types::BlockId;
use crate::transport::MessageResponse;

/// All storage-node routes, with `node` attached as an extension.
///
/// Blocks are far larger than axum's default body limit, so the limit is lifted.
pub fn router(node: Arc<DataNode>) -> Router {
    Router::new()
        .route("/", get(handle_health))
        .route("/block/:name/:block_id", post(handle_write_block))
        .route(
            "/block/:name/",
            get(handle_read_block).delete(handle_delete_block),
        )
        .route("/forward_block/:name/:block_id", post(handle_forward_block))
        .route("/copy_block_data/", post(handle_copy_block))
        .route("/variables/", get(handle_variables))
        .layer(DefaultBodyLimit::disable())
        .layer(Extension(node))
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> DfsResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| DfsError::Malformed(rejection.body_text()))
}

fn parse_block_id(raw: &str) -> DfsResult<BlockId> {
    raw.parse()
        .map_err(|_| DfsError::Malformed(format!("invalid block id {:?}", raw)))
}

pub async fn handle_health() -> &'static str {
    "True"
}

pub async fn handle_write_block(
    Extension(node): Extension<Arc<DataNode>>,
    Path((file_name, block_id)): Path<(String, String)>,
    payload: Result<Json<WriteBlockRequest>, JsonRejection>,
) -> DfsResult<(StatusCode, Json<MessageResponse>)> {
    let block = parse_block_id(&block_id)?;
    let req = parse_body(payload)?;

    let message = node
        .write_block(&file_name, block, req.block_body, &req.copy_node)
        .await?;
    Ok((StatusCode::OK, Json(MessageResponse::new(message))))
}

pub async fn handle_forward_block(
    Extension(node): Extension<Arc<DataNode>>,
    Path((file_name, block_id)): Path<(String, String)>,
    payload: Result<Json<ForwardBlockRequest>, JsonRejection>,
) -> DfsResult<(StatusCode, Json<MessageResponse>)> {
    let block = parse_block_id(&block_id)?;
    let req = parse_body(payload)?;

    let message = node.receive_forward(&file_name, block, req.block_body).await?;
    Ok((StatusCode::OK, Json(MessageResponse::new(message))))
}

pub async fn handle_read_block(
    Extension(node): Extension<Arc<DataNode>>,
    Path(block_id): Path<String>,
) -> DfsResult<(StatusCode, Json<ReadBlockResponse>)> {
    let block = parse_block_id(&block_id)?;
    let block_body = node.read_block(block).await?;
    Ok((StatusCode::OK, Json(ReadBlockResponse { block_body })))
}

pub async fn handle_delete_block(
    Extension(node): Extension<Arc<DataNode>>,
    Path(block_id): Path<String>,
) -> DfsResult<(StatusCode, Json<MessageResponse>)> {
    let block = parse_block_id(&block_id)?;
    let message = node.delete_block(block).await?;
    Ok((StatusCode::OK, Json(MessageResponse::new(message))))
}

pub async fn handle_copy_block(
    Extension(node): Extension<Arc<DataNode>>,
    payload: Result<Json<CopyBlockRequest>, JsonRejection>,
) -> DfsResult<(StatusCode, Json<MessageResponse>)> {
    let req = parse_body(payload)?;
    let message = node.copy_block(req.block_name, &req.copy_node).await?;
    Ok((StatusCode::OK, Json(MessageResponse::new(message))))
}

pub async fn handle_variables(
    Extension(node): Extension<Arc<DataNode>>,
) -> (StatusCode, Json<NodeVariablesResponse>) {
    (
        StatusCode::OK,
        Json(NodeVariablesResponse {
            id: node.id().clone(),
            blocks: node.inventory(),
        }),
    )
}
