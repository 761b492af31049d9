use crate::error::FailureKind;
use crate::models::{export_errors_csv, ImportReport};
use crate::service::PayoutImportService;
use axum::{
    extract::{Json, Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 查询参数: format=csv 时返回错误清单
#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    pub format: Option<String>,
}

/// 请求失败时的响应体
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

/// 上传表单: shop_id 文本字段 + file 文件字段
#[derive(Debug, Default)]
struct Upload {
    shop_id: String,
    file: Vec<u8>,
}

fn bad_request(message: impl Into<String>) -> Response {
    let response = ErrorResponse {
        success: false,
        message: message.into(),
    };
    (StatusCode::BAD_REQUEST, Json(response)).into_response()
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, Response> {
    let mut upload = Upload::default();
    let mut has_file = false;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(bad_request(format!("invalid multipart body: {}", e))),
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("shop_id") => {
                upload.shop_id = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid shop_id field: {}", e)))?;
            }
            Some("file") => {
                upload.file = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("invalid file field: {}", e)))?
                    .to_vec();
                has_file = true;
            }
            _ => {}
        }
    }

    if !has_file {
        return Err(bad_request("missing file field"));
    }
    Ok(upload)
}

/// 报告对应的 HTTP 状态码
pub fn report_status(report: &ImportReport) -> StatusCode {
    match report.failure {
        None => StatusCode::OK,
        Some(FailureKind::Conflict) => StatusCode::CONFLICT,
        Some(FailureKind::Structural) | Some(FailureKind::InvalidInput) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        Some(FailureKind::Store) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 结算单导入
pub async fn import_payout(
    State(service): State<Arc<PayoutImportService>>,
    Query(query): Query<ImportQuery>,
    multipart: Multipart,
) -> Response {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(response) => return response,
    };

    let report = service.import(&upload.file, &upload.shop_id).await;
    let status = report_status(&report);

    if query.format.as_deref() == Some("csv") {
        let mut buf = Vec::new();
        if let Err(e) = export_errors_csv(&report, &mut buf) {
            tracing::error!("导出错误清单失败: {}", e);
            let response = ErrorResponse {
                success: false,
                message: format!("Error: {}", e),
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response();
        }
        return (status, [(header::CONTENT_TYPE, "text/csv; charset=utf-8")], buf).into_response();
    }

    (status, Json(report)).into_response()
}

/// 导入预览 (不写库)
pub async fn preview_payout(
    State(service): State<Arc<PayoutImportService>>,
    multipart: Multipart,
) -> Response {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(response) => return response,
    };

    match service.preview(&upload.file, &upload.shop_id) {
        Ok(preview) => (StatusCode::OK, Json(preview)).into_response(),
        Err(e) => {
            let report = ImportReport::aborted(e.kind(), 0, e.to_string());
            (report_status(&report), Json(report)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_failure_kind() {
        assert_eq!(report_status(&ImportReport::default()), StatusCode::OK);
        let conflict = ImportReport::aborted(FailureKind::Conflict, 3, "order X exists under a different shop");
        assert_eq!(report_status(&conflict), StatusCode::CONFLICT);
        let structural = ImportReport::aborted(FailureKind::Structural, 0, "header not found");
        assert_eq!(report_status(&structural), StatusCode::UNPROCESSABLE_ENTITY);
        let store = ImportReport::aborted(FailureKind::Store, 3, "store error");
        assert_eq!(report_status(&store), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
