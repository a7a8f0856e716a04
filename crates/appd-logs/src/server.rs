//! HTTP surface: the upload form and the download endpoint.
//!
//! - `GET /` - the kubeconfig / namespace / pods form
//! - `POST /download` - collects the logs and answers with the zip archive

use std::time::Instant;

use appd_logs_collector::{CollectionRequest, LogCollector, parse_pod_list};
use axum::{
    Form, Router,
    body::Body,
    extract::{DefaultBodyLimit, State, rejection::FormRejection},
    http::{HeaderName, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use futures::StreamExt;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::constants::MISSING_LOGS_HEADER;
use crate::error::ApiError;

const INDEX_HTML: &str = include_str!("../assets/index.html");

#[derive(Clone)]
pub struct AppState {
    pub collector: LogCollector,
}

#[derive(Deserialize, Debug)]
pub struct DownloadForm {
    pub kubeconfig: String,
    pub namespace: String,
    pub pods: String,
}

pub fn router(state: AppState, max_form_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/download", post(download))
        .layer(DefaultBodyLimit::max(max_form_bytes))
        .with_state(state)
}

pub async fn serve(config: &Config, state: AppState) -> Result<()> {
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, router(state, config.max_form_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("server error")?;

    tracing::info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received.");
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn download(
    State(state): State<AppState>,
    form: Result<Form<DownloadForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let Form(form) = form?;
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("download", %request_id, namespace = %form.namespace);

    async move {
        let started = Instant::now();
        let request = CollectionRequest {
            credentials: form.kubeconfig,
            namespace: form.namespace.trim().to_owned(),
            pods: parse_pod_list(&form.pods),
        };

        let archive = state.collector.collect(request).await?;
        let missing = archive.missing_logs();
        tracing::info!(
            "Serving {} to client ({} pod(s) without logs, {} bytes, {} ms)",
            archive.file_name,
            missing,
            archive.size,
            started.elapsed().as_millis()
        );

        let file = archive.open().await?;
        let disposition = format!("attachment; filename=\"{}\"", archive.file_name);
        let length = archive.size.to_string();

        // The download is deleted once the body is finished or dropped.
        let download = archive.into_temp_path();
        let body = Body::from_stream(ReaderStream::new(file).map(move |chunk| {
            let _download = &download;
            chunk
        }));

        Ok::<_, ApiError>((
            [
                (header::CONTENT_TYPE, "application/zip".to_owned()),
                (header::CONTENT_DISPOSITION, disposition),
                (header::CONTENT_LENGTH, length),
                (HeaderName::from_static(MISSING_LOGS_HEADER), missing.to_string()),
            ],
            body,
        )
            .into_response())
    }
    .instrument(span)
    .await
}
