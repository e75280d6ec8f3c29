// src/transport/http.rs

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::json;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::archive;
use crate::config::ClientConfig;
use crate::errors::{ClientError, Result};
use crate::models::{
    BatchRun, BatchRunQuery, BatchRunSummary, BatchRuns, BatchTask, PreparedTask,
    ScreenshotOptions, TaskStatus, UploadedFile,
};
use crate::settings::ResolvedSettings;
use crate::transport::MagicPodApi;

/// Talks to `{url_base}/api/v1.0/{organization}/{project}/...`.
///
/// Built once per invocation and shared by every call.
pub struct HttpTransport {
    client: Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Creates a new `HttpTransport`.
    pub fn new(client: Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.url_base).map_err(|e| {
            ClientError::Config(format!("invalid url-base '{}': {}", self.config.url_base, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("invalid url-base '{}'", self.config.url_base)))?
            .pop_if_empty()
            .extend(["api", "v1.0", self.config.organization.as_str(), self.config.project.as_str()])
            .extend(segments)
            .push("");
        Ok(url)
    }

    /// Request carrying the token and the caller's extra headers.
    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.url(segments)?;
        log::debug!("{} {}", method, url);

        let mut builder = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, format!("Token {}", self.config.api_token));
        for (name, value) in &self.config.http_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        Ok(builder)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let resp = builder.send().await?;
        log::debug!("Response status: {}", resp.status());
        check_status(resp).await
    }

    /// Uploads an app/ipa/apk file, zipping `.app` bundle directories first.
    pub async fn upload_file(&self, app_path: &Path) -> Result<u64> {
        let source = {
            let app_path = app_path.to_path_buf();
            tokio::task::spawn_blocking(move || archive::upload_source(&app_path))
                .await
                .map_err(std::io::Error::other)??
        };

        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string());
        let bytes = tokio::fs::read(&source).await?;
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));

        let resp = self
            .send(self.request(Method::POST, &["upload-file"])?.multipart(form))
            .await?;
        let uploaded: UploadedFile = resp.json().await?;
        Ok(uploaded.file_no)
    }

    pub async fn delete_file(&self, app_file_number: u64) -> Result<()> {
        let body = json!({ "app_file_number": app_file_number });
        self.send(self.request(Method::DELETE, &["delete-file"])?.json(&body))
            .await?;
        Ok(())
    }
}

impl MagicPodApi for HttpTransport {
    async fn start_batch_run(&self, settings: &ResolvedSettings) -> Result<BatchRun> {
        let endpoint = settings.kind.endpoint().trim_end_matches('/');
        let builder = self
            .request(Method::POST, &[endpoint])?
            .header(CONTENT_TYPE, "application/json")
            .body(settings.body.clone());
        let resp = self.send(builder).await?;
        Ok(resp.json().await?)
    }

    async fn get_batch_run(&self, batch_run_number: u64) -> Result<BatchRun> {
        let number = batch_run_number.to_string();
        let resp = self
            .send(self.request(Method::GET, &["batch-run", number.as_str()])?)
            .await?;
        Ok(resp.json().await?)
    }

    async fn list_batch_runs(&self, query: &BatchRunQuery) -> Result<Vec<BatchRunSummary>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(count) = query.count {
            params.push(("count", count.to_string()));
        }
        if let Some(max) = query.max_batch_run_number {
            params.push(("max_batch_run_number", max.to_string()));
        }
        if let Some(min) = query.min_batch_run_number {
            params.push(("min_batch_run_number", min.to_string()));
        }

        let resp = self
            .send(self.request(Method::GET, &["batch-runs"])?.query(&params))
            .await?;
        let runs: BatchRuns = resp.json().await?;
        Ok(runs.batch_runs)
    }

    async fn prepare_screenshots(
        &self,
        batch_run_number: u64,
        options: &ScreenshotOptions,
    ) -> Result<u64> {
        let number = batch_run_number.to_string();
        let mask = if options.mask_dynamically_changed_area { "true" } else { "false" };
        let builder = self
            .request(Method::POST, &["batch-runs", number.as_str(), "screenshots"])?
            .query(&[
                ("file_index_type", options.file_index_type.as_str()),
                ("file_name_body_type", options.file_name_body_type.as_str()),
                ("download_type", options.download_type.as_str()),
                ("mask_dynamically_changed_area", mask),
            ]);
        let resp = self.send(builder).await?;
        let task: PreparedTask = resp.json().await?;
        Ok(task.batch_task_id)
    }

    async fn get_batch_task_status(&self, batch_task_id: u64) -> Result<TaskStatus> {
        let id = batch_task_id.to_string();
        let resp = self
            .send(self.request(Method::GET, &["batch-task", id.as_str()])?)
            .await?;
        let task: BatchTask = resp.json().await?;
        Ok(task.status)
    }

    async fn download_screenshots(&self, batch_task_id: u64, download_path: &Path) -> Result<()> {
        let id = batch_task_id.to_string();
        let resp = self
            .request(Method::GET, &["screenshots", id.as_str()])?
            .send()
            .await?;
        let status = resp.status();

        if let Err(e) = write_body(resp, download_path).await {
            let _ = tokio::fs::remove_file(download_path).await;
            return Err(e);
        }

        if status != StatusCode::OK {
            // The body written to disk is an error message, not an archive.
            let text = tokio::fs::read(download_path).await?;
            tokio::fs::remove_file(download_path).await?;
            return Err(ClientError::Api {
                status,
                body: String::from_utf8_lossy(&text).into_owned(),
            });
        }
        Ok(())
    }
}

/// Turns anything but 200 into `ClientError::Api` carrying the body verbatim.
async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status != StatusCode::OK {
        let body = resp
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error body".to_string());
        return Err(ClientError::Api { status, body });
    }
    Ok(resp)
}

async fn write_body(mut resp: Response, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(path).await?;
    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}
