//! Client REST BigQuery : jobs de chargement multipart et requêtes SQL

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use reqwest::{header, Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::auth::{OAuthProvider, ServiceAccountKey, TokenCache, BIGQUERY_SCOPE};
use super::{Warehouse, WarehouseError};
use crate::config::{TableRef, WriteMode};
use crate::table::Dataset;

/// Point d'entrée public de l'API
pub const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com";

/// Attente entre deux interrogations d'un job
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Attente côté serveur pour `jobs.query` / `getQueryResults`
const QUERY_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    job_reference: JobReference,
    status: JobStatus,
    #[serde(default)]
    statistics: Option<JobStatistics>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    #[serde(default)]
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorProto {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorProto {
    fn describe(&self) -> String {
        match (&self.reason, &self.message) {
            (Some(reason), Some(message)) => format!("{}: {}", reason, message),
            (None, Some(message)) => message.clone(),
            (Some(reason), None) => reason.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatistics {
    #[serde(default)]
    load: Option<LoadStatistics>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatistics {
    #[serde(default)]
    output_rows: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_reference: Option<JobReference>,
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    num_dml_affected_rows: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

/// Client BigQuery authentifié par compte de service
#[derive(Debug)]
pub struct BigQueryClient {
    client: Client,
    base_url: String,
    project_id: String,

    oauth_provider: Option<OAuthProvider>,
    token_cache: TokenCache,
}

impl std::fmt::Display for BigQueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BigQuery({})", self.project_id)
    }
}

impl BigQueryClient {
    /// Client exécutant ses jobs dans `project_id`
    pub fn new(key: &ServiceAccountKey, project_id: impl Into<String>) -> Result<Self, WarehouseError> {
        Ok(Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: project_id.into(),
            oauth_provider: Some(OAuthProvider::new(key, BIGQUERY_SCOPE)?),
            token_cache: TokenCache::default(),
        })
    }

    /// Client depuis un fichier de clé ; le projet par défaut est celui de la clé
    pub fn from_credentials_file(
        path: &Path,
        project_id: Option<&str>,
    ) -> Result<Self, WarehouseError> {
        let key = ServiceAccountKey::from_file(path)?;
        let project = project_id
            .map(str::to_string)
            .or_else(|| key.project_id.clone())
            .ok_or_else(|| {
                WarehouseError::Credentials(format!(
                    "no project_id in {} and none configured",
                    path.display()
                ))
            })?;
        Self::new(&key, project)
    }

    /// Client sans authentification (émulateur local)
    pub fn anonymous(project_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            project_id: project_id.into(),
            oauth_provider: None,
            token_cache: TokenCache::default(),
        }
    }

    /// Remplace l'URL de base de l'API
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn get_token(&self) -> Result<Option<String>, WarehouseError> {
        match &self.oauth_provider {
            Some(provider) => Ok(Some(
                self.token_cache
                    .get_or_insert_with(|| provider.fetch_token(&self.client))
                    .await?,
            )),
            None => Ok(None),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder, token: Option<String>) -> reqwest::RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn jobs_url(&self) -> String {
        format!("{}/bigquery/v2/projects/{}/jobs", self.base_url, self.project_id)
    }

    /// Crée un job de chargement <https://cloud.google.com/bigquery/docs/reference/rest/v2/jobs/insert>
    async fn insert_load_job(
        &self,
        table: &TableRef,
        dataset: &Dataset,
        mode: WriteMode,
    ) -> Result<Job, WarehouseError> {
        let token = self.get_token().await?;
        let url = format!(
            "{}/upload/bigquery/v2/projects/{}/jobs",
            self.base_url, self.project_id
        );

        let metadata = serde_json::to_vec(&load_job_configuration(table, dataset, mode))?;
        let data = dataset.to_ndjson()?;
        let boundary = multipart_boundary();
        let body = multipart_body(&boundary, &metadata, &data);

        debug!(
            table = %table,
            rows = dataset.len(),
            bytes = body.len(),
            "Inserting load job"
        );

        let response = self
            .authorize(self.client.post(url), token)
            .query(&[("uploadType", "multipart")])
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .header(header::CONTENT_LENGTH, body.len())
            .body(body)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    /// <https://cloud.google.com/bigquery/docs/reference/rest/v2/jobs/get>
    async fn get_job(&self, reference: &JobReference) -> Result<Job, WarehouseError> {
        let token = self.get_token().await?;
        let url = format!("{}/{}", self.jobs_url(), reference.job_id);
        let mut request = self.authorize(self.client.get(url), token);
        if let Some(location) = &reference.location {
            request = request.query(&[("location", location)]);
        }

        Ok(check_status(request.send().await?).await?.json().await?)
    }

    /// Interroge un job jusqu'à l'état `DONE` ; `status.errorResult` fait échouer
    async fn wait_for_job(&self, mut job: Job) -> Result<Job, WarehouseError> {
        while job.status.state != "DONE" {
            tokio::time::sleep(POLL_INTERVAL).await;
            job = self.get_job(&job.job_reference).await?;
            debug!(job_id = %job.job_reference.job_id, state = %job.status.state, "Polled job");
        }

        if let Some(error) = &job.status.error_result {
            return Err(WarehouseError::Job {
                job_id: job.job_reference.job_id.clone(),
                message: error.describe(),
            });
        }

        Ok(job)
    }

    /// Attend la fin d'une requête <https://cloud.google.com/bigquery/docs/reference/rest/v2/jobs/getQueryResults>
    async fn wait_for_query(&self, mut response: QueryResponse) -> Result<QueryResponse, WarehouseError> {
        while !response.job_complete {
            let Some(reference) = response.job_reference.clone() else {
                return Err(WarehouseError::Api {
                    status: 200,
                    message: "incomplete query without job reference".to_string(),
                });
            };

            let token = self.get_token().await?;
            let url = format!(
                "{}/bigquery/v2/projects/{}/queries/{}",
                self.base_url, self.project_id, reference.job_id
            );
            let mut request = self
                .authorize(self.client.get(url), token)
                .query(&[("timeoutMs", QUERY_TIMEOUT_MS.to_string())]);
            if let Some(location) = &reference.location {
                request = request.query(&[("location", location)]);
            }

            response = check_status(request.send().await?).await?.json().await?;
            debug!(job_id = %reference.job_id, complete = response.job_complete, "Polled query");
        }

        // `errors` peut ne contenir que des avertissements : seul l'état du job fait foi
        for error in &response.errors {
            warn!(message = %error.describe(), "Query reported an error entry");
        }

        match &response.job_reference {
            Some(reference) => {
                let job = self.get_job(reference).await?;
                self.wait_for_job(job).await?;
            }
            None => {
                if let Some(error) = response.errors.first() {
                    return Err(WarehouseError::Job {
                        job_id: String::new(),
                        message: error.describe(),
                    });
                }
            }
        }

        Ok(response)
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    async fn write_table(
        &self,
        table: &TableRef,
        dataset: &Dataset,
        mode: WriteMode,
    ) -> Result<u64, WarehouseError> {
        let job = self.insert_load_job(table, dataset, mode).await?;
        info!(
            job_id = %job.job_reference.job_id,
            table = %table,
            mode = %mode,
            "Load job submitted"
        );

        let job = self.wait_for_job(job).await?;
        let rows = job
            .statistics
            .and_then(|s| s.load)
            .and_then(|l| l.output_rows)
            .and_then(|r| r.parse().ok())
            .unwrap_or(dataset.len() as u64);

        info!(table = %table, rows, "Load job done");
        Ok(rows)
    }

    /// <https://cloud.google.com/bigquery/docs/reference/rest/v2/jobs/query>
    async fn execute(&self, sql: &str) -> Result<Option<u64>, WarehouseError> {
        let token = self.get_token().await?;
        let url = format!("{}/bigquery/v2/projects/{}/queries", self.base_url, self.project_id);

        debug!(sql = %sql.trim(), "Running query");

        let body = json!({
            "query": sql,
            "useLegacySql": false,
            "timeoutMs": QUERY_TIMEOUT_MS,
        });
        let response = self
            .authorize(self.client.post(url), token)
            .json(&body)
            .send()
            .await?;

        let response: QueryResponse = check_status(response).await?.json().await?;
        let response = self.wait_for_query(response).await?;

        Ok(response
            .num_dml_affected_rows
            .and_then(|n| n.parse().ok()))
    }
}

/// Configuration d'un job de chargement NDJSON avec schéma explicite
fn load_job_configuration(table: &TableRef, dataset: &Dataset, mode: WriteMode) -> Value {
    json!({
        "configuration": {
            "load": {
                "destinationTable": {
                    "projectId": table.project,
                    "datasetId": table.dataset,
                    "tableId": table.table,
                },
                "sourceFormat": "NEWLINE_DELIMITED_JSON",
                "schema": { "fields": dataset.infer_schema() },
                "createDisposition": "CREATE_IF_NEEDED",
                "writeDisposition": mode.write_disposition(),
            }
        }
    })
}

fn multipart_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("geo2bq_{:x}", nanos)
}

/// Corps `multipart/related` : métadonnées JSON puis données
fn multipart_body(boundary: &str, metadata: &[u8], data: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(metadata.len() + data.len() + 4 * boundary.len() + 128);

    body.put_slice(format!("--{}\r\n", boundary).as_bytes());
    body.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.put_slice(metadata);
    body.put_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.put_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.put_slice(data);
    body.put_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    body.freeze()
}

/// Transforme une réponse HTTP en erreur API si son statut n'est pas un succès
async fn check_status(response: Response) -> Result<Response, WarehouseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    Err(WarehouseError::Api {
        status: status.as_u16(),
        message: api_error_message(&text),
    })
}

/// Message d'un corps d'erreur `{"error": {"message": ...}}`, ou le texte brut
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
