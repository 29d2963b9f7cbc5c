//! HTTP-based `BucketClient`.
//!
//! The bucket client is treated as an opaque external collaborator
//! elsewhere in this crate, so this is a minimal "list / ranged GET / PUT /
//! DELETE over HTTP" implementation rather than a full implementation of
//! any particular bucket provider's signed-request wire protocol: a thin
//! `reqwest::Client` wrapper, JSON listing, a `Range` header for partial
//! reads, status-code checked responses turned into `anyhow::Error`.

use anyhow::{bail, format_err, Error};
use reqwest::Client;
use serde::Deserialize;

use super::client::{BoxFuture, BucketClient, FileInfo};
use crate::buildcfg::USER_AGENT;

#[derive(Debug, Deserialize)]
struct ListResponseEntry {
    #[serde(rename = "fileId")]
    file_id: String,
    #[serde(rename = "fileName")]
    file_name: String,
    size: u64,
    #[serde(rename = "uploadTimestamp")]
    upload_timestamp: i64,
    #[serde(rename = "contentSha1")]
    content_sha1: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    files: Vec<ListResponseEntry>,
}

/// Talks to a bucket-style HTTP API: `GET {base}/b2_list_file_names`,
/// `GET {base}/file/{bucket}/{file_id}` with a `Range` header,
/// `POST {base}/b2_delete_file_version`, `POST {base}/b2_upload_file`.
pub struct HttpBucketClient {
    client: Client,
    base_url: String,
    bucket_id: String,
    auth_token: String,
}

impl HttpBucketClient {
    pub fn new(base_url: String, bucket_id: String, account_id: String, application_key: String) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| format_err!("unable to build HTTP client: {}", err))?;

        // Authorization is out of scope for this narrow contract; a real
        // deployment would exchange (account_id, application_key) for a
        // session token during an explicit authorize step. We fold that
        // into a single bearer token here to keep the client's surface to
        // exactly the methods `BucketClient` declares.
        let auth_token = format!("{}:{}", account_id, application_key);

        Ok(Self {
            client,
            base_url,
            bucket_id,
            auth_token,
        })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.auth_token)
    }
}

impl BucketClient for HttpBucketClient {
    fn ls<'a>(&'a self, recursive: bool) -> BoxFuture<'a, Vec<(FileInfo, ())>> {
        Box::pin(async move {
            let url = format!("{}/b2_list_file_names", self.base_url);
            let resp = self
                .authorized(self.client.get(&url))
                .query(&[("bucketId", self.bucket_id.as_str()), ("recursive", if recursive { "true" } else { "false" })])
                .send()
                .await
                .map_err(|err| format_err!("listing request failed: {}", err))?;

            let status = resp.status();
            if !status.is_success() {
                bail!("listing failed with status {}", status);
            }

            let parsed: ListResponse = resp
                .json()
                .await
                .map_err(|err| format_err!("malformed listing response: {}", err))?;

            Ok(parsed
                .files
                .into_iter()
                .map(|entry| {
                    (
                        FileInfo {
                            file_id: entry.file_id,
                            file_name: entry.file_name,
                            size: entry.size,
                            upload_timestamp: entry.upload_timestamp,
                            content_sha1: entry.content_sha1,
                        },
                        (),
                    )
                })
                .collect())
        })
    }

    fn download_range<'a>(
        &'a self,
        file_id: &'a str,
        inclusive_lo: u64,
        inclusive_hi: u64,
    ) -> BoxFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let url = format!("{}/file/{}/{}", self.base_url, self.bucket_id, file_id);
            let range = format!("bytes={}-{}", inclusive_lo, inclusive_hi);

            let resp = self
                .authorized(self.client.get(&url))
                .header(reqwest::header::RANGE, range)
                .send()
                .await
                .map_err(|err| format_err!("range download failed: {}", err))?;

            let status = resp.status();
            if status != reqwest::StatusCode::PARTIAL_CONTENT && status != reqwest::StatusCode::OK {
                bail!("range download failed with status {}", status);
            }

            let body = resp
                .bytes()
                .await
                .map_err(|err| format_err!("reading range body failed: {}", err))?;

            Ok(body.to_vec())
        })
    }

    fn delete_file_version<'a>(&'a self, file_id: &'a str, file_name: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let url = format!("{}/b2_delete_file_version", self.base_url);
            let resp = self
                .authorized(self.client.post(&url))
                .json(&serde_json::json!({ "fileId": file_id, "fileName": file_name }))
                .send()
                .await
                .map_err(|err| format_err!("delete request failed: {}", err))?;

            let status = resp.status();
            if !status.is_success() {
                bail!("delete failed with status {}", status);
            }

            Ok(())
        })
    }

    fn upload_bytes<'a>(&'a self, data: Vec<u8>, file_name: &'a str) -> BoxFuture<'a, FileInfo> {
        Box::pin(async move {
            let url = format!("{}/b2_upload_file", self.base_url);
            let resp = self
                .authorized(self.client.post(&url))
                .query(&[("bucketId", self.bucket_id.as_str()), ("fileName", file_name)])
                .body(data)
                .send()
                .await
                .map_err(|err| format_err!("upload request failed: {}", err))?;

            let status = resp.status();
            if !status.is_success() {
                bail!("upload failed with status {}", status);
            }

            let entry: ListResponseEntry = resp
                .json()
                .await
                .map_err(|err| format_err!("malformed upload response: {}", err))?;

            Ok(FileInfo {
                file_id: entry.file_id,
                file_name: entry.file_name,
                size: entry.size,
                upload_timestamp: entry.upload_timestamp,
                content_sha1: entry.content_sha1,
            })
        })
    }
}
