use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::config::CloudinaryConfig;
use crate::core::shared::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub bytes: u64,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    format: String,
    #[serde(default)]
    bytes: u64,
}

impl From<UploadResponse> for UploadedImage {
    fn from(r: UploadResponse) -> Self {
        Self {
            url: r.secure_url,
            public_id: r.public_id,
            width: r.width,
            height: r.height,
            format: r.format,
            bytes: r.bytes,
        }
    }
}

/// `sha1("k1=v1&k2=v2" + secret)` over the parameters sorted by key, as lowercase hex.
pub fn sign(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let joined = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct CloudinaryClient {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    pub fn folder(&self) -> &str {
        &self.config.folder
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/{}/image/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.cloud_name,
            action
        )
    }

    pub async fn upload_image(
        &self,
        data: Vec<u8>,
        filename: &str,
        folder: Option<&str>,
    ) -> Result<UploadedImage, ApiError> {
        let folder = folder.unwrap_or(&self.config.folder).to_string();
        let timestamp = Utc::now().timestamp().to_string();

        let mut params = BTreeMap::new();
        params.insert("folder", folder.clone());
        params.insert("timestamp", timestamp.clone());
        let signature = sign(&params, &self.config.api_secret);

        let form = Form::new()
            .part("file", Part::bytes(data).file_name(filename.to_string()))
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder)
            .text("signature", signature);

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Image upload failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Cloudinary upload returned {}: {}", status, body);
            return Err(ApiError::Upstream(format!(
                "Image host rejected the upload ({})",
                status
            )));
        }

        let image: UploadedImage = response
            .json::<UploadResponse>()
            .await
            .map_err(|e| ApiError::Upstream(format!("Unexpected image host response: {}", e)))?
            .into();
        info!("Uploaded image {} ({} bytes)", image.public_id, image.bytes);
        Ok(image)
    }

    pub async fn delete_image(&self, public_id: &str) -> Result<(), ApiError> {
        let timestamp = Utc::now().timestamp().to_string();

        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());
        params.insert("timestamp", timestamp.clone());
        let signature = sign(&params, &self.config.api_secret);

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&[
                ("public_id", public_id),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.config.api_key.as_str()),
                ("signature", signature.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Image deletion failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Cloudinary destroy returned {} for {}", status, public_id);
            return Err(ApiError::Upstream(format!(
                "Image host rejected the deletion ({})",
                status
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Unexpected image host response: {}", e)))?;
        match body["result"].as_str() {
            Some("ok") => {
                info!("Deleted image {}", public_id);
                Ok(())
            }
            Some("not found") => Err(ApiError::not_found("Image")),
            other => Err(ApiError::Upstream(format!(
                "Image deletion failed: {}",
                other.unwrap_or("no result")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config(base_url: String) -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "1234".to_string(),
            api_secret: "abcd".to_string(),
            folder: "learn".to_string(),
            base_url,
        }
    }

    #[test]
    fn test_sign_sorts_params() {
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1315060510".to_string());
        params.insert("public_id", "sample_image".to_string());
        params.insert("eager", "w_400,h_300,c_pad|w_260,h_200,c_crop".to_string());

        assert_eq!(
            sign(&params, "abcd"),
            "bfd09f95f331f558cbd1320e67aa8d488770583e"
        );
    }

    #[test]
    fn test_sign_skips_empty_values() {
        let mut with_empty = BTreeMap::new();
        with_empty.insert("folder", String::new());
        with_empty.insert("timestamp", "1700000000".to_string());

        let mut without = BTreeMap::new();
        without.insert("timestamp", "1700000000".to_string());

        assert_eq!(sign(&with_empty, "secret"), sign(&without, "secret"));
        assert_eq!(sign(&without, "secret").len(), 40);
    }

    #[tokio::test]
    async fn test_upload_image() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/demo/image/upload")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("name=\"api_key\"".to_string()),
                Matcher::Regex("name=\"signature\"".to_string()),
                Matcher::Regex("filename=\"cover.png\"".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"public_id":"learn/cover","secure_url":"https://res.cloudinary.com/demo/image/upload/learn/cover.png","url":"http://insecure","width":640,"height":480,"format":"png","bytes":2048}"#,
            )
            .create_async()
            .await;

        let client = CloudinaryClient::new(config(server.url()));
        let image = client
            .upload_image(b"not-really-a-png".to_vec(), "cover.png", None)
            .await
            .unwrap();

        assert_eq!(image.public_id, "learn/cover");
        assert!(image.url.starts_with("https://res.cloudinary.com"));
        assert_eq!((image.width, image.height), (640, 480));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_failure_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/demo/image/upload")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Invalid Signature"}}"#)
            .create_async()
            .await;

        let client = CloudinaryClient::new(config(server.url()));
        let err = client
            .upload_image(vec![1, 2, 3], "x.png", Some("learn/courses"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_delete_image() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("POST", "/demo/image/destroy")
            .match_body(Matcher::UrlEncoded(
                "public_id".to_string(),
                "learn/cover".to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"result":"ok"}"#)
            .create_async()
            .await;

        let client = CloudinaryClient::new(config(server.url()));
        client.delete_image("learn/cover").await.unwrap();
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_missing_image() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/demo/image/destroy")
            .with_status(200)
            .with_body(r#"{"result":"not found"}"#)
            .create_async()
            .await;

        let client = CloudinaryClient::new(config(server.url()));
        let err = client.delete_image("learn/missing").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
