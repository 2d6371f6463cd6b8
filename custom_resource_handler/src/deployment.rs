use std::collections::BTreeSet;
use std::io::{Cursor, Read};

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};

use crate::error::HandlerError;
use crate::event::{CustomResourceEvent, RequestType};

/// delete_objects takes at most this many keys per call.
const DELETE_BATCH: usize = 1000;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, HandlerError>;
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), HandlerError>;
    async fn list_keys(&self, bucket: &str) -> Result<Vec<String>, HandlerError>;
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), HandlerError>;
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

fn s3_error(e: impl std::error::Error) -> HandlerError {
    HandlerError::S3(DisplayErrorContext(e).to_string())
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, HandlerError> {
        let out = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(s3_error)?;
        let data = out.body.collect().await.map_err(s3_error)?;
        Ok(data.into_bytes().to_vec())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), HandlerError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(s3_error)?;
        Ok(())
    }

    async fn list_keys(&self, bucket: &str) -> Result<Vec<String>, HandlerError> {
        let mut keys = vec![];
        let mut token = None;
        loop {
            let out = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(s3_error)?;
            keys.extend(out.contents().iter().filter_map(|o| o.key().map(String::from)));
            match out.next_continuation_token() {
                Some(next) if out.is_truncated().unwrap_or(false) => token = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(keys)
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), HandlerError> {
        for chunk in keys.chunks(DELETE_BATCH) {
            let mut objects = Vec::with_capacity(chunk.len());
            for key in chunk {
                objects.push(ObjectIdentifier::builder().key(key).build().map_err(s3_error)?);
            }
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(s3_error)?;
            self.client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(s3_error)?;
        }
        Ok(())
    }
}

/// content type served for an object, by file extension.
pub fn content_type_for(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "webmanifest" => "application/manifest+json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

/// Reads a site archive one file at a time, so only the compressed archive
/// and the current entry are held in memory.
pub struct SiteArchive {
    archive: zip::ZipArchive<Cursor<Vec<u8>>>,
    next_index: usize,
}

fn archive_error(e: zip::result::ZipError) -> HandlerError {
    HandlerError::Archive(e.to_string())
}

impl SiteArchive {
    pub fn new(archive: Vec<u8>) -> Result<Self, HandlerError> {
        let archive = zip::ZipArchive::new(Cursor::new(archive)).map_err(archive_error)?;
        Ok(Self {
            archive,
            next_index: 0,
        })
    }

    /// the next file as (object key, contents). Directories and entries that
    /// would escape the archive root are skipped.
    pub fn next_file(&mut self) -> Result<Option<(String, Vec<u8>)>, HandlerError> {
        while self.next_index < self.archive.len() {
            let index = self.next_index;
            self.next_index += 1;
            let mut file = self.archive.by_index(index).map_err(archive_error)?;
            if file.is_dir() {
                continue;
            }
            let Some(path) = file.enclosed_name().map(|p| p.to_path_buf()) else {
                tracing::warn!(name = file.name(), "skipping archive entry outside the root");
                continue;
            };
            let key = path
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let mut body = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut body)
                .map_err(|e| HandlerError::Archive(e.to_string()))?;
            return Ok(Some((key, body)));
        }
        Ok(None)
    }
}

/// Copies the site archive into the website bucket, and empties the bucket
/// when the stack goes away.
pub struct DeploymentHandler<S> {
    store: S,
}

impl<S: ObjectStore> DeploymentHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn handle(&self, event: &CustomResourceEvent) -> Result<String, HandlerError> {
        let destination = event
            .property_str("DestinationBucketName")
            .ok_or(HandlerError::MissingProperty("DestinationBucketName"))?;
        match event.request_type {
            RequestType::Create | RequestType::Update => self.deploy(event, destination).await?,
            RequestType::Delete => {
                let keys = self.store.list_keys(destination).await?;
                tracing::info!(bucket = destination, objects = keys.len(), "emptying bucket");
                self.store.delete_objects(destination, &keys).await?;
            }
        }
        Ok(format!("{destination}-deployment"))
    }

    async fn deploy(&self, event: &CustomResourceEvent, destination: &str) -> Result<(), HandlerError> {
        let source_bucket = event
            .property_str("SourceBucketName")
            .ok_or(HandlerError::MissingProperty("SourceBucketName"))?;
        let source_key = event
            .property_str("SourceObjectKey")
            .ok_or(HandlerError::MissingProperty("SourceObjectKey"))?;
        let prune = event.property_str("Prune") == Some("true");

        let mut archive = SiteArchive::new(self.store.get_object(source_bucket, source_key).await?)?;
        let mut deployed = BTreeSet::new();
        while let Some((key, body)) = archive.next_file()? {
            self.store
                .put_object(destination, &key, body, content_type_for(&key))
                .await?;
            deployed.insert(key);
        }
        tracing::info!(bucket = destination, files = deployed.len(), "uploaded site");

        if prune {
            let stale: Vec<String> = self
                .store
                .list_keys(destination)
                .await?
                .into_iter()
                .filter(|key| !deployed.contains(key))
                .collect();
            if !stale.is_empty() {
                tracing::info!(bucket = destination, objects = stale.len(), "deleting old files");
                self.store.delete_objects(destination, &stale).await?;
            }
        }
        Ok(())
    }
}
