use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::Region,
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::ObjectCannedAcl,
};
use profile_server_app::ports::asset_store::{
    AssetStore, AssetStoreError, AssetUpload, StoredAsset, generate_object_key,
};

/// Translates between object keys and the public locations stored in profiles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectLocator {
    base_url: String,
}

impl ObjectLocator {
    pub fn new(base_url: &str) -> Self {
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { base_url }
    }

    /// Virtual-hosted style on AWS, path style against a custom endpoint.
    pub fn for_bucket(bucket: &str, region: &str, endpoint: Option<&str>) -> Self {
        match endpoint {
            Some(endpoint) => Self::new(&format!("{}/{}", endpoint.trim_end_matches('/'), bucket)),
            None => Self::new(&format!("https://{}.s3.{}.amazonaws.com", bucket, region)),
        }
    }

    pub fn location(&self, key: &str) -> String {
        format!("{}{}", self.base_url, key)
    }

    pub fn key(&self, location: &str) -> Option<String> {
        location
            .strip_prefix(&self.base_url)
            .filter(|key| !key.is_empty() && !key.contains('/'))
            .map(str::to_string)
    }
}

pub struct S3AssetStore {
    client: Client,
    bucket: String,
    locator: ObjectLocator,
}

impl S3AssetStore {
    pub async fn new() -> Self {
        let bucket = std::env::var("BUCKET_NAME").expect("BUCKET_NAME must be set");
        let region = std::env::var("BUCKET_REGION").expect("BUCKET_REGION must be set");
        let endpoint = std::env::var("S3_ENDPOINT_URL").ok();

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .load()
            .await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        let client = Client::from_conf(builder.build());

        let locator = match std::env::var("ASSET_PUBLIC_BASE_URL") {
            Ok(base_url) => ObjectLocator::new(&base_url),
            Err(_) => ObjectLocator::for_bucket(&bucket, &region, endpoint.as_deref()),
        };

        log::info!("Using bucket '{}' for profile assets", bucket);
        Self::from_client(client, bucket, locator)
    }

    pub fn from_client(client: Client, bucket: String, locator: ObjectLocator) -> Self {
        Self {
            client,
            bucket,
            locator,
        }
    }
}

#[async_trait::async_trait]
impl AssetStore for S3AssetStore {
    async fn put(&self, upload: AssetUpload) -> Result<StoredAsset, AssetStoreError> {
        let key = generate_object_key();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(upload.data))
            .content_type(upload.content_type)
            .acl(ObjectCannedAcl::BucketOwnerFullControl)
            .send()
            .await
            .map_err(|e| AssetStoreError::Write(DisplayErrorContext(&e).to_string()))?;

        log::debug!("Put object {} into {}", key, self.bucket);
        Ok(StoredAsset {
            location: self.locator.location(&key),
            key,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), AssetStoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AssetStoreError::Delete {
                key: key.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        log::debug!("Deleted object {} from {}", key, self.bucket);
        Ok(())
    }

    fn key_for_location(&self, location: &str) -> Option<String> {
        self.locator.key(location)
    }
}
