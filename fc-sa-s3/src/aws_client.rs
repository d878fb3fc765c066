use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream as AwsByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as AwsCompletedPart, ObjectCannedAcl};
use aws_sdk_s3::Client;

use crate::client::{
    AbortMultipartUploadRequest, CompleteMultipartUploadOutput, CompleteMultipartUploadRequest,
    CreateMultipartUploadOutput, CreateMultipartUploadRequest, DeleteObjectRequest, GetObjectOutput,
    GetObjectRequest, ObjectStorageClient, UploadPartOutput, UploadPartRequest,
};
use crate::{ClientError, ClientResult, S3StoreConfig};

/// Object storage client backed by the AWS SDK (works with any S3-compatible service)
#[derive(Clone, Debug)]
pub struct AwsS3Client {
    client: Client,
}

impl AwsS3Client {
    /// Build an SDK client from the store configuration.
    ///
    /// Region, endpoint and credentials fall back to the SDK's default provider
    /// chain when not set. A custom endpoint switches to path-style addressing.
    pub async fn connect(config: &S3StoreConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            let credentials = Credentials::new(key_id.clone(), secret.clone(), None, None, "fc-sa-s3");
            loader = loader.credentials_provider(credentials);
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if config.endpoint.is_some() {
            builder = builder.force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStorageClient for AwsS3Client {
    async fn get_object(&self, request: GetObjectRequest) -> ClientResult<GetObjectOutput> {
        let mut call = self
            .client
            .get_object()
            .bucket(&request.bucket)
            .key(&request.key);

        if let Some(range) = &request.range {
            call = call.range(range.header_value());
        }

        let output = call.send().await.map_err(|err| {
            if err.as_service_error().map_or(false, |e| e.is_no_such_key()) {
                ClientError::NoSuchKey {
                    key: request.key.clone(),
                }
            } else {
                ClientError::service(err)
            }
        })?;

        let content_length = output.content_length.and_then(|len| u64::try_from(len).ok());
        let body = output
            .body
            .collect()
            .await
            .map_err(ClientError::service)?
            .into_bytes();

        Ok(GetObjectOutput {
            body,
            content_length,
        })
    }

    async fn create_multipart_upload(
        &self,
        request: CreateMultipartUploadRequest,
    ) -> ClientResult<CreateMultipartUploadOutput> {
        let mut call = self
            .client
            .create_multipart_upload()
            .bucket(request.bucket)
            .key(request.key);

        if let Some(acl) = request.acl {
            call = call.acl(ObjectCannedAcl::from(acl.as_str()));
        }
        if let Some(content_type) = request.content_type {
            call = call.content_type(content_type);
        }

        let output = call.send().await.map_err(ClientError::service)?;

        Ok(CreateMultipartUploadOutput {
            upload_id: output.upload_id,
        })
    }

    async fn upload_part(&self, request: UploadPartRequest) -> ClientResult<UploadPartOutput> {
        let output = self
            .client
            .upload_part()
            .bucket(request.bucket)
            .key(request.key)
            .upload_id(request.upload_id)
            .part_number(request.part_number)
            .body(AwsByteStream::from(request.body))
            .send()
            .await
            .map_err(ClientError::service)?;

        Ok(UploadPartOutput {
            e_tag: output.e_tag,
        })
    }

    async fn complete_multipart_upload(
        &self,
        request: CompleteMultipartUploadRequest,
    ) -> ClientResult<CompleteMultipartUploadOutput> {
        let parts: Vec<AwsCompletedPart> = request
            .parts
            .into_iter()
            .map(|part| {
                AwsCompletedPart::builder()
                    .e_tag(part.e_tag)
                    .part_number(part.part_number)
                    .build()
            })
            .collect();

        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(request.bucket)
            .key(request.key)
            .upload_id(request.upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(ClientError::service)?;

        Ok(CompleteMultipartUploadOutput {
            key: output.key,
            e_tag: output.e_tag,
        })
    }

    async fn abort_multipart_upload(&self, request: AbortMultipartUploadRequest) -> ClientResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(request.bucket)
            .key(request.key)
            .upload_id(&request.upload_id)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().map_or(false, |e| e.is_no_such_upload()) {
                    ClientError::NoSuchUpload {
                        upload_id: request.upload_id.clone(),
                    }
                } else {
                    ClientError::service(err)
                }
            })?;
        Ok(())
    }

    async fn delete_object(&self, request: DeleteObjectRequest) -> ClientResult<()> {
        self.client
            .delete_object()
            .bucket(request.bucket)
            .key(request.key)
            .send()
            .await
            .map_err(ClientError::service)?;
        Ok(())
    }
}
