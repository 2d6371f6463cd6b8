use serde_json::{json, Value};

use crate::cfn::{get_att, get_ref, join, sub};
use crate::error::Result;
use crate::stack::{AssetPackaging, FileAsset, Stack};

use super::{CustomResource, LambdaCode, LambdaExecutionRole, LambdaFunction, PolicyStatement};

/// the bucket `cdk bootstrap` creates with the default qualifier. Assets are published there.
pub const ASSETS_BUCKET: &str = "cdk-hnb659fds-assets-${AWS::AccountId}-${AWS::Region}";

pub const BUCKET_DEPLOYMENT_TYPE: &str = "Custom::BucketDeployment";
pub const INVALIDATION_TYPE: &str = "Custom::CloudFrontInvalidation";

pub const HANDLER_ROLE_ID: &str = "CustomResourceHandlerRole";
pub const HANDLER_FUNCTION_ID: &str = "CustomResourceHandler";
pub const BUCKET_DEPLOYMENT_ID: &str = "BucketDeployment";
pub const INVALIDATION_ID: &str = "WebDistributionInvalidation";

/// Copies the zipped publish directory into the website bucket on every
/// content change, then invalidates `/*` on the distribution. Both custom
/// resources are served by the same handler function.
pub struct BucketDeployment<'a> {
    pub content: FileAsset,
    pub handler_package: FileAsset,
    pub destination_bucket_id: &'a str,
    pub distribution_id: &'a str,
    /// delete objects that are no longer part of the content
    pub prune: bool,
}

impl BucketDeployment<'_> {
    fn handler_role(&self) -> LambdaExecutionRole {
        let site_bucket_arn = get_att(self.destination_bucket_id, "Arn");
        let site_objects = join("", vec![site_bucket_arn.clone(), json!("/*")]);
        LambdaExecutionRole {
            policy_statements: vec![
                PolicyStatement::allow(
                    &["s3:GetObject"],
                    vec![sub(&format!("arn:${{AWS::Partition}}:s3:::{ASSETS_BUCKET}/*"))],
                ),
                PolicyStatement::allow(
                    &["s3:GetObject", "s3:PutObject", "s3:DeleteObject", "s3:ListBucket"],
                    vec![site_bucket_arn, site_objects],
                ),
                PolicyStatement::allow(
                    &["cloudfront:CreateInvalidation", "cloudfront:GetInvalidation"],
                    vec![Value::String("*".into())],
                ),
            ],
        }
    }

    fn handler_function(&self) -> LambdaFunction {
        let code = LambdaCode {
            s3_bucket: sub(ASSETS_BUCKET),
            s3_key: self.handler_package.object_key(),
        };
        let mut function = LambdaFunction::custom_runtime(code, HANDLER_ROLE_ID);
        function.memory_size = 512;
        // waiting on an invalidation can take several minutes
        function.timeout = 900;
        function.description = Some("aws-web-pub bucket deployment and cache invalidation".into());
        function
    }

    pub fn add_to(self, stack: &mut Stack) -> Result<()> {
        stack.add_resource(HANDLER_ROLE_ID, &self.handler_role())?;
        stack.add_resource(HANDLER_FUNCTION_ID, &self.handler_function())?;

        let deployment = CustomResource::new(BUCKET_DEPLOYMENT_TYPE, HANDLER_FUNCTION_ID)
            .property("SourceBucketName", sub(ASSETS_BUCKET))
            .property("SourceObjectKey", self.content.object_key())
            .property("DestinationBucketName", get_ref(self.destination_bucket_id))
            .property("Prune", self.prune.to_string());
        stack.add_resource(BUCKET_DEPLOYMENT_ID, &deployment)?;

        let invalidation = CustomResource::new(INVALIDATION_TYPE, HANDLER_FUNCTION_ID)
            .property("distributionId", get_ref(self.distribution_id))
            .property("sourceHash", self.content.hash.clone());
        stack
            .add_resource(INVALIDATION_ID, &invalidation)?
            .depends_on
            .push(BUCKET_DEPLOYMENT_ID.to_string());

        debug_assert_eq!(self.content.packaging, AssetPackaging::ZipDirectory);
        stack.add_file_asset(self.content);
        stack.add_file_asset(self.handler_package);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(prune: bool) -> BucketDeployment<'static> {
        BucketDeployment {
            content: FileAsset {
                hash: "c0ffee".into(),
                source_path: "/site/dist".into(),
                packaging: AssetPackaging::ZipDirectory,
            },
            handler_package: FileAsset {
                hash: "beef".into(),
                source_path: "/bin/aws-web-pub-handler.zip".into(),
                packaging: AssetPackaging::File,
            },
            destination_bucket_id: "Bucket",
            distribution_id: "WebDistribution",
            prune,
        }
    }

    #[test]
    fn deployment_then_invalidation() {
        let mut stack = Stack::new("app", "site").unwrap();
        deployment(false).add_to(&mut stack).unwrap();

        let deploy = stack.resource(BUCKET_DEPLOYMENT_ID).unwrap();
        assert_eq!(deploy.ty, "Custom::BucketDeployment");
        assert_eq!(deploy.properties["SourceObjectKey"], "c0ffee.zip");
        assert_eq!(deploy.properties["Prune"], "false");
        assert_eq!(deploy.properties["DestinationBucketName"], json!({ "Ref": "Bucket" }));

        let invalidation = stack.resource(INVALIDATION_ID).unwrap();
        assert_eq!(invalidation.ty, "Custom::CloudFrontInvalidation");
        assert_eq!(invalidation.properties["distributionId"], json!({ "Ref": "WebDistribution" }));
        assert_eq!(invalidation.properties["sourceHash"], "c0ffee");
        assert_eq!(invalidation.depends_on, vec![BUCKET_DEPLOYMENT_ID.to_string()]);
        assert_eq!(
            invalidation.properties["ServiceToken"],
            json!({ "Fn::GetAtt": [HANDLER_FUNCTION_ID, "Arn"] })
        );

        let function = stack.resource(HANDLER_FUNCTION_ID).unwrap();
        assert_eq!(function.properties["Code"]["S3Key"], "beef.zip");
        assert_eq!(function.properties["Timeout"], 900);
        assert_eq!(stack.assets().len(), 2);
    }

    #[test]
    fn prune_is_passed_as_a_string() {
        let mut stack = Stack::new("app", "site").unwrap();
        deployment(true).add_to(&mut stack).unwrap();
        assert_eq!(stack.resource(BUCKET_DEPLOYMENT_ID).unwrap().properties["Prune"], "true");
    }
}
