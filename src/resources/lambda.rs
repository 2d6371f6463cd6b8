use serde::Serialize;
use serde_json::{json, Value};

use super::to_properties;
use crate::cfn::get_att;
use crate::stack::CfnResource;

pub const BASIC_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub effect: String,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
}

impl PolicyStatement {
    /// only Denys should be explicit.
    pub fn allow(actions: &[&str], resources: Vec<Value>) -> Self {
        Self {
            effect: "Allow".into(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources,
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "Effect": self.effect,
            "Action": self.actions,
            "Resource": self.resources,
        })
    }
}

/// an execution role lambda.amazonaws.com can assume, with basic logging rights
/// plus the given statements.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaExecutionRole {
    pub policy_statements: Vec<PolicyStatement>,
}

impl CfnResource for LambdaExecutionRole {
    fn type_string(&self) -> &str {
        "AWS::IAM::Role"
    }

    fn properties(&self) -> crate::Result<Value> {
        let mut props = json!({
            "AssumeRolePolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Service": "lambda.amazonaws.com" },
                    "Action": ["sts:AssumeRole"],
                }]
            },
            "ManagedPolicyArns": [BASIC_EXECUTION_POLICY_ARN],
        });
        if !self.policy_statements.is_empty() {
            let statements: Vec<Value> = self.policy_statements.iter().map(|s| s.to_json()).collect();
            props["Policies"] = json!([{
                "PolicyName": "lambda_generated_policy",
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": statements,
                }
            }]);
        }
        Ok(props)
    }

    fn validate(&self) -> Result<(), String> {
        for statement in &self.policy_statements {
            if statement.effect != "Deny" && statement.effect != "Allow" {
                return Err("policy statement effect must be Allow or Deny".into());
            }
            if statement.actions.is_empty() {
                return Err("policy statement must include an action".into());
            }
            if statement.resources.is_empty() {
                return Err("policy statement must include a resource".into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LambdaCode {
    #[serde(rename = "S3Bucket")]
    pub s3_bucket: Value,
    #[serde(rename = "S3Key")]
    pub s3_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LambdaFunction {
    pub code: LambdaCode,
    pub handler: String,
    pub runtime: String,
    pub role: Value,
    pub memory_size: u32,
    pub timeout: u32,
    pub architectures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LambdaFunction {
    /// a `provided.al2023` function running the `bootstrap` binary from `code`.
    pub fn custom_runtime(code: LambdaCode, role_logical_id: &str) -> Self {
        Self {
            code,
            handler: "bootstrap".into(),
            runtime: "provided.al2023".into(),
            role: get_att(role_logical_id, "Arn"),
            memory_size: 128,
            timeout: 30,
            architectures: vec!["arm64".into()],
            description: None,
        }
    }
}

impl CfnResource for LambdaFunction {
    fn type_string(&self) -> &str {
        "AWS::Lambda::Function"
    }

    fn properties(&self) -> crate::Result<Value> {
        to_properties(self)
    }

    fn validate(&self) -> Result<(), String> {
        if self.memory_size < 128 || self.memory_size > 10240 {
            return Err(format!(
                "Invalid memory size {:?}\nMust be between 128 and 10240",
                self.memory_size
            ));
        }
        if self.timeout < 1 || self.timeout > 900 {
            return Err(format!(
                "Invalid timeout {:?}\nMust be between 1 and 900",
                self.timeout
            ));
        }
        Ok(())
    }
}
