//! Runs the CDK toolkit against a project: `publish` bootstraps the account
//! and deploys, `unpublish` destroys the stack.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::assembly::PROJECT_CONTEXT_KEY;
use crate::error::{Error, Result};
use crate::project_config::ProjectConfig;

/// created inside the project directory, `cdk` runs from here.
pub const OUT_DIR_NAME: &str = "aws-web-pub.out";
pub const CDK_PROGRAM: &str = "npx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdkOperation {
    Bootstrap,
    Deploy,
    Destroy,
}

impl CdkOperation {
    pub fn name(&self) -> &'static str {
        match self {
            CdkOperation::Bootstrap => "bootstrap",
            CdkOperation::Deploy => "deploy",
            CdkOperation::Destroy => "destroy",
        }
    }

    fn args(&self) -> &'static [&'static str] {
        match self {
            CdkOperation::Bootstrap => &["bootstrap"],
            CdkOperation::Deploy => &["deploy", "--require-approval", "never"],
            CdkOperation::Destroy => &["destroy", "--force"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdkInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

/// Runs a command to completion with inherited output. Returns its exit
/// code, `None` when it was killed by a signal.
pub trait CommandRunner {
    fn run(&mut self, invocation: &CdkInvocation) -> Result<Option<i32>>;
}

pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&mut self, invocation: &CdkInvocation) -> Result<Option<i32>> {
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .stdin(Stdio::inherit())
            .status()
            .map_err(|source| Error::EngineSpawn {
                program: invocation.program.clone(),
                source,
            })?;
        Ok(status.code())
    }
}

/// the command `cdk` runs as its app: this executable's hidden `synth` subcommand.
pub fn app_command(executable: &Path) -> String {
    format!("\"{}\" synth", executable.display())
}

pub struct CdkDriver<R> {
    runner: R,
    profile: Option<String>,
    /// what `cdk` runs to synthesize, eg: `"/usr/local/bin/aws-web-pub" synth`
    app: String,
}

impl<R: CommandRunner> CdkDriver<R> {
    pub fn new(runner: R, profile: Option<String>, app: String) -> Self {
        Self { runner, profile, app }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn invocation(&self, project_dir: &Path, operation: CdkOperation) -> CdkInvocation {
        let build_dir = project_dir.join(OUT_DIR_NAME);
        let mut args: Vec<String> = vec!["--no-install".into(), "cdk".into()];
        if let Some(profile) = &self.profile {
            args.push("--profile".into());
            args.push(profile.clone());
        }
        args.push("--output".into());
        args.push(build_dir.join("cdk.out").to_string_lossy().to_string());
        args.push("--context".into());
        args.push("aws-cdk:enableDiffNoFail=true".into());
        args.push("--context".into());
        args.push(format!("{PROJECT_CONTEXT_KEY}={}", project_dir.display()));
        args.push("--app".into());
        args.push(self.app.clone());
        args.extend(operation.args().iter().map(|a| a.to_string()));
        CdkInvocation {
            program: CDK_PROGRAM.into(),
            args,
            working_dir: build_dir,
        }
    }

    pub fn publish(&mut self, project_dir: &Path) -> Result<()> {
        let project_dir = prepare(project_dir)?;
        self.run(&project_dir, CdkOperation::Bootstrap)?;
        self.run(&project_dir, CdkOperation::Deploy)
    }

    pub fn unpublish(&mut self, project_dir: &Path) -> Result<()> {
        let project_dir = prepare(project_dir)?;
        self.run(&project_dir, CdkOperation::Destroy)
    }

    fn run(&mut self, project_dir: &Path, operation: CdkOperation) -> Result<()> {
        let invocation = self.invocation(project_dir, operation);
        tracing::info!(operation = operation.name(), dir = ?invocation.working_dir, "running cdk");
        tracing::debug!(args = ?invocation.args);
        match self.runner.run(&invocation)? {
            Some(0) => Ok(()),
            status => Err(Error::EngineFailed {
                operation: operation.name().to_string(),
                status,
            }),
        }
    }
}

/// Makes the project path absolute and validates its config before anything
/// runs. Returns the absolute project path.
fn prepare(project_dir: &Path) -> Result<PathBuf> {
    let project_dir = std::fs::canonicalize(project_dir).map_err(|e| Error::io(project_dir, e))?;
    let config = ProjectConfig::load(&project_dir)?;
    tracing::debug!(project = %config.project_name, dir = ?project_dir, "project config is valid");
    let build_dir = project_dir.join(OUT_DIR_NAME);
    std::fs::create_dir_all(&build_dir).map_err(|e| Error::io(&build_dir, e))?;
    Ok(project_dir)
}
