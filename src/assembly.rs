//! Synthesis of the cloud assembly the CDK toolkit deploys.
//!
//! `cdk` runs `aws-web-pub synth` as its app. The app reads its context from
//! the environment, builds the website stack and writes a manifest, the
//! template and an asset manifest into `CDK_OUTDIR`. Lookups that aren't in
//! the context yet are listed as missing; `cdk` resolves them and runs the
//! app again.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::hosted_zone::{HostedZoneResolver, ZoneHandle, ZoneLookup};
use crate::project_config::ProjectConfig;
use crate::resources::ASSETS_BUCKET;
use crate::stack::{AssetPackaging, FileAsset, MissingContext, Stack};
use crate::static_website::{build_stack, SiteAssets, ARTIFACT_ID};

pub const CLOUD_ASSEMBLY_VERSION: &str = "21.0.0";
pub const REGION: &str = "us-east-1";
pub const UNKNOWN_ACCOUNT: &str = "unknown-account";
pub const BOOTSTRAP_QUALIFIER: &str = "hnb659fds";
pub const REQUIRED_BOOTSTRAP_VERSION: u32 = 6;

pub const CONTEXT_ENV: &str = "CDK_CONTEXT_JSON";
pub const OUTDIR_ENV: &str = "CDK_OUTDIR";
pub const ACCOUNT_ENV: &str = "CDK_DEFAULT_ACCOUNT";
pub const HANDLER_PACKAGE_ENV: &str = "AWS_WEB_PUB_HANDLER_PACKAGE";
pub const HANDLER_PACKAGE_FILE: &str = "aws-web-pub-handler.zip";

/// context key the driver puts the absolute project directory under.
pub const PROJECT_CONTEXT_KEY: &str = "project";
/// zone id handed out while a lookup is still pending.
pub const DUMMY_ZONE_ID: &str = "DUMMY";

/// everything the engine passes to the app.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthContext {
    pub context: Map<String, Value>,
    pub out_dir: PathBuf,
    pub account: Option<String>,
    pub handler_package: PathBuf,
}

impl SynthContext {
    pub fn from_env() -> Result<Self> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        Self::from_vars(|key| std::env::var(key).ok(), &exe_dir)
    }

    /// `vars` is the environment. The handler package defaults to a zip next to the executable.
    pub fn from_vars(vars: impl Fn(&str) -> Option<String>, exe_dir: &Path) -> Result<Self> {
        let context = match vars(CONTEXT_ENV) {
            Some(raw) => match serde_json::from_str::<Value>(&raw)? {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            None => Map::new(),
        };
        let out_dir = vars(OUTDIR_ENV)
            .filter(|v| !v.is_empty())
            .ok_or(Error::MissingEnv(OUTDIR_ENV))?;
        let account = vars(ACCOUNT_ENV).filter(|v| !v.is_empty());
        let handler_package = vars(HANDLER_PACKAGE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| exe_dir.join(HANDLER_PACKAGE_FILE));
        Ok(Self {
            context,
            out_dir: out_dir.into(),
            account,
            handler_package,
        })
    }

    pub fn project_dir(&self) -> Result<PathBuf> {
        match self.context.get(PROJECT_CONTEXT_KEY) {
            Some(Value::String(dir)) if !dir.is_empty() => Ok(PathBuf::from(dir)),
            _ => Err(Error::MissingContext(PROJECT_CONTEXT_KEY)),
        }
    }
}

pub fn hosted_zone_context_key(account: &str, zone_name: &str) -> String {
    format!("hosted-zone:account={account}:domainName={zone_name}:region={REGION}")
}

/// Finds hosted zones in the engine's context. Zones that aren't there are
/// recorded as missing and get a placeholder id.
pub struct ContextZoneLookup<'a> {
    context: &'a Map<String, Value>,
    account: Option<&'a str>,
    missing: Vec<MissingContext>,
}

impl<'a> ContextZoneLookup<'a> {
    pub fn new(context: &'a Map<String, Value>, account: Option<&'a str>) -> Self {
        Self {
            context,
            account,
            missing: vec![],
        }
    }

    pub fn into_missing(self) -> Vec<MissingContext> {
        self.missing
    }
}

impl ZoneLookup for ContextZoneLookup<'_> {
    fn lookup(&mut self, zone_name: &str) -> Result<ZoneHandle> {
        let account = self.account.ok_or(Error::UnresolvedEnvironment {
            provider: "hosted-zone",
        })?;
        let key = hosted_zone_context_key(account, zone_name);
        let found = self
            .context
            .get(&key)
            .and_then(|v| v.get("Id"))
            .and_then(Value::as_str);
        let hosted_zone_id = match found {
            Some(id) => id.trim_start_matches("/hostedzone/").to_string(),
            None => {
                tracing::debug!(%key, "hosted zone not in context yet");
                let props = BTreeMap::from([
                    ("account".to_string(), json!(account)),
                    ("domainName".to_string(), json!(zone_name)),
                    ("region".to_string(), json!(REGION)),
                ]);
                self.missing.push(MissingContext {
                    key,
                    provider: "hosted-zone".into(),
                    props,
                });
                DUMMY_ZONE_ID.to_string()
            }
        };
        Ok(ZoneHandle {
            zone_name: zone_name.to_string(),
            hosted_zone_id,
        })
    }
}

fn iter_files_recursively(
    start_dir: &Path,
    callback: &mut impl FnMut(PathBuf) -> Result<()>,
) -> Result<()> {
    let readdir = std::fs::read_dir(start_dir).map_err(|e| Error::io(start_dir, e))?;
    for entry in readdir {
        let direntry = entry.map_err(|e| Error::io(start_dir, e))?;
        let path = direntry.path();
        // follows symlinks, a linked directory is walked like any other
        let metadata = std::fs::metadata(&path).map_err(|e| Error::io(&path, e))?;
        if metadata.is_dir() {
            iter_files_recursively(&path, callback)?;
        } else {
            callback(path)?;
        }
    }
    Ok(())
}

/// Fingerprint of a directory's content: relative paths and file bytes, in
/// path order. Moving a file changes the hash, touching it doesn't.
pub fn hash_directory(dir: &Path) -> Result<String> {
    let mut files = vec![];
    iter_files_recursively(dir, &mut |path| {
        files.push(path);
        Ok(())
    })?;
    files.sort();
    let mut hasher = blake3::Hasher::new();
    for path in files {
        let relative = path.strip_prefix(dir).unwrap_or(&path);
        hasher.update(relative.to_string_lossy().replace('\\', "/").as_bytes());
        hasher.update(&[0]);
        let contents = std::fs::read(&path).map_err(|e| Error::io(&path, e))?;
        hasher.update(&contents);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

pub fn hash_file(path: &Path) -> Result<String> {
    let contents = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(blake3::hash(&contents).to_hex().to_string())
}

pub fn site_assets(publish_dir: &Path, handler_package: &Path) -> Result<SiteAssets> {
    if !publish_dir.is_dir() {
        return Err(Error::io(
            publish_dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "publish directory does not exist"),
        ));
    }
    if !handler_package.is_file() {
        return Err(Error::HandlerPackageMissing(handler_package.to_path_buf()));
    }
    Ok(SiteAssets {
        content: FileAsset {
            hash: hash_directory(publish_dir)?,
            source_path: publish_dir.to_path_buf(),
            packaging: AssetPackaging::ZipDirectory,
        },
        handler_package: FileAsset {
            hash: hash_file(handler_package)?,
            source_path: handler_package.to_path_buf(),
            packaging: AssetPackaging::File,
        },
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssetManifest {
    version: &'static str,
    files: BTreeMap<String, AssetEntry>,
    docker_images: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize)]
struct AssetEntry {
    source: AssetSource,
    destinations: BTreeMap<String, AssetDestination>,
}

#[derive(Debug, Serialize)]
struct AssetSource {
    path: PathBuf,
    packaging: AssetPackaging,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssetDestination {
    bucket_name: &'static str,
    object_key: String,
    region: &'static str,
    assume_role_arn: String,
}

#[derive(Debug, Serialize)]
struct Manifest {
    version: &'static str,
    artifacts: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing: Vec<MissingContext>,
}

fn bootstrap_role(kind: &str) -> String {
    format!("arn:${{AWS::Partition}}:iam::${{AWS::AccountId}}:role/cdk-{BOOTSTRAP_QUALIFIER}-{kind}-role-${{AWS::AccountId}}-{REGION}")
}

fn asset_manifest(stack: &Stack) -> AssetManifest {
    let files = stack
        .assets()
        .iter()
        .map(|asset| {
            let destination = AssetDestination {
                bucket_name: ASSETS_BUCKET,
                object_key: asset.object_key(),
                region: REGION,
                assume_role_arn: bootstrap_role("file-publishing"),
            };
            let entry = AssetEntry {
                source: AssetSource {
                    path: asset.source_path.clone(),
                    packaging: asset.packaging,
                },
                destinations: BTreeMap::from([(format!("current_account-{REGION}"), destination)]),
            };
            (asset.hash.clone(), entry)
        })
        .collect();
    AssetManifest {
        version: CLOUD_ASSEMBLY_VERSION,
        files,
        docker_images: BTreeMap::new(),
    }
}

fn manifest(stack: &Stack, account: Option<&str>, missing: Vec<MissingContext>) -> Manifest {
    let id = stack.artifact_id();
    let assets_id = format!("{id}.assets");
    let bootstrap_parameter = format!("/cdk-bootstrap/{BOOTSTRAP_QUALIFIER}/version");
    let environment = format!("aws://{}/{REGION}", account.unwrap_or(UNKNOWN_ACCOUNT));
    let artifacts = BTreeMap::from([
        (
            assets_id.clone(),
            json!({
                "type": "cdk:asset-manifest",
                "properties": {
                    "file": format!("{assets_id}.json"),
                    "requiresBootstrapStackVersion": REQUIRED_BOOTSTRAP_VERSION,
                    "bootstrapStackVersionSsmParameter": bootstrap_parameter,
                }
            }),
        ),
        (
            id.to_string(),
            json!({
                "type": "aws:cloudformation:stack",
                "environment": environment,
                "properties": {
                    "templateFile": format!("{id}.template.json"),
                    "stackName": stack.stack_name(),
                    "validateOnSynth": false,
                    "assumeRoleArn": bootstrap_role("deploy"),
                    "cloudFormationExecutionRoleArn": bootstrap_role("cfn-exec"),
                    "requiresBootstrapStackVersion": REQUIRED_BOOTSTRAP_VERSION,
                    "bootstrapStackVersionSsmParameter": bootstrap_parameter,
                },
                "dependencies": [assets_id],
                "displayName": stack.stack_name(),
            }),
        ),
    ]);
    Manifest {
        version: CLOUD_ASSEMBLY_VERSION,
        artifacts,
        missing,
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents = serde_json::to_string_pretty(value)?;
    std::fs::write(path, contents).map_err(|e| Error::io(path, e))
}

/// writes manifest.json, the template and the asset manifest into `out_dir`.
pub fn write_assembly(
    out_dir: &Path,
    stack: &Stack,
    account: Option<&str>,
    missing: Vec<MissingContext>,
) -> Result<()> {
    std::fs::create_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))?;
    let id = stack.artifact_id();
    write_json(&out_dir.join(format!("{id}.template.json")), stack.template())?;
    write_json(&out_dir.join(format!("{id}.assets.json")), &asset_manifest(stack))?;
    write_json(&out_dir.join("manifest.json"), &manifest(stack, account, missing))?;
    Ok(())
}

/// what a synth run produced.
#[derive(Debug)]
pub struct Synthesized {
    pub stack: Stack,
    pub missing: Vec<MissingContext>,
}

/// Loads the project named by the context, builds the website stack and
/// writes the cloud assembly.
pub fn synth(ctx: &SynthContext) -> Result<Synthesized> {
    let project_dir = ctx.project_dir()?;
    let config = ProjectConfig::load(&project_dir)?;
    let props = config.stack_props(&project_dir);
    crate::stack::validate_stack_name(&props.stack_name)?;
    let assets = site_assets(&props.publish_dir, &ctx.handler_package)?;

    let mut zones = HostedZoneResolver::new(ContextZoneLookup::new(&ctx.context, ctx.account.as_deref()));
    let stack = build_stack(&props, assets, &mut zones)?;
    let missing = zones.into_lookup().into_missing();

    write_assembly(&ctx.out_dir, &stack, ctx.account.as_deref(), missing.clone())?;
    if missing.is_empty() {
        tracing::info!(out_dir = ?ctx.out_dir, stack = ARTIFACT_ID, "wrote cloud assembly");
    } else {
        tracing::info!(
            out_dir = ?ctx.out_dir,
            missing = missing.len(),
            "wrote cloud assembly with pending context lookups"
        );
    }
    Ok(Synthesized { stack, missing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project_config::CONFIG_FILE_NAME;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    /// a project dir with a config, a publish dir and a handler package
    fn project(config: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), config).unwrap();
        std::fs::create_dir_all(dir.path().join("dist/css")).unwrap();
        std::fs::write(dir.path().join("dist/index.html"), "<h1>hi</h1>").unwrap();
        std::fs::write(dir.path().join("dist/css/site.css"), "h1 {}").unwrap();
        std::fs::write(dir.path().join(HANDLER_PACKAGE_FILE), b"PK").unwrap();
        dir
    }

    fn context(project: &Path, extra: Value, account: Option<&str>) -> SynthContext {
        let mut context = Map::new();
        context.insert(PROJECT_CONTEXT_KEY.into(), json!(project.to_string_lossy()));
        if let Value::Object(extra) = extra {
            context.extend(extra);
        }
        SynthContext {
            context,
            out_dir: project.join("cdk.out"),
            account: account.map(String::from),
            handler_package: project.join(HANDLER_PACKAGE_FILE),
        }
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn context_comes_from_environment() {
        let ctx = SynthContext::from_vars(
            vars(&[
                (CONTEXT_ENV, r#"{"project": "/site", "aws-cdk:enableDiffNoFail": "true"}"#),
                (OUTDIR_ENV, "/site/aws-web-pub.out/cdk.out"),
                (ACCOUNT_ENV, "123456789012"),
            ]),
            Path::new("/usr/local/bin"),
        )
        .unwrap();
        assert_eq!(ctx.project_dir().unwrap(), PathBuf::from("/site"));
        assert_eq!(ctx.account.as_deref(), Some("123456789012"));
        assert_eq!(
            ctx.handler_package,
            PathBuf::from("/usr/local/bin/aws-web-pub-handler.zip")
        );

        let ctx = SynthContext::from_vars(
            vars(&[(OUTDIR_ENV, "/out"), (HANDLER_PACKAGE_ENV, "/tmp/handler.zip")]),
            Path::new("/usr/local/bin"),
        )
        .unwrap();
        assert_eq!(ctx.handler_package, PathBuf::from("/tmp/handler.zip"));
        assert!(matches!(ctx.project_dir(), Err(Error::MissingContext("project"))));
    }

    #[test]
    fn out_dir_is_required() {
        let err = SynthContext::from_vars(vars(&[]), Path::new("/bin")).unwrap_err();
        assert!(matches!(err, Error::MissingEnv(OUTDIR_ENV)));
    }

    #[test]
    fn zone_lookup_reads_context() {
        let context = json!({
            "hosted-zone:account=123456789012:domainName=example.com:region=us-east-1": {
                "Id": "/hostedzone/Z0123ABC",
                "Name": "example.com.",
            }
        });
        let context = context.as_object().unwrap();
        let mut lookup = ContextZoneLookup::new(context, Some("123456789012"));
        let zone = lookup.lookup("example.com").unwrap();
        assert_eq!(zone.hosted_zone_id, "Z0123ABC");

        let zone = lookup.lookup("example.org").unwrap();
        assert_eq!(zone.hosted_zone_id, DUMMY_ZONE_ID);
        let missing = lookup.into_missing();
        assert_eq!(missing.len(), 1);
        assert_eq!(
            missing[0].key,
            "hosted-zone:account=123456789012:domainName=example.org:region=us-east-1"
        );
        assert_eq!(missing[0].props["domainName"], "example.org");
    }

    #[test]
    fn zone_lookup_needs_an_account() {
        let context = Map::new();
        let mut lookup = ContextZoneLookup::new(&context, None);
        assert!(matches!(
            lookup.lookup("example.com"),
            Err(Error::UnresolvedEnvironment { .. })
        ));
    }

    #[test]
    fn directory_hash_follows_content() {
        let a = project("{}");
        let b = project("{}");
        let hash_a = hash_directory(&a.path().join("dist")).unwrap();
        assert_eq!(hash_a, hash_directory(&b.path().join("dist")).unwrap());

        std::fs::write(b.path().join("dist/index.html"), "<h1>changed</h1>").unwrap();
        assert_ne!(hash_a, hash_directory(&b.path().join("dist")).unwrap());

        std::fs::rename(a.path().join("dist/css/site.css"), a.path().join("dist/site.css")).unwrap();
        assert_ne!(hash_a, hash_directory(&a.path().join("dist")).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_walked() {
        let dir = project("{}");
        let shared = tempfile::tempdir().unwrap();
        std::fs::write(shared.path().join("logo.svg"), "<svg/>").unwrap();
        let dist = dir.path().join("dist");
        let before = hash_directory(&dist).unwrap();

        std::os::unix::fs::symlink(shared.path(), dist.join("shared")).unwrap();
        let linked = hash_directory(&dist).unwrap();
        assert_ne!(before, linked);

        std::fs::write(shared.path().join("logo.svg"), "<svg></svg>").unwrap();
        assert_ne!(linked, hash_directory(&dist).unwrap());
    }

    #[test]
    fn synth_without_domains_writes_the_assembly() {
        let dir = project(r#"{ "projectName": "my-site", "publishDir": "dist" }"#);
        let ctx = context(dir.path(), json!({}), None);
        let out = synth(&ctx).unwrap();
        assert!(out.missing.is_empty());

        let manifest = read_json(&ctx.out_dir.join("manifest.json"));
        assert_eq!(manifest["version"], CLOUD_ASSEMBLY_VERSION);
        let stack = &manifest["artifacts"]["aws-web-pub"];
        assert_eq!(stack["type"], "aws:cloudformation:stack");
        assert_eq!(stack["environment"], "aws://unknown-account/us-east-1");
        assert_eq!(stack["properties"]["stackName"], "my-site");
        assert_eq!(stack["dependencies"], json!(["aws-web-pub.assets"]));
        assert!(manifest.get("missing").is_none());

        let template = read_json(&ctx.out_dir.join("aws-web-pub.template.json"));
        assert_eq!(template["Resources"]["Bucket"]["Type"], "AWS::S3::Bucket");

        let assets = read_json(&ctx.out_dir.join("aws-web-pub.assets.json"));
        let files = assets["files"].as_object().unwrap();
        assert_eq!(files.len(), 2);
        let content_hash = out.stack.assets()[0].hash.clone();
        let content = &files[&content_hash];
        assert_eq!(content["source"]["packaging"], "zip");
        assert_eq!(
            content["destinations"]["current_account-us-east-1"]["objectKey"],
            format!("{content_hash}.zip")
        );
    }

    #[test]
    fn synth_records_pending_zone_lookups() {
        let dir = project(
            r#"{ "projectName": "my-site", "publishDir": "dist",
                 "domains": [{ "name": "www.example.com" }, { "name": "www.example.org" }] }"#,
        );
        let ctx = context(dir.path(), json!({}), Some("123456789012"));
        let out = synth(&ctx).unwrap();
        assert_eq!(out.missing.len(), 2);

        let manifest = read_json(&ctx.out_dir.join("manifest.json"));
        assert_eq!(manifest["missing"][0]["provider"], "hosted-zone");
        assert_eq!(
            manifest["artifacts"]["aws-web-pub"]["environment"],
            "aws://123456789012/us-east-1"
        );
    }

    #[test]
    fn synth_uses_resolved_zones() {
        let dir = project(
            r#"{ "projectName": "my-site", "publishDir": "dist",
                 "domains": [{ "name": "www.example.com" }] }"#,
        );
        let resolved = json!({
            "hosted-zone:account=123456789012:domainName=example.com:region=us-east-1": {
                "Id": "/hostedzone/Z0123ABC",
                "Name": "example.com.",
            }
        });
        let ctx = context(dir.path(), resolved, Some("123456789012"));
        let out = synth(&ctx).unwrap();
        assert!(out.missing.is_empty());
        let record = out.stack.resource(&crate::cfn::logical_id("ARecord", "www.example.com")).unwrap();
        assert_eq!(record.properties["HostedZoneId"], "Z0123ABC");
    }

    #[test]
    fn synth_needs_the_handler_package() {
        let dir = project(r#"{ "projectName": "my-site", "publishDir": "dist" }"#);
        let mut ctx = context(dir.path(), json!({}), None);
        ctx.handler_package = dir.path().join("nope.zip");
        assert!(matches!(synth(&ctx), Err(Error::HandlerPackageMissing(_))));
    }

    #[test]
    fn synth_reports_config_errors() {
        let dir = project(r#"{ "projectName": "my-site" }"#);
        let ctx = context(dir.path(), json!({}), None);
        match synth(&ctx) {
            Err(Error::Config(e)) => assert_eq!(e.field(), Some("publishDir")),
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
