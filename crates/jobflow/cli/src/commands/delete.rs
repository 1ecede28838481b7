//! Delete commands

use super::{Context, ResourceKind};
use crate::error::{CliError, CliResult};
use crate::output::{print_success, print_warning};
use clap::{ArgGroup, Args};
use jobflow_types::{
    read_manifest_dir, read_manifest_file, Job, Manifest, ObjectKey, Resource, Workflow,
};
use std::path::{Path, PathBuf};

/// Delete resources by name, label selector or manifest file
///
/// A name or selector on the command line wins over `-f`.
#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .multiple(true)
        .args(["name", "selector", "filename"])
))]
pub struct DeleteArgs {
    /// Resource kind; optional with `-f`, where each manifest names its own
    #[arg(required_unless_present = "filename")]
    pub kind: Option<ResourceKind>,

    /// Resource name
    pub name: Option<String>,

    /// Label selector, e.g. `team=data`
    #[arg(short = 'l', long, conflicts_with = "name")]
    pub selector: Option<String>,

    /// Manifest file naming the resources to delete
    #[arg(short = 'f', long = "filename")]
    pub filename: Option<PathBuf>,
}

/// Delete every resource named in a manifest file or directory
#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["directory", "filename"])
))]
pub struct DeleteAllArgs {
    /// Directory of `.json`, `.yaml` or `.yml` manifests
    #[arg(short = 'd', long)]
    pub directory: Option<PathBuf>,

    /// Manifest file
    #[arg(short = 'f', long = "filename")]
    pub filename: Option<PathBuf>,
}

/// What a delete invocation resolved to
#[derive(Debug, PartialEq)]
enum Target {
    Named(ResourceKind, ObjectKey),
    Selected(ResourceKind, String),
    File(Option<ResourceKind>, PathBuf),
}

fn resolve(args: DeleteArgs, ctx: &Context) -> CliResult<Target> {
    let missing_kind = || CliError::Usage("a resource kind is required".to_string());
    if let Some(name) = args.name {
        let kind = args.kind.ok_or_else(missing_kind)?;
        return Ok(Target::Named(kind, ctx.key(&name)));
    }
    if let Some(selector) = args.selector {
        let kind = args.kind.ok_or_else(missing_kind)?;
        return Ok(Target::Selected(kind, selector));
    }
    match args.filename {
        Some(path) => Ok(Target::File(args.kind, path)),
        None => Err(CliError::Usage(
            "pass a name, a label selector (-l) or a file (-f)".to_string(),
        )),
    }
}

pub async fn execute(args: DeleteArgs, ctx: &Context) -> CliResult<()> {
    match resolve(args, ctx)? {
        Target::Named(kind, key) => delete_one(ctx, kind, &key).await,
        Target::Selected(kind, selector) => {
            let namespace = ctx.namespace();
            let deleted = match kind {
                ResourceKind::Workflow => names(
                    ctx.client
                        .delete_matching::<Workflow>(namespace, &selector)
                        .await?,
                ),
                ResourceKind::Job => {
                    names(ctx.client.delete_matching::<Job>(namespace, &selector).await?)
                }
            };
            if deleted.is_empty() {
                print_warning(&format!("No {}s matched {}", kind.label(), selector));
            }
            for key in deleted {
                report(kind, &key);
            }
            Ok(())
        }
        Target::File(kind, path) => {
            let manifests = read_manifest_file(&path)?;
            delete_manifests(ctx, manifests, kind).await
        }
    }
}

pub async fn execute_all(args: DeleteAllArgs, ctx: &Context) -> CliResult<()> {
    let manifests = load(args.directory.as_deref(), args.filename.as_deref())?;
    delete_manifests(ctx, manifests, None).await
}

fn load(directory: Option<&Path>, filename: Option<&Path>) -> CliResult<Vec<Manifest>> {
    match (directory, filename) {
        (Some(dir), None) => Ok(read_manifest_dir(dir)?),
        (None, Some(file)) => Ok(read_manifest_file(file)?),
        _ => Err(CliError::Usage(
            "pass exactly one of a directory (-d) or a file (-f)".to_string(),
        )),
    }
}

/// Delete each manifest's resource in order, stopping at the first failure
async fn delete_manifests(
    ctx: &Context,
    manifests: Vec<Manifest>,
    only: Option<ResourceKind>,
) -> CliResult<()> {
    for manifest in manifests {
        let kind = match manifest {
            Manifest::Workflow(_) => ResourceKind::Workflow,
            Manifest::Job(_) => ResourceKind::Job,
        };
        if only.is_some_and(|only| only != kind) {
            tracing::debug!(kind = manifest.kind(), key = %manifest.key(), "Skipping manifest");
            continue;
        }
        delete_one(ctx, kind, &manifest.key()).await?;
    }
    Ok(())
}

async fn delete_one(ctx: &Context, kind: ResourceKind, key: &ObjectKey) -> CliResult<()> {
    match kind {
        ResourceKind::Workflow => {
            ctx.client.delete::<Workflow>(key).await?;
        }
        ResourceKind::Job => {
            ctx.client.delete::<Job>(key).await?;
        }
    }
    report(kind, key);
    Ok(())
}

fn names<T: Resource>(objects: Vec<T>) -> Vec<ObjectKey> {
    objects.iter().map(|o| o.key()).collect()
}

fn report(kind: ResourceKind, key: &ObjectKey) {
    print_success(&format!("{} {} deleted", kind.label(), key));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::JobflowClient;
    use crate::output::OutputFormat;
    use std::io::Write;

    fn context(namespace: Option<&str>) -> Context {
        Context {
            client: JobflowClient::new("http://127.0.0.1:1").unwrap(),
            output: OutputFormat::Table,
            namespace: namespace.map(str::to_string),
        }
    }

    fn args(
        kind: Option<ResourceKind>,
        name: Option<&str>,
        selector: Option<&str>,
        filename: Option<&str>,
    ) -> DeleteArgs {
        DeleteArgs {
            kind,
            name: name.map(str::to_string),
            selector: selector.map(str::to_string),
            filename: filename.map(PathBuf::from),
        }
    }

    #[test]
    fn test_name_wins_over_file() {
        let ctx = context(Some("batch"));
        let target = resolve(
            args(Some(ResourceKind::Job), Some("j1"), None, Some("jobs.yaml")),
            &ctx,
        )
        .unwrap();
        assert_eq!(
            target,
            Target::Named(ResourceKind::Job, ObjectKey::new("batch", "j1"))
        );
    }

    #[test]
    fn test_selector_and_file_targets() {
        let ctx = context(None);
        let target = resolve(
            args(Some(ResourceKind::Workflow), None, Some("team=data"), None),
            &ctx,
        )
        .unwrap();
        assert_eq!(
            target,
            Target::Selected(ResourceKind::Workflow, "team=data".to_string())
        );

        let target = resolve(args(None, None, None, Some("all.yaml")), &ctx).unwrap();
        assert_eq!(target, Target::File(None, PathBuf::from("all.yaml")));
    }

    #[test]
    fn test_name_without_kind_is_usage_error() {
        let ctx = context(None);
        let result = resolve(args(None, Some("mydag"), None, None), &ctx);
        assert!(matches!(result, Err(CliError::Usage(_))));
    }

    #[test]
    fn test_load_requires_exactly_one_source() {
        assert!(matches!(load(None, None), Err(CliError::Usage(_))));
        assert!(matches!(
            load(Some(Path::new("a")), Some(Path::new("b"))),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn test_load_reads_file_manifests() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "kind: Workflow\nmetadata:\n  name: mydag\n---\nkind: Job\nmetadata:\n  name: j1\n  namespace: batch"
        )
        .unwrap();

        let manifests = load(None, Some(file.path())).unwrap();
        let keys: Vec<_> = manifests.iter().map(|m| (m.kind(), m.key())).collect();
        assert_eq!(
            keys,
            vec![
                ("Workflow", ObjectKey::new("default", "mydag")),
                ("Job", ObjectKey::new("batch", "j1")),
            ]
        );
    }
}
