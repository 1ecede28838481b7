//! Apply command

use super::Context;
use crate::client::AppliedObject;
use crate::error::CliResult;
use crate::output::{self, print_success, OutputFormat};
use clap::Args;
use jobflow_types::read_manifest_file;
use std::path::PathBuf;

/// Create or replace the resources in a manifest file
#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// JSON or YAML manifest file
    #[arg(short = 'f', long = "filename")]
    pub filename: PathBuf,
}

pub async fn execute(args: ApplyArgs, ctx: &Context) -> CliResult<()> {
    let manifests = read_manifest_file(&args.filename)?;
    let applied = ctx.client.apply(&manifests).await?;

    match ctx.output {
        OutputFormat::Table => {
            for object in &applied {
                print_success(&describe(object));
            }
            Ok(())
        }
        format => output::print_single(&applied, format),
    }
}

fn describe(object: &AppliedObject) -> String {
    let verb = if object.created { "created" } else { "configured" };
    format!(
        "{} {}/{} {}",
        object.kind.to_ascii_lowercase(),
        object.namespace,
        object.name,
        verb
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_applied_object() {
        let mut object = AppliedObject {
            kind: "Workflow".to_string(),
            namespace: "default".to_string(),
            name: "mydag".to_string(),
            created: true,
        };
        assert_eq!(describe(&object), "workflow default/mydag created");

        object.created = false;
        assert_eq!(describe(&object), "workflow default/mydag configured");
    }
}
