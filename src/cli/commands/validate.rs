use anyhow::{anyhow, bail};
use clap::Args;
use serde_json::{json, Value};

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::config;
use crate::resources::ResourceRegistry;
use crate::validation::ValidationMode;

#[derive(Args)]
pub struct ValidateArgs {
    #[arg(help = "Resource name, e.g. leaves")]
    pub resource: String,

    #[arg(help = "JSON object payload")]
    pub payload: String,

    #[arg(long, help = "Stop at the first violation (defaults to VALIDATION_ABORT_EARLY)")]
    pub fail_fast: bool,
}

pub async fn handle(args: ValidateArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let registry = ResourceRegistry::builtin();
    let descriptor = registry
        .get(&args.resource)
        .ok_or_else(|| anyhow!("Unknown resource '{}' (known: {})", args.resource, registry.names().join(", ")))?;

    let payload: Value = serde_json::from_str(&args.payload)?;
    let Value::Object(payload) = payload else {
        bail!("Payload must be a JSON object");
    };

    let mode = if args.fail_fast {
        ValidationMode::FailFast
    } else {
        ValidationMode::from_abort_early(config::config().validation.abort_early)
    };

    match descriptor.schema.validate(&payload, mode) {
        Ok(cast) => output_success(
            &output_format,
            &format!("Payload is a valid {} body", descriptor.name),
            Some(json!({ "payload": cast })),
        ),
        Err(err) => {
            match output_format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "success": false,
                        "error": err.summary(),
                        "field_errors": err.field_errors(),
                    }))?
                ),
                OutputFormat::Text => {
                    for violation in &err.violations {
                        output_error(&output_format, &violation.reason, None)?;
                    }
                }
            }
            bail!("{} violated field(s)", err.violations.len())
        }
    }
}
