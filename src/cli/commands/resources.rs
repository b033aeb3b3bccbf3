use serde_json::json;

use crate::cli::utils::print_table;
use crate::cli::OutputFormat;
use crate::resources::{ResourceDescriptor, ResourceRegistry};

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let registry = ResourceRegistry::builtin();

    match output_format {
        OutputFormat::Json => {
            let descriptors = registry.descriptors();
            let descriptors: Vec<&ResourceDescriptor> = descriptors.iter().map(|d| d.as_ref()).collect();
            println!("{}", serde_json::to_string_pretty(&json!({ "resources": descriptors }))?);
        }
        OutputFormat::Text => {
            for descriptor in registry.descriptors() {
                println!("{} (table \"{}\")", descriptor.name, descriptor.table);

                let rows: Vec<Vec<String>> = descriptor
                    .schema
                    .fields
                    .iter()
                    .map(|f| {
                        vec![
                            f.name.clone(),
                            f.kind.as_str().to_string(),
                            format!("{:?}", f.presence).to_lowercase(),
                            if descriptor.is_filter_field(&f.name) { "yes" } else { "" }.to_string(),
                        ]
                    })
                    .collect();
                print_table(&["FIELD", "KIND", "PRESENCE", "FILTER"], &rows);

                for (role, operations) in &descriptor.grants {
                    let ops: Vec<&str> = operations.iter().map(|op| op.as_str()).collect();
                    println!("  {}: {}", role, ops.join(", "));
                }
                for relation in &descriptor.relations {
                    println!("  include {} via {} -> {}", relation.name, relation.foreign_key, relation.target);
                }
                println!();
            }
        }
    }
    Ok(())
}
