//! `sources` command: show what a run would touch.

use crate::config::Config;
use crate::pipeline::EntityKind;

/// Print the configured entity kinds and stage sources.
pub fn list_sources(config: &Config) {
    println!("entity kinds ({}):", EntityKind::ALL.len());
    for kind in EntityKind::ALL {
        println!("  {:<10} <- {}", kind.name(), kind.query(config));
    }

    println!("stage sources ({}):", config.stage.len());
    for (name, source) in &config.stage {
        println!(
            "  {:<10} {} -> s3://{}/{}/",
            name, source.table, source.bucket, source.prefix
        );
    }
}
