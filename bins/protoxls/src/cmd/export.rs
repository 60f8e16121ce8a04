use std::sync::Arc;

use protoxls_engine::{CalamineReader, ExportReport, Exporter, RendererRegistry, load_schemas, table_schemas};
use render_bin::BinRenderer;
use render_json::JsonRenderer;
use render_lua::LuaRenderer;
use render_php::PhpRenderer;
use render_yaml::YamlRenderer;

use super::config::Effective;
use super::error::CliError;

/// Every built-in format.
pub fn registry() -> RendererRegistry {
    RendererRegistry::new()
        .with(JsonRenderer)
        .with(LuaRenderer)
        .with(BinRenderer)
        .with(YamlRenderer)
        .with(PhpRenderer)
}

pub async fn run(eff: Effective) -> Result<ExportReport, CliError> {
    let pool = load_schemas(&eff.descriptors, &eff.protos, &eff.include)?;
    let schemas = table_schemas(&pool);
    if schemas.is_empty() {
        tracing::warn!("no message carries excel/sheet options, nothing to export");
    }

    for target in &eff.plan.targets {
        tracing::info!(format = %target.format, dir = %target.dir.display(), "output target");
    }

    let exporter = Exporter::new(registry(), Arc::new(CalamineReader), eff.plan)
        .with_search_paths(eff.include);

    let report = if eff.concurrent {
        Arc::new(exporter).run_concurrent(schemas.clone()).await
    } else {
        exporter.run(&schemas)
    };

    tracing::info!(
        messages = schemas.len(),
        written = report.written.len(),
        failed = report.failures.len(),
        "export finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use protoxls_api::OutputFormat;

    #[test]
    fn registry_covers_every_format() {
        let registry = registry();
        for format in OutputFormat::ALL {
            assert_eq!(registry.get(format).unwrap().format(), format);
        }
    }
}
