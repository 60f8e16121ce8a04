use std::path::{Path, PathBuf};

use clap::Args;

use protoxls_api::RenderOptions;
use protoxls_engine::{ExportPlan, OutputConfig, ProtoxlsConfig};

use super::error::CliError;

/// Read when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG: &str = "protoxls.toml";

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug, Default)]
pub struct ExportArgs {
    /// Config file (TOML). Defaults to ./protoxls.toml when present
    #[arg(long, env = "PROTOXLS_CONFIG")]
    pub config: Option<String>,

    /// Compiled descriptor set (protoc --include_imports --descriptor_set_out)
    #[arg(short = 'd', long = "descriptor", env = "PROTOXLS_DESCRIPTOR", value_delimiter = ',')]
    pub descriptors: Vec<PathBuf>,

    /// .proto source to compile, resolved against the include paths
    #[arg(short = 'p', long = "proto", env = "PROTOXLS_PROTO", value_delimiter = ',')]
    pub protos: Vec<PathBuf>,

    /// Import path for .proto sources, also searched for relative workbook paths
    #[arg(short = 'I', long = "include")]
    pub include: Vec<PathBuf>,

    /// Output directory for json files
    #[arg(long)]
    pub json_out: Option<PathBuf>,

    /// Output directory for lua files
    #[arg(long)]
    pub lua_out: Option<PathBuf>,

    /// Output directory for length-prefixed binary files
    #[arg(long)]
    pub bin_out: Option<PathBuf>,

    /// Output directory for yaml files
    #[arg(long)]
    pub yaml_out: Option<PathBuf>,

    /// Output directory for php files
    #[arg(long)]
    pub php_out: Option<PathBuf>,

    /// Output directory for every format without its own
    #[arg(long)]
    pub all_out: Option<PathBuf>,

    /// Single-line json, lua and php output
    #[arg(long)]
    pub compact: bool,

    /// Render json/lua nested leaves with several records as arrays
    /// instead of keeping the first record
    #[arg(long)]
    pub nested_leaf_arrays: bool,

    /// Export messages in parallel
    #[arg(long)]
    pub concurrent: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

/// Final settings: protoxls.toml < env/CLI
#[derive(Debug)]
pub struct Effective {
    pub descriptors: Vec<PathBuf>,
    pub protos: Vec<PathBuf>,
    pub include: Vec<PathBuf>,
    pub concurrent: bool,
    pub plan: ExportPlan,
}

impl Effective {
    pub fn new(args: &ExportArgs) -> Result<Self, CliError> {
        let cfg = match &args.config {
            Some(path) => ProtoxlsConfig::load(path)?,
            None if Path::new(DEFAULT_CONFIG).exists() => ProtoxlsConfig::load(DEFAULT_CONFIG)?,
            None => ProtoxlsConfig::default(),
        };
        Self::merge(args, cfg)
    }

    /// List settings from the CLI replace the file's; flags are or-ed.
    pub fn merge(args: &ExportArgs, cfg: ProtoxlsConfig) -> Result<Self, CliError> {
        let descriptors = prefer_cli(&args.descriptors, cfg.descriptors);
        let protos = prefer_cli(&args.protos, cfg.protos);
        if descriptors.is_empty() && protos.is_empty() {
            return Err(CliError::Config(
                "no schema given (--descriptor / --proto, or `descriptors` / `protos` in config)".into(),
            ));
        }
        let include = prefer_cli(&args.include, cfg.include);

        let output = OutputConfig {
            all: args.all_out.clone().or(cfg.output.all),
            json: args.json_out.clone().or(cfg.output.json),
            lua: args.lua_out.clone().or(cfg.output.lua),
            bin: args.bin_out.clone().or(cfg.output.bin),
            yaml: args.yaml_out.clone().or(cfg.output.yaml),
            php: args.php_out.clone().or(cfg.output.php),
        };
        let options = RenderOptions {
            compact: args.compact || cfg.compact,
            nested_leaf_arrays: args.nested_leaf_arrays || cfg.nested_leaf_arrays,
        };

        Ok(Self {
            descriptors,
            protos,
            include,
            concurrent: args.concurrent || cfg.concurrent,
            plan: ExportPlan::new(output.targets(), options),
        })
    }
}

fn prefer_cli(cli: &[PathBuf], file: Vec<PathBuf>) -> Vec<PathBuf> {
    if cli.is_empty() { file } else { cli.to_vec() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protoxls_api::OutputFormat;
    use protoxls_engine::OutputTarget;

    fn base() -> ExportArgs {
        ExportArgs {
            descriptors: vec!["game.pb".into()],
            ..Default::default()
        }
    }

    #[test]
    fn defaults_to_json_in_output_dir() {
        let eff = Effective::merge(&base(), ProtoxlsConfig::default()).unwrap();
        assert_eq!(
            eff.plan.targets,
            [OutputTarget {
                format: OutputFormat::Json,
                dir: "output".into()
            }]
        );
        assert!(!eff.plan.options.compact);
        assert!(!eff.concurrent);
    }

    #[test]
    fn cli_overrides_config_file() {
        let cfg = ProtoxlsConfig::parse(
            r#"
            descriptors = ["from_file.pb"]
            include = ["data"]
            concurrent = true

            [output]
            json = "file/json"
            lua = "file/lua"
            "#,
        )
        .unwrap();
        let args = ExportArgs {
            json_out: Some("cli/json".into()),
            compact: true,
            nested_leaf_arrays: true,
            ..base()
        };

        let eff = Effective::merge(&args, cfg).unwrap();
        assert_eq!(eff.descriptors, [PathBuf::from("game.pb")]);
        assert_eq!(eff.include, [PathBuf::from("data")]);
        assert!(eff.concurrent);
        assert!(eff.plan.options.compact);
        assert!(eff.plan.options.nested_leaf_arrays);

        let dirs: Vec<_> = eff.plan.targets.iter().map(|t| (t.format, t.dir.clone())).collect();
        assert_eq!(
            dirs,
            [
                (OutputFormat::Json, PathBuf::from("cli/json")),
                (OutputFormat::Lua, PathBuf::from("file/lua")),
            ]
        );
    }

    #[test]
    fn all_out_fills_remaining_formats() {
        let args = ExportArgs {
            all_out: Some("out".into()),
            bin_out: Some("bin".into()),
            ..base()
        };
        let eff = Effective::merge(&args, ProtoxlsConfig::default()).unwrap();
        assert_eq!(eff.plan.targets.len(), 5);
        let bin = eff.plan.targets.iter().find(|t| t.format == OutputFormat::Bin).unwrap();
        assert_eq!(bin.dir, PathBuf::from("bin"));
    }

    #[test]
    fn descriptors_come_from_config_when_cli_has_none() {
        let cfg = ProtoxlsConfig {
            descriptors: vec!["a.pb".into(), "b.pb".into()],
            ..Default::default()
        };
        let eff = Effective::merge(&ExportArgs::default(), cfg).unwrap();
        assert_eq!(eff.descriptors.len(), 2);
    }

    #[test]
    fn proto_sources_alone_are_enough() {
        let args = ExportArgs {
            protos: vec!["game.proto".into()],
            include: vec!["proto".into()],
            ..Default::default()
        };
        let eff = Effective::merge(&args, ProtoxlsConfig::default()).unwrap();
        assert!(eff.descriptors.is_empty());
        assert_eq!(eff.protos, [PathBuf::from("game.proto")]);
        assert_eq!(eff.include, [PathBuf::from("proto")]);
        assert!(!eff.plan.options.nested_leaf_arrays);
    }

    #[test]
    fn missing_schema_is_an_error() {
        let err = Effective::merge(&ExportArgs::default(), ProtoxlsConfig::default()).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let args = ExportArgs {
            config: Some(missing.display().to_string()),
            ..base()
        };
        assert!(matches!(Effective::new(&args), Err(CliError::Engine(_))));
    }

    #[test]
    fn explicit_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("protoxls.toml");
        std::fs::write(&path, "compact = true\n[output]\nyaml = \"y\"\n").unwrap();
        let args = ExportArgs {
            config: Some(path.display().to_string()),
            ..base()
        };

        let eff = Effective::new(&args).unwrap();
        assert!(eff.plan.options.compact);
        assert_eq!(eff.plan.targets[0].format, OutputFormat::Yaml);
    }
}
