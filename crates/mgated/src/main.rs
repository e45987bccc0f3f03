//! mgated - Management Gateway Daemon
//!
//! Serves a configured set of managed features over an SNMP-style oid space.
//!
//! Usage:
//!   mgated [OPTIONS] [config.toml]
//!
//! If no config file is provided, a built-in demo resource is served.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use mgate_core::{
    AccessRights, ColumnType, FeatureRegistry, ManagedTable, ManagedType, ManagedValue,
    MemoryResource,
};
use mgate_smi::Oid;
use mgate_snmp::{RefreshTrigger, SnmpBinding};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PREFIX: &str = "1.3.6.1.4.1.4999.1";
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_FEATURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Parsed command-line arguments
struct Args {
    /// Gateway config file (TOML)
    config_path: Option<String>,
    /// Oid prefix override
    prefix: Option<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut result = Args {
        config_path: None,
        prefix: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--prefix" | "-p" => {
                if i + 1 < args.len() {
                    result.prefix = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    tracing::error!("Missing argument for --prefix");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                // Positional argument = config file
                result.config_path = Some(arg.to_string());
                i += 1;
            }
            _ => {
                tracing::warn!("Unknown argument: {}", args[i]);
                i += 1;
            }
        }
    }

    result
}

fn print_help() {
    eprintln!(
        r#"mgated - Management Gateway Daemon

Usage: mgated [OPTIONS] [config.toml]

Options:
  -p, --prefix <oid>  Oid prefix the binding is rooted at
                      (default {DEFAULT_PREFIX})
  -h, --help          Print this help message

Examples:
  # Run the built-in demo resource
  mgated

  # Run with a config file
  mgated gateway.toml
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mgated=info,mgate_core=info,mgate_snmp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting mgated (Management Gateway Daemon)");

    let args = parse_args();

    let config = match args.config_path {
        Some(ref path) => {
            tracing::info!("Loading config from: {}", path);
            load_config_file(path)?
        }
        None => {
            tracing::info!("No config file provided, serving the demo resource");
            demo_config()
        }
    };

    let prefix: Oid = args
        .prefix
        .as_deref()
        .unwrap_or(&config.prefix)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid oid prefix: {}", e))?;

    let registry = Arc::new(FeatureRegistry::new(config.resource.clone()));
    let binding = SnmpBinding::new(prefix.clone(), Arc::clone(&registry));
    binding.attach().await;

    for feature in &config.features {
        match registry
            .add(
                &feature.id,
                &feature.declared_name,
                feature.timeout,
                feature.options.clone(),
            )
            .await
        {
            Ok(registered) => tracing::info!(
                feature_id = %registered.id(),
                name = %registered.declared_name(),
                kind = %registered.kind(),
                "Registered feature"
            ),
            Err(e) => tracing::warn!(
                feature_id = %feature.id,
                name = %feature.declared_name,
                error = %e,
                "Skipping feature"
            ),
        }
    }

    tracing::info!(
        prefix = %prefix,
        community = %config.community,
        objects = binding.registered_oids().len(),
        notifications = binding.notification_oids().len(),
        "Gateway ready"
    );

    // Prime the tables once, then keep them warm
    binding.refresh_tables(RefreshTrigger::Request).await;
    let sweep = binding.spawn_refresh_sweep(config.sweep_interval);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    sweep.abort();
    registry.clear().await;

    Ok(())
}

/// One feature registration from the config
struct FeatureSpec {
    id: String,
    declared_name: String,
    timeout: Duration,
    options: BTreeMap<String, String>,
}

/// Fully resolved daemon configuration
struct Config {
    resource: Arc<MemoryResource>,
    features: Vec<FeatureSpec>,
    prefix: String,
    /// Community string handed to the (external) protocol server; held
    /// here as configuration only
    community: String,
    sweep_interval: Duration,
}

/// Load configuration from a TOML file.
///
/// `[attribute.<name>]` tables declare what the in-memory resource serves;
/// `[feature.<id>]` tables declare the registrations placed on it.
fn load_config_file(path: &str) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: toml::Value = toml::from_str(&content)?;

    let prefix = config
        .get("snmp")
        .and_then(|s| s.get("prefix"))
        .and_then(|p| p.as_str())
        .unwrap_or(DEFAULT_PREFIX)
        .to_string();
    let community = config
        .get("snmp")
        .and_then(|s| s.get("community"))
        .and_then(|c| c.as_str())
        .unwrap_or("public")
        .to_string();
    let sweep_interval = config
        .get("snmp")
        .and_then(|s| s.get("sweep-interval-ms"))
        .and_then(|v| v.as_integer())
        .map(|ms| Duration::from_millis(ms.max(1) as u64))
        .unwrap_or(DEFAULT_SWEEP_INTERVAL);
    let resource_name = config
        .get("resource")
        .and_then(|r| r.get("name"))
        .and_then(|n| n.as_str())
        .unwrap_or("memory");

    let resource = Arc::new(MemoryResource::new(resource_name));
    if let Some(attributes) = config.get("attribute").and_then(|a| a.as_table()) {
        for (name, decl) in attributes {
            define_attribute(&resource, name, decl)?;
        }
    }
    if let Some(notifications) = config.get("notification").and_then(|n| n.as_array()) {
        for name in notifications {
            if let Some(name) = name.as_str() {
                resource.define_notification(name);
            }
        }
    }

    let mut features = Vec::new();
    if let Some(specs) = config.get("feature").and_then(|f| f.as_table()) {
        for (id, spec) in specs {
            let declared_name = spec
                .get("name")
                .and_then(|n| n.as_str())
                .unwrap_or(id)
                .to_string();
            let timeout = spec
                .get("timeout-ms")
                .and_then(|v| v.as_integer())
                .map(|ms| Duration::from_millis(ms.max(0) as u64))
                .unwrap_or(DEFAULT_FEATURE_TIMEOUT);
            let mut options = BTreeMap::new();
            if let Some(opts) = spec.get("options").and_then(|o| o.as_table()) {
                for (key, value) in opts {
                    let Some(value) = value.as_str() else {
                        anyhow::bail!("Option '{}' of feature '{}' must be a string", key, id);
                    };
                    options.insert(key.clone(), value.to_string());
                }
            }
            features.push(FeatureSpec {
                id: id.clone(),
                declared_name,
                timeout,
                options,
            });
        }
    }

    Ok(Config {
        resource,
        features,
        prefix,
        community,
        sweep_interval,
    })
}

/// Declare one attribute on the in-memory resource from its config table
fn define_attribute(
    resource: &MemoryResource,
    name: &str,
    decl: &toml::Value,
) -> anyhow::Result<()> {
    let type_name = decl
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow::anyhow!("Attribute '{}' missing 'type'", name))?;
    let ty = parse_managed_type(type_name)
        .ok_or_else(|| anyhow::anyhow!("Attribute '{}' has unknown type '{}'", name, type_name))?;
    let access = match decl.get("access").and_then(|a| a.as_str()) {
        None | Some("read_write") => AccessRights::ReadWrite,
        Some("read_only") => AccessRights::ReadOnly,
        Some("write_only") => AccessRights::WriteOnly,
        Some(other) => anyhow::bail!("Attribute '{}' has unknown access '{}'", name, other),
    };
    let initial = match decl.get("initial") {
        Some(value) => parse_initial(value, &ty).ok_or_else(|| {
            anyhow::anyhow!("Attribute '{}': initial value does not fit type '{}'", name, ty)
        })?,
        None => default_value(&ty),
    };
    resource.define_attribute(name, access, ty, initial);
    Ok(())
}

/// Parse a config type name, including the `array<element>` form
fn parse_managed_type(name: &str) -> Option<ManagedType> {
    let ty = match name {
        "bool" => ManagedType::Bool,
        "int8" => ManagedType::Int8,
        "int16" => ManagedType::Int16,
        "int32" => ManagedType::Int32,
        "int64" => ManagedType::Int64,
        "float32" => ManagedType::Float32,
        "float64" => ManagedType::Float64,
        "decimal" => ManagedType::Decimal,
        "string" => ManagedType::String,
        "timestamp" => ManagedType::Timestamp,
        _ => {
            let element = name.strip_prefix("array<")?.strip_suffix('>')?;
            ManagedType::Array {
                element: Box::new(parse_managed_type(element)?),
            }
        }
    };
    Some(ty)
}

/// Interpret a TOML initial value under a declared type
fn parse_initial(value: &toml::Value, ty: &ManagedType) -> Option<ManagedValue> {
    let managed = match (ty, value) {
        (ManagedType::Bool, toml::Value::Boolean(v)) => ManagedValue::Bool(*v),
        (ManagedType::Int8, toml::Value::Integer(v)) => ManagedValue::Int8(i8::try_from(*v).ok()?),
        (ManagedType::Int16, toml::Value::Integer(v)) => {
            ManagedValue::Int16(i16::try_from(*v).ok()?)
        }
        (ManagedType::Int32, toml::Value::Integer(v)) => {
            ManagedValue::Int32(i32::try_from(*v).ok()?)
        }
        (ManagedType::Int64, toml::Value::Integer(v)) => ManagedValue::Int64(*v),
        (ManagedType::Float32, toml::Value::Float(v)) => ManagedValue::Float32(*v as f32),
        (ManagedType::Float64, toml::Value::Float(v)) => ManagedValue::Float64(*v),
        (ManagedType::Decimal, toml::Value::String(v)) => ManagedValue::Decimal(v.clone()),
        (ManagedType::String, toml::Value::String(v)) => ManagedValue::String(v.clone()),
        (ManagedType::Timestamp, toml::Value::String(v)) => ManagedValue::Timestamp(
            chrono::DateTime::parse_from_rfc3339(v)
                .ok()?
                .with_timezone(&chrono::Utc),
        ),
        (ManagedType::Array { element }, toml::Value::Array(items)) => ManagedValue::Array(
            items
                .iter()
                .map(|item| parse_initial(item, element))
                .collect::<Option<Vec<ManagedValue>>>()?,
        ),
        _ => return None,
    };
    Some(managed)
}

fn default_value(ty: &ManagedType) -> ManagedValue {
    match ty {
        ManagedType::Bool => ManagedValue::Bool(false),
        ManagedType::Int8 => ManagedValue::Int8(0),
        ManagedType::Int16 => ManagedValue::Int16(0),
        ManagedType::Int32 => ManagedValue::Int32(0),
        ManagedType::Int64 => ManagedValue::Int64(0),
        ManagedType::Float32 => ManagedValue::Float32(0.0),
        ManagedType::Float64 => ManagedValue::Float64(0.0),
        ManagedType::Decimal => ManagedValue::Decimal("0".to_string()),
        ManagedType::String => ManagedValue::String(String::new()),
        ManagedType::Timestamp => ManagedValue::Timestamp(chrono::Utc::now()),
        ManagedType::Array { .. } => ManagedValue::Array(Vec::new()),
        ManagedType::Table { .. } => ManagedValue::Table(ManagedTable::default()),
    }
}

/// Built-in demo resource used when no config file is given
fn demo_config() -> Config {
    let resource = Arc::new(MemoryResource::new("demo"));
    resource.define_attribute(
        "uptime_seconds",
        AccessRights::ReadOnly,
        ManagedType::Int64,
        ManagedValue::Int64(0),
    );
    resource.define_attribute(
        "hostname",
        AccessRights::ReadWrite,
        ManagedType::String,
        ManagedValue::String("demo-host".to_string()),
    );
    resource.define_attribute(
        "boot_time",
        AccessRights::ReadOnly,
        ManagedType::Timestamp,
        ManagedValue::Timestamp(chrono::Utc::now()),
    );
    resource.define_attribute(
        "disks",
        AccessRights::ReadOnly,
        ManagedType::Table {
            columns: vec![
                ColumnType::new("mount", ManagedType::String),
                ColumnType::new("used_mb", ManagedType::Int32),
            ],
        },
        ManagedValue::Table(ManagedTable {
            columns: vec!["mount".into(), "used_mb".into()],
            rows: vec![
                vec![ManagedValue::String("/".into()), ManagedValue::Int32(1800)],
                vec![ManagedValue::String("/var".into()), ManagedValue::Int32(420)],
            ],
        }),
    );
    resource.define_attribute(
        "load_averages",
        AccessRights::ReadOnly,
        ManagedType::Array {
            element: Box::new(ManagedType::Float64),
        },
        ManagedValue::Array(vec![
            ManagedValue::Float64(0.4),
            ManagedValue::Float64(0.3),
            ManagedValue::Float64(0.2),
        ]),
    );
    resource.define_notification("disk_full");

    let feature = |id: &str, name: &str| FeatureSpec {
        id: id.to_string(),
        declared_name: name.to_string(),
        timeout: DEFAULT_FEATURE_TIMEOUT,
        options: BTreeMap::new(),
    };

    Config {
        resource,
        features: vec![
            feature("1.0", "uptime_seconds"),
            feature("2.0", "hostname"),
            feature("3.0", "boot_time"),
            feature("4", "disks"),
            feature("5", "load_averages"),
            feature("6.0", "disk_full"),
        ],
        prefix: DEFAULT_PREFIX.to_string(),
        community: "public".to_string(),
        sweep_interval: DEFAULT_SWEEP_INTERVAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_managed_type() {
        assert_eq!(parse_managed_type("int32"), Some(ManagedType::Int32));
        assert_eq!(
            parse_managed_type("array<float64>"),
            Some(ManagedType::Array {
                element: Box::new(ManagedType::Float64)
            })
        );
        assert_eq!(parse_managed_type("widget"), None);
    }

    #[test]
    fn test_parse_initial_checks_type() {
        assert_eq!(
            parse_initial(&toml::Value::Integer(42), &ManagedType::Int32),
            Some(ManagedValue::Int32(42))
        );
        assert_eq!(
            parse_initial(&toml::Value::Integer(300), &ManagedType::Int8),
            None
        );
        assert_eq!(
            parse_initial(&toml::Value::String("x".into()), &ManagedType::Int32),
            None
        );
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(
            &path,
            r#"
[snmp]
prefix = "1.3.6.1.4.1.4999.2"
community = "ops"
sweep-interval-ms = 2000

[resource]
name = "box"

[attribute.cpu_load]
type = "float64"
access = "read_only"
initial = 0.5

[attribute.cores]
type = "array<int32>"
initial = [1, 2]

[feature."1.0"]
name = "cpu_load"
timeout-ms = 1000

[feature."2"]
name = "cores"
[feature."2".options]
table-cache-time = "2500"
"#,
        )
        .unwrap();

        let config = load_config_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.prefix, "1.3.6.1.4.1.4999.2");
        assert_eq!(config.community, "ops");
        assert_eq!(config.sweep_interval, Duration::from_secs(2));
        assert_eq!(config.features.len(), 2);
        assert_eq!(
            config.resource.value("cpu_load"),
            Some(ManagedValue::Float64(0.5))
        );

        let cores = config.features.iter().find(|f| f.id == "2").unwrap();
        assert_eq!(cores.options.get("table-cache-time").unwrap(), "2500");
        let cpu = config.features.iter().find(|f| f.id == "1.0").unwrap();
        assert_eq!(cpu.timeout, Duration::from_millis(1000));
    }
}
