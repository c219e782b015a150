//! Manifest loading
//!
//! A manifest is a TOML file with an optional `[provider]` table and one
//! table per declared resource, addressed as `[<kind>.<name>]`:
//!
//! ```toml
//! [provider]
//! base_url = "https://n8n.example.com"
//! api_key = "$N8N_API_TOKEN"
//!
//! [project.infra]
//! name = "Infrastructure"
//! ```

use anyhow::{Context, Result, bail};
use declarative::{AttributeRecord, ResourceEntry, Value};
use n8nkit::{ClientConfig, RetryConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MANIFEST: &str = "n8nform.toml";

const URL_ENV: &str = "N8N_URL";
const KEY_ENV: &str = "N8N_API_TOKEN";
const PROVIDER_TABLE: &str = "provider";

/// Get the user config directory path (~/.config/n8nform)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("n8nform"))
}

/// Expand `~` and environment variables in a user-supplied path
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(path).with_context(|| format!("Could not expand path '{path}'"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// The `[provider]` table as written
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
}

impl ProviderSection {
    /// Resolve into client settings, falling back to the environment
    pub fn resolve(&self) -> Result<ClientConfig> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<ClientConfig> {
        let base_url = setting(self.base_url.as_deref(), "base_url", URL_ENV, &env)?;
        let api_key = setting(self.api_key.as_deref(), "api_key", KEY_ENV, &env)?;

        let retry = RetryConfig {
            max_attempts: self.retries.unwrap_or(3).max(1),
            ..RetryConfig::default()
        };
        Ok(ClientConfig::new(base_url, api_key)
            .timeout(Duration::from_secs(self.timeout_secs.unwrap_or(30)))
            .retry(retry))
    }
}

fn setting(
    configured: Option<&str>,
    attribute: &str,
    variable: &str,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<String> {
    let value = match configured {
        Some(raw) => shellexpand::env(raw)
            .with_context(|| format!("Could not expand provider {attribute}"))?
            .into_owned(),
        None => env(variable).unwrap_or_default(),
    };
    if value.trim().is_empty() {
        bail!("Provider {attribute} is not set (set it in [provider] or export {variable})");
    }
    Ok(value)
}

/// A parsed manifest
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub path: PathBuf,
    pub provider: Option<ProviderSection>,
    pub resources: Vec<ResourceEntry>,
}

impl Manifest {
    /// Load and validate a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest {}", path.display()))?;
        let mut manifest = Self::parse(&content)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;
        manifest.path = path.to_path_buf();
        log::debug!(
            "Loaded {} resources from {}",
            manifest.resources.len(),
            path.display()
        );
        Ok(manifest)
    }

    /// Parse manifest content
    pub fn parse(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content).context("Invalid TOML")?;
        let mut manifest = Self::default();

        for (key, value) in table {
            if key == PROVIDER_TABLE {
                let section = value
                    .try_into::<ProviderSection>()
                    .context("Invalid [provider] section")?;
                manifest.provider = Some(section);
                continue;
            }

            let Some(kind) = n8nkit::kinds::by_name(&key) else {
                bail!("Unknown resource kind '{key}'");
            };
            let toml::Value::Table(entries) = value else {
                bail!("'{key}' must be a table of named resources");
            };

            for (name, body) in entries {
                let toml::Value::Table(body) = body else {
                    bail!("'{key}.{name}' must be a table");
                };
                let attributes = to_record(body)
                    .with_context(|| format!("Invalid attributes in '{key}.{name}'"))?;
                kind.validate_plan(&attributes)
                    .with_context(|| format!("Invalid declaration '{key}.{name}'"))?;
                manifest
                    .resources
                    .push(ResourceEntry::new(kind, &name, attributes));
            }
        }

        Ok(manifest)
    }

    /// Provider settings from the manifest, or from the user config file
    pub fn client_config(&self) -> Result<ClientConfig> {
        if let Some(section) = &self.provider {
            return section.resolve();
        }

        let fallback = config_dir()?.join("config.toml");
        if fallback.exists() {
            log::debug!("Using provider settings from {}", fallback.display());
            return load_provider_file(&fallback)?.resolve();
        }

        ProviderSection::default().resolve()
    }
}

/// Read the `[provider]` table of a standalone config file
fn load_provider_file(path: &Path) -> Result<ProviderSection> {
    #[derive(Deserialize)]
    struct ConfigFile {
        #[serde(default)]
        provider: ProviderSection,
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let file: ConfigFile =
        toml::from_str(&content).with_context(|| format!("Invalid {}", path.display()))?;
    Ok(file.provider)
}

fn to_record(body: toml::Table) -> Result<AttributeRecord> {
    let mut record = AttributeRecord::new();
    for (name, value) in body {
        let json = serde_json::to_value(value)?;
        record.set(name, Value::from(json));
    }
    Ok(record)
}

/// Default state file location: `<manifest stem>.state.json` beside the manifest
pub fn default_state_path(manifest: &Path) -> PathBuf {
    let stem = manifest
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("n8nform");
    manifest.with_file_name(format!("{stem}.state.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MANIFEST: &str = r#"
[provider]
base_url = "http://localhost:5678"
api_key = "secret"
timeout_secs = 5

[project.infra]
name = "Infrastructure"

[variable.api_url]
key = "API_URL"
value = "https://api.example.com"

[project_user.alice]
project_id = "proj-1"
user_id = "user-1"
role = "project:editor"
"#;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.resources.len(), 3);

        let addresses: Vec<_> = manifest.resources.iter().map(|r| r.address.as_str()).collect();
        assert!(addresses.contains(&"project.infra"));
        assert!(addresses.contains(&"project_user.alice"));

        let provider = manifest.provider.unwrap();
        assert_eq!(provider.timeout_secs, Some(5));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = Manifest::parse("[workflow.main]\nname = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown resource kind"));
    }

    #[test]
    fn test_declaration_is_validated() {
        // Missing required name
        assert!(Manifest::parse("[project.infra]\n").is_err());
        // Computed attribute
        assert!(Manifest::parse("[project.infra]\nname = \"a\"\nid = \"p1\"\n").is_err());
        // Wrong type
        assert!(Manifest::parse("[tag.ops]\nname = 3\n").is_err());
    }

    #[test]
    fn test_provider_uses_manifest_values() {
        let section = ProviderSection {
            base_url: Some("http://localhost:5678".into()),
            api_key: Some("secret".into()),
            timeout_secs: Some(5),
            retries: Some(1),
        };
        let config = section.resolve_with(env(&[])).unwrap();
        assert_eq!(config.base_url, "http://localhost:5678");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn test_provider_falls_back_to_environment() {
        let config = ProviderSection::default()
            .resolve_with(env(&[(URL_ENV, "https://n8n.test"), (KEY_ENV, "k")]))
            .unwrap();
        assert_eq!(config.base_url, "https://n8n.test");
        assert_eq!(config.api_key, "k");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_missing_provider_setting_names_variable() {
        let err = ProviderSection::default()
            .resolve_with(env(&[(URL_ENV, "https://n8n.test")]))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("api_key"));
        assert!(message.contains(KEY_ENV));
    }

    #[test]
    fn test_load_manifest_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n8nform.toml");
        fs::write(&path, MANIFEST).unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.path, path);
        assert_eq!(manifest.resources.len(), 3);
    }

    #[test]
    fn test_default_state_path() {
        assert_eq!(
            default_state_path(Path::new("/work/prod.toml")),
            PathBuf::from("/work/prod.state.json")
        );
    }
}
