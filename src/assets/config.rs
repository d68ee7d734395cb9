use anyhow::Context;
use serde::de::DeserializeOwned;
use toml::Value;
use toml::value::Table;

use super::provider::Source;
use super::resolver::{Decoder, LoadContext};
use super::{Asset, AssetKind};

// ── Config ────────────────────────────────────────────────────────────────────

/// Key/value configuration merged from every source of a name.
///
/// Sources are applied lowest priority first. A table present in both layers
/// is merged key by key; any other value is replaced by the higher layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    table: Table,
}

impl Asset for Config {
    const KIND: AssetKind = AssetKind::Config;
}

impl Config {
    /// Parses and merges `layers`, lowest priority first.
    pub fn from_layers<'a>(layers: impl IntoIterator<Item = &'a str>) -> anyhow::Result<Self> {
        Self::from_named_layers(layers.into_iter().enumerate().map(|(i, text)| (format!("layer {i}"), text)))
    }

    fn from_named_layers<'a>(layers: impl IntoIterator<Item = (String, &'a str)>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        for (origin, text) in layers {
            let layer: Table = toml::from_str(text).with_context(|| format!("parsing {origin}"))?;
            merge(&mut config.table, layer);
        }
        Ok(config)
    }

    /// Looks up a dotted path such as `"window.width"`.
    pub fn value(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.table.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    /// Typed lookup. `None` when the key is missing or has another type.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.value(path)?.clone().try_into().ok()
    }

    pub fn get_or<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        self.get(path).unwrap_or(default)
    }

    pub fn table(&self) -> &Table {
        &self.table
    }
}

fn merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        let Value::Table(upper) = value else {
            base.insert(key, value);
            continue;
        };
        if let Some(Value::Table(lower)) = base.get_mut(&key) {
            merge(lower, upper);
            continue;
        }
        base.insert(key, Value::Table(upper));
    }
}

// ── ConfigDecoder ─────────────────────────────────────────────────────────────

pub struct ConfigDecoder;

impl Decoder for ConfigDecoder {
    type Output = Config;

    fn decode(&self, _ctx: &LoadContext<'_>, sources: Vec<Source>) -> anyhow::Result<Config> {
        let mut texts = Vec::with_capacity(sources.len());
        for source in sources {
            let origin = source.origin().to_string();
            texts.push((origin, source.read_to_string()?));
        }
        Config::from_named_layers(texts.iter().map(|(origin, text)| (origin.clone(), text.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_layer_overrides_scalars_and_merges_tables() {
        let config = Config::from_layers([
            "volume = 3\n[window]\nwidth = 1280\nheight = 720\n",
            "volume = 7\n[window]\nwidth = 1920\n",
        ])
        .unwrap();
        assert_eq!(config.get::<i64>("volume"), Some(7));
        assert_eq!(config.get::<i64>("window.width"), Some(1920));
        assert_eq!(config.get::<i64>("window.height"), Some(720));
    }

    #[test]
    fn missing_or_mistyped_keys_are_none() {
        let config = Config::from_layers(["name = \"menu\""]).unwrap();
        assert_eq!(config.get::<i64>("name"), None);
        assert_eq!(config.get::<String>("nope.deeper"), None);
        assert_eq!(config.get_or("fov", 90_i64), 90);
    }

    #[test]
    fn malformed_layer_is_an_error() {
        assert!(Config::from_layers(["= broken"]).is_err());
    }
}
