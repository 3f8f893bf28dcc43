//! # Layered Configuration
//!
//! This module loads the sync configuration and resolves keys against a stack
//! of documents: a required base document, overlaid by an optional user
//! document and an optional CI document.
//!
//! ## Key Components
//!
//! - **`ConfigValue`**: A typed leaf value (string, bool, int, or list of
//!   strings).
//!
//! - **`ConfigDocument`**: One parsed file, flattened into an ordered mapping
//!   from dotted key (`sync.autorebase`) to `ConfigValue`. Immutable once
//!   loaded.
//!
//! - **`ConfigSchema`**: The declared keys, their types, and the defaults of
//!   optional keys. Documents are checked against it at load time so that a
//!   malformed file fails before any sync step runs.
//!
//! - **`ConfigStack`**: The base document plus overlays. Lookups return the
//!   value from the most-overlaying layer that defines the exact key, then the
//!   schema default, and otherwise fail with `MissingKey`.
//!
//! ## Formats
//!
//! Documents are YAML, or TOML when the file name ends in `.toml`. Nested
//! mappings flatten into dotted keys, so an overlay that sets
//! `sync: { autorebase: true }` replaces only `sync.autorebase`. Layers never
//! merge partial lists; a list value is replaced as a whole.

use crate::error::{Error, Result};
use crate::tools::Tool;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A typed configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    Bool(bool),
    Int(i64),
    List(Vec<String>),
}

impl ConfigValue {
    /// The kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::String(_) => ValueKind::String,
            ConfigValue::Bool(_) => ValueKind::Bool,
            ConfigValue::Int(_) => ValueKind::Int,
            ConfigValue::List(_) => ValueKind::List,
        }
    }

    /// Converts this value to the declared kind, if a lossless coercion exists.
    ///
    /// Scalars coerce to strings, and a single string coerces to a one-element
    /// list. Nothing coerces to a bool or an int.
    fn coerce(self, kind: ValueKind) -> std::result::Result<ConfigValue, ConfigValue> {
        match (self, kind) {
            (value, kind) if value.kind() == kind => Ok(value),
            (ConfigValue::Bool(b), ValueKind::String) => Ok(ConfigValue::String(b.to_string())),
            (ConfigValue::Int(i), ValueKind::String) => Ok(ConfigValue::String(i.to_string())),
            (ConfigValue::String(s), ValueKind::List) => Ok(ConfigValue::List(vec![s])),
            (value, _) => Err(value),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => write!(f, "{:?}", s),
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Int(i) => write!(f, "{}", i),
            ConfigValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

/// The type of a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Bool,
    Int,
    List,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::List => "list",
        };
        f.write_str(name)
    }
}

/// Declaration of one configuration key.
#[derive(Debug, Clone)]
pub struct KeySpec {
    /// Dotted key path.
    pub key: String,
    /// Expected value type.
    pub kind: ValueKind,
    /// Default for optional keys; `None` marks the key as required.
    pub default: Option<ConfigValue>,
}

impl KeySpec {
    /// Declares a key that must be present in the base document.
    pub fn required(key: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            key: key.into(),
            kind,
            default: None,
        }
    }

    /// Declares an optional key with a default value.
    pub fn optional(key: impl Into<String>, default: ConfigValue) -> Self {
        Self {
            key: key.into(),
            kind: default.kind(),
            default: Some(default),
        }
    }

    /// Whether the key must be present in the base document.
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// The set of declared configuration keys.
#[derive(Debug, Clone, Default)]
pub struct ConfigSchema {
    keys: BTreeMap<String, KeySpec>,
}

impl ConfigSchema {
    /// Creates a schema with no declared keys.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds a key declaration.
    pub fn with_key(mut self, spec: KeySpec) -> Self {
        self.keys.insert(spec.key.clone(), spec);
        self
    }

    /// The schema used by sync runs.
    pub fn sync_schema() -> Self {
        let string = |s: &str| ConfigValue::String(s.to_string());
        let list = |items: &[&str]| ConfigValue::List(items.iter().map(|s| s.to_string()).collect());

        let mut schema = Self::empty()
            .with_key(KeySpec::required("project.name", ValueKind::String))
            .with_key(KeySpec::optional("project.userconfig", string(".user-sync.yaml")))
            .with_key(KeySpec::optional("project.ciconfig", string(".ci-sync.yaml")))
            .with_key(KeySpec::optional("git.remote", string("origin")))
            .with_key(KeySpec::optional("git.expectedbranch", list(&["main"])))
            .with_key(KeySpec::optional("sync.autosync", ConfigValue::Bool(true)))
            .with_key(KeySpec::optional("sync.autorebase", ConfigValue::Bool(false)))
            .with_key(KeySpec::optional("sync.fetch", ConfigValue::Bool(true)))
            .with_key(KeySpec::optional("tools.match", string("exact")))
            .with_key(KeySpec::optional("engine.versioncommand", list(&[])))
            .with_key(KeySpec::optional("engine.switchcommand", list(&[])))
            .with_key(KeySpec::optional("engine.regencommand", list(&[])))
            .with_key(KeySpec::optional("engine.alwaysregen", ConfigValue::Bool(false)))
            .with_key(KeySpec::optional("versioning.stamp", string("off")))
            .with_key(KeySpec::optional("msg.support", string("")));

        for tool in Tool::ALL {
            schema = schema
                .with_key(KeySpec::optional(tool.version_key(), string("")))
                .with_key(KeySpec::optional(tool.installer_key(), list(&[])));
        }

        schema
    }

    /// Looks up the declaration for `key`.
    pub fn spec(&self, key: &str) -> Option<&KeySpec> {
        self.keys.get(key)
    }

    /// Iterates over all declarations in key order.
    pub fn specs(&self) -> impl Iterator<Item = &KeySpec> {
        self.keys.values()
    }

    /// Checks a document against the schema, coercing values to their
    /// declared kinds. Required keys are only enforced for the base layer.
    fn conform(&self, document: &mut ConfigDocument, enforce_required: bool) -> Result<()> {
        let mut values = std::mem::take(&mut document.values);

        for (key, value) in values.iter_mut() {
            let Some(spec) = self.spec(key) else {
                log::warn!(
                    "Unknown configuration key '{}' in {}",
                    key,
                    document.path.display()
                );
                continue;
            };

            let current = std::mem::replace(value, ConfigValue::Bool(false));
            match current.coerce(spec.kind) {
                Ok(coerced) => *value = coerced,
                Err(original) => {
                    return Err(Error::ConfigLoad {
                        path: document.path.clone(),
                        message: format!(
                            "key '{}' must be a {}, found {} {}",
                            key,
                            spec.kind,
                            original.kind(),
                            original
                        ),
                        hint: None,
                    });
                }
            }
        }

        if enforce_required {
            let missing: Vec<&str> = self
                .specs()
                .filter(|spec| spec.is_required() && !values.contains_key(&spec.key))
                .map(|spec| spec.key.as_str())
                .collect();

            if !missing.is_empty() {
                return Err(Error::ConfigLoad {
                    path: document.path.clone(),
                    message: format!("missing required keys: {}", missing.join(", ")),
                    hint: Some("required keys must be set in the base configuration".to_string()),
                });
            }
        }

        document.values = values;
        Ok(())
    }
}

/// Serialization format of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Toml,
}

impl DocumentFormat {
    /// Picks the format from a file extension, defaulting to YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => DocumentFormat::Toml,
            _ => DocumentFormat::Yaml,
        }
    }
}

/// One parsed configuration file, flattened into dotted keys.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    path: PathBuf,
    values: BTreeMap<String, ConfigValue>,
}

impl ConfigDocument {
    /// Parses document content without schema validation.
    ///
    /// `path` is only used in error messages.
    pub fn parse(content: &str, format: DocumentFormat, path: &Path) -> Result<Self> {
        let malformed = |message: String| Error::ConfigLoad {
            path: path.to_path_buf(),
            message,
            hint: None,
        };
        let invalid = |e: FlattenError| Error::ConfigLoad {
            path: path.to_path_buf(),
            message: e.message,
            hint: e.hint.map(str::to_string),
        };

        let mut values = BTreeMap::new();
        match format {
            DocumentFormat::Yaml => {
                let root: serde_yaml::Value =
                    serde_yaml::from_str(content).map_err(|e| malformed(e.to_string()))?;
                match root {
                    serde_yaml::Value::Null => {}
                    serde_yaml::Value::Mapping(_) => {
                        flatten_yaml("", &root, &mut values).map_err(invalid)?
                    }
                    _ => return Err(malformed("top level must be a mapping".to_string())),
                }
            }
            DocumentFormat::Toml => {
                let root: toml::Table =
                    toml::from_str(content).map_err(|e| malformed(e.to_string()))?;
                flatten_toml("", &toml::Value::Table(root), &mut values).map_err(invalid)?;
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    /// Creates a document directly from key/value pairs.
    pub fn from_values<I, K>(path: impl Into<PathBuf>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, ConfigValue)>,
        K: Into<String>,
    {
        Self {
            path: path.into(),
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Reads and parses a document. A missing file is reported as
    /// `ErrorKind::NotFound` so callers can decide whether that is fatal.
    fn read(path: &Path) -> std::result::Result<Self, ReadError> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ReadError::NotFound
            } else {
                ReadError::Failed(Error::ConfigLoad {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                    hint: None,
                })
            }
        })?;
        Self::parse(&content, DocumentFormat::from_path(path), path).map_err(ReadError::Failed)
    }

    /// The file this document was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up an exact key in this document only.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    /// Iterates over all keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of keys in the document.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the document defines no keys.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

enum ReadError {
    NotFound,
    Failed(Error),
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// A flattening failure, with an optional hint for the user.
struct FlattenError {
    message: String,
    hint: Option<&'static str>,
}

impl From<String> for FlattenError {
    fn from(message: String) -> Self {
        Self {
            message,
            hint: None,
        }
    }
}

const QUOTE_VERSION_HINT: &str = "Quote version values so their text is kept, e.g. version: \"2.40\"";

/// Unquoted decimals lose their written form (`2.40` parses as `2.4`), so
/// they are rejected instead of guessed at.
fn unquoted_float(prefix: &str, text: impl fmt::Display) -> FlattenError {
    FlattenError {
        message: format!("unquoted decimal number {} at '{}'", text, prefix),
        hint: Some(QUOTE_VERSION_HINT),
    }
}

fn yaml_scalar(
    prefix: &str,
    value: &serde_yaml::Value,
) -> std::result::Result<Option<ConfigValue>, FlattenError> {
    Ok(match value {
        serde_yaml::Value::String(s) => Some(ConfigValue::String(s.clone())),
        serde_yaml::Value::Bool(b) => Some(ConfigValue::Bool(*b)),
        serde_yaml::Value::Number(n) => match n.as_i64() {
            Some(i) => Some(ConfigValue::Int(i)),
            None if n.is_f64() => return Err(unquoted_float(prefix, n)),
            None => Some(ConfigValue::String(n.to_string())),
        },
        serde_yaml::Value::Tagged(tagged) => yaml_scalar(prefix, &tagged.value)?,
        _ => None,
    })
}

fn scalar_text(value: ConfigValue) -> Option<String> {
    match value {
        ConfigValue::String(s) => Some(s),
        ConfigValue::Bool(b) => Some(b.to_string()),
        ConfigValue::Int(i) => Some(i.to_string()),
        ConfigValue::List(_) => None,
    }
}

fn flatten_yaml(
    prefix: &str,
    value: &serde_yaml::Value,
    out: &mut BTreeMap<String, ConfigValue>,
) -> std::result::Result<(), FlattenError> {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, child) in map {
                let key = yaml_scalar(prefix, key)?
                    .and_then(scalar_text)
                    .ok_or_else(|| format!("non-scalar mapping key under '{}'", prefix))?;
                flatten_yaml(&join_key(prefix, &key), child, out)?;
            }
        }
        serde_yaml::Value::Sequence(items) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                let text = yaml_scalar(prefix, item)?
                    .and_then(scalar_text)
                    .ok_or_else(|| format!("list '{}' may only contain scalar values", prefix))?;
                list.push(text);
            }
            out.insert(prefix.to_string(), ConfigValue::List(list));
        }
        serde_yaml::Value::Null => {}
        serde_yaml::Value::Tagged(tagged) => flatten_yaml(prefix, &tagged.value, out)?,
        scalar => {
            if let Some(value) = yaml_scalar(prefix, scalar)? {
                out.insert(prefix.to_string(), value);
            }
        }
    }
    Ok(())
}

fn toml_scalar(
    prefix: &str,
    value: &toml::Value,
) -> std::result::Result<Option<ConfigValue>, FlattenError> {
    Ok(match value {
        toml::Value::String(s) => Some(ConfigValue::String(s.clone())),
        toml::Value::Integer(i) => Some(ConfigValue::Int(*i)),
        toml::Value::Float(f) => return Err(unquoted_float(prefix, f)),
        toml::Value::Boolean(b) => Some(ConfigValue::Bool(*b)),
        toml::Value::Datetime(d) => Some(ConfigValue::String(d.to_string())),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    })
}

fn flatten_toml(
    prefix: &str,
    value: &toml::Value,
    out: &mut BTreeMap<String, ConfigValue>,
) -> std::result::Result<(), FlattenError> {
    match value {
        toml::Value::Table(table) => {
            for (key, child) in table {
                flatten_toml(&join_key(prefix, key), child, out)?;
            }
        }
        toml::Value::Array(items) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                let text = toml_scalar(prefix, item)?
                    .and_then(scalar_text)
                    .ok_or_else(|| format!("list '{}' may only contain scalar values", prefix))?;
                list.push(text);
            }
            out.insert(prefix.to_string(), ConfigValue::List(list));
        }
        scalar => {
            if let Some(value) = toml_scalar(prefix, scalar)? {
                out.insert(prefix.to_string(), value);
            }
        }
    }
    Ok(())
}

/// Loads the base document and validates it against the sync schema.
///
/// Fails if the file is missing, unparsable, or lacks required keys.
pub fn load(base_path: &Path) -> Result<ConfigDocument> {
    load_with_schema(base_path, &ConfigSchema::sync_schema())
}

/// Loads a base document against a custom schema.
pub fn load_with_schema(base_path: &Path, schema: &ConfigSchema) -> Result<ConfigDocument> {
    let mut document = match ConfigDocument::read(base_path) {
        Ok(document) => document,
        Err(ReadError::NotFound) => {
            return Err(Error::ConfigLoad {
                path: base_path.to_path_buf(),
                message: "base configuration file not found".to_string(),
                hint: Some(format!(
                    "create {} or pass --config with its location",
                    base_path.display()
                )),
            })
        }
        Err(ReadError::Failed(e)) => return Err(e),
    };
    schema.conform(&mut document, true)?;
    Ok(document)
}

/// Loads an optional overlay document.
///
/// A missing overlay is `Ok(None)`; a malformed one is an error.
pub fn load_overlay(path: &Path) -> Result<Option<ConfigDocument>> {
    load_overlay_with_schema(path, &ConfigSchema::sync_schema())
}

/// Loads an optional overlay document against a custom schema.
pub fn load_overlay_with_schema(
    path: &Path,
    schema: &ConfigSchema,
) -> Result<Option<ConfigDocument>> {
    match ConfigDocument::read(path) {
        Ok(mut document) => {
            schema.conform(&mut document, false)?;
            Ok(Some(document))
        }
        Err(ReadError::NotFound) => {
            log::debug!("No overlay at {}, skipping", path.display());
            Ok(None)
        }
        Err(ReadError::Failed(e)) => Err(e),
    }
}

/// Which layer of the stack a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Base,
    User,
    Ci,
    Default,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layer::Base => "base",
            Layer::User => "user",
            Layer::Ci => "ci",
            Layer::Default => "default",
        };
        f.write_str(name)
    }
}

/// The base document overlaid by optional user and CI documents.
#[derive(Debug, Clone)]
pub struct ConfigStack {
    schema: ConfigSchema,
    base: ConfigDocument,
    user: Option<ConfigDocument>,
    ci: Option<ConfigDocument>,
}

impl ConfigStack {
    /// Creates a stack from an already-validated base document.
    pub fn new(schema: ConfigSchema, base: ConfigDocument) -> Self {
        Self {
            schema,
            base,
            user: None,
            ci: None,
        }
    }

    /// Sets the user overlay.
    pub fn with_user(mut self, user: Option<ConfigDocument>) -> Self {
        self.user = user;
        self
    }

    /// Sets the CI overlay.
    pub fn with_ci(mut self, ci: Option<ConfigDocument>) -> Self {
        self.ci = ci;
        self
    }

    /// Loads the base document and its overlays.
    ///
    /// Overlay locations come from `project.userconfig` and
    /// `project.ciconfig` in the base document and are resolved relative to
    /// the base document's directory. The CI overlay is only read when `ci`
    /// is set.
    pub fn load(base_path: &Path, ci: bool) -> Result<Self> {
        let schema = ConfigSchema::sync_schema();
        let base = load_with_schema(base_path, &schema)?;
        let stack = Self::new(schema, base);

        let user_path = stack.overlay_path("project.userconfig")?;
        let user = load_overlay_with_schema(&user_path, &stack.schema)?;
        if user.is_some() {
            log::debug!("Loaded user overlay {}", user_path.display());
        }

        let ci_doc = if ci {
            let ci_path = stack.overlay_path("project.ciconfig")?;
            let doc = load_overlay_with_schema(&ci_path, &stack.schema)?;
            if doc.is_some() {
                log::debug!("Loaded CI overlay {}", ci_path.display());
            }
            doc
        } else {
            None
        };

        Ok(stack.with_user(user).with_ci(ci_doc))
    }

    /// Overlay locations are only read from the base layer; an overlay cannot
    /// redirect itself.
    fn overlay_path(&self, key: &str) -> Result<PathBuf> {
        let relative = match self.base.get(key) {
            Some(ConfigValue::String(s)) => s.clone(),
            _ => match self.schema.spec(key).and_then(|s| s.default.clone()) {
                Some(ConfigValue::String(s)) => s,
                _ => return Err(Error::MissingKey { key: key.to_string() }),
            },
        };
        Ok(self.root().join(relative))
    }

    /// Directory containing the base document.
    pub fn root(&self) -> &Path {
        match self.base.path().parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// The schema this stack was loaded with.
    pub fn schema(&self) -> &ConfigSchema {
        &self.schema
    }

    /// The loaded layers, most-overlaying first.
    pub fn layers(&self) -> Vec<(Layer, &ConfigDocument)> {
        let mut layers = Vec::with_capacity(3);
        if let Some(ci) = &self.ci {
            layers.push((Layer::Ci, ci));
        }
        if let Some(user) = &self.user {
            layers.push((Layer::User, user));
        }
        layers.push((Layer::Base, &self.base));
        layers
    }

    /// Resolves a key and reports which layer supplied it.
    pub fn resolve(&self, key: &str) -> Result<(&ConfigValue, Layer)> {
        for (layer, document) in self.layers() {
            if let Some(value) = document.get(key) {
                return Ok((value, layer));
            }
        }

        self.schema
            .spec(key)
            .and_then(|spec| spec.default.as_ref())
            .map(|value| (value, Layer::Default))
            .ok_or_else(|| Error::MissingKey { key: key.to_string() })
    }

    /// Resolves a key against the stack.
    pub fn get(&self, key: &str) -> Result<&ConfigValue> {
        self.resolve(key).map(|(value, _)| value)
    }

    /// Resolves a string key.
    pub fn get_str(&self, key: &str) -> Result<&str> {
        match self.get(key)? {
            ConfigValue::String(s) => Ok(s),
            other => Err(type_error(key, ValueKind::String, other)),
        }
    }

    /// Resolves a bool key.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.get(key)? {
            ConfigValue::Bool(b) => Ok(*b),
            other => Err(type_error(key, ValueKind::Bool, other)),
        }
    }

    /// Resolves an int key.
    pub fn get_int(&self, key: &str) -> Result<i64> {
        match self.get(key)? {
            ConfigValue::Int(i) => Ok(*i),
            other => Err(type_error(key, ValueKind::Int, other)),
        }
    }

    /// Resolves a list key.
    pub fn get_list(&self, key: &str) -> Result<&[String]> {
        match self.get(key)? {
            ConfigValue::List(items) => Ok(items),
            other => Err(type_error(key, ValueKind::List, other)),
        }
    }
}

fn type_error(key: &str, expected: ValueKind, found: &ConfigValue) -> Error {
    Error::ConfigType {
        key: key.to_string(),
        expected: expected.to_string(),
        found: found.kind().to_string(),
    }
}
