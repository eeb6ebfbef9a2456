//! Workflow definition loading and linking.
//!
//! Workflow definitions are static YAML descriptors of pipeline stages.
//! Each stage declares the record collection it reads/writes, the data
//! object types it requires and produces, and the names of the stages that
//! must precede it. After individual definitions are parsed, a linking pass
//! resolves `predecessors` into bidirectional `parents`/`children` edges
//! between definitions (between stage *types*, not run instances).

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::de::{Deserializer, Error as DeError};
use serde::Deserialize;

use crate::error::ConfigError;

/// One declared output of a pipeline stage.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputSpec {
    /// Output key in the engine's result map.
    pub output: String,
    /// Data object type minted for this output.
    pub data_object_type: String,
    /// File name template; `{id}` substitutes the activity id.
    #[serde(default)]
    pub name: String,
    /// Description template; `{id}` substitutes the activity id.
    #[serde(default)]
    pub description: String,
}

/// Static descriptor of one pipeline stage type.
///
/// Identity is `name`: two configs are equal iff their names match.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    pub name: String,
    /// Record family this stage reads/writes.
    pub collection: String,
    /// Stable schema type tag for records produced by this stage.
    #[serde(rename = "type", default)]
    pub type_tag: String,
    #[serde(default)]
    pub analyte_category: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub git_repo: String,
    /// Semantic version string; matched on major.minor only.
    #[serde(default)]
    pub version: String,
    /// Pipeline definition (WDL) reference within the release.
    #[serde(default)]
    pub wdl: String,
    /// Namespace prefix for engine input parameter names.
    #[serde(default)]
    pub input_prefix: String,
    /// Ordered parameter name -> literal, `{placeholder}`, or `do:<type>`
    /// reference. Document order is preserved.
    #[serde(default, deserialize_with = "ordered_inputs")]
    pub inputs: Vec<(String, serde_json::Value)>,
    /// Input names allowed to stay unresolved without failing the job.
    #[serde(default)]
    pub optional_inputs: Vec<String>,
    /// Data object types that must appear among a record's inputs.
    #[serde(default)]
    pub filter_input_objects: Vec<String>,
    /// Data object types that must appear among a record's outputs.
    #[serde(default)]
    pub filter_output_objects: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
    /// Names of stages that must precede this one.
    #[serde(default)]
    pub predecessors: Vec<String>,

    /// Resolved parent stage names; populated by the linking pass.
    #[serde(skip)]
    pub parents: Vec<String>,
    /// Resolved child stage names; populated by the linking pass.
    #[serde(skip)]
    pub children: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl PartialEq for WorkflowConfig {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for WorkflowConfig {}

impl std::hash::Hash for WorkflowConfig {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl WorkflowConfig {
    /// Generation stages are root-level: no predecessors, selected by
    /// analyte category. All others are execution stages.
    pub fn is_generation(&self) -> bool {
        self.predecessors.is_empty()
    }

    /// Workflow identity string recorded on job records.
    pub fn workflow_id(&self) -> String {
        format!("{}: {}", self.name, self.version)
    }
}

/// Deserializes a YAML mapping into ordered `(name, value)` pairs.
fn ordered_inputs<'de, D>(deserializer: D) -> Result<Vec<(String, serde_json::Value)>, D::Error>
where
    D: Deserializer<'de>,
{
    let mapping = serde_yaml::Mapping::deserialize(deserializer)?;
    let mut pairs = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = key
            .as_str()
            .ok_or_else(|| D::Error::custom("input names must be strings"))?
            .to_string();
        let value = serde_json::to_value(value).map_err(D::Error::custom)?;
        pairs.push((name, value));
    }
    Ok(pairs)
}

/// Root document of a workflow definitions file.
#[derive(Debug, Deserialize)]
struct WorkflowFile {
    workflows: Vec<WorkflowConfig>,
}

/// Immutable, linked set of workflow definitions, iterable in load order.
#[derive(Debug, Clone, Default)]
pub struct ConfigSet {
    by_name: HashMap<String, Arc<WorkflowConfig>>,
    order: Vec<String>,
}

impl ConfigSet {
    pub fn get(&self, name: &str) -> Option<&Arc<WorkflowConfig>> {
        self.by_name.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<WorkflowConfig>> {
        self.order.iter().filter_map(|name| self.by_name.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Root-level stages, selected by analyte category at graph-build time.
    pub fn generation_configs(&self) -> Vec<Arc<WorkflowConfig>> {
        self.iter().filter(|c| c.is_generation()).cloned().collect()
    }

    /// Non-root stages.
    pub fn execution_configs(&self) -> Vec<Arc<WorkflowConfig>> {
        self.iter().filter(|c| !c.is_generation()).cloned().collect()
    }
}

/// Parses workflow definitions from YAML and links predecessor edges.
///
/// Fails when the source is malformed, a name is duplicated, or a
/// definition references an unknown predecessor. No I/O beyond the source
/// string handed in.
pub fn load_configs(source: &str) -> Result<ConfigSet, ConfigError> {
    let file: WorkflowFile = serde_yaml::from_str(source)?;
    let mut configs = file.workflows;

    let mut seen = HashMap::new();
    for (idx, config) in configs.iter().enumerate() {
        if seen.insert(config.name.clone(), idx).is_some() {
            return Err(ConfigError::DuplicateName(config.name.clone()));
        }
    }

    for config in &configs {
        for predecessor in &config.predecessors {
            if !seen.contains_key(predecessor) {
                return Err(ConfigError::UnknownPredecessor {
                    workflow: config.name.clone(),
                    predecessor: predecessor.clone(),
                });
            }
        }
    }

    // O(n^2) linking pass: every pair where one names the other in
    // `predecessors` gets edges populated both ways.
    let names: Vec<String> = configs.iter().map(|c| c.name.clone()).collect();
    for i in 0..configs.len() {
        for j in 0..configs.len() {
            if i == j {
                continue;
            }
            if configs[i].predecessors.contains(&names[j]) {
                if !configs[i].parents.contains(&names[j]) {
                    configs[i].parents.push(names[j].clone());
                }
                if !configs[j].children.contains(&names[i]) {
                    configs[j].children.push(names[i].clone());
                }
            }
        }
    }

    let mut set = ConfigSet::default();
    for config in configs {
        set.order.push(config.name.clone());
        set.by_name.insert(config.name.clone(), Arc::new(config));
    }
    Ok(set)
}

/// Reads and links workflow definitions from a file path.
pub fn load_configs_from_path(path: &std::path::Path) -> Result<ConfigSet, ConfigError> {
    let source = std::fs::read_to_string(path)?;
    load_configs(&source)
}

static VERSION_RE: OnceLock<Regex> = OnceLock::new();

/// Extracts `(major, minor)` from the first `digits.digits` run in a
/// version string, tolerating prefixes and suffixes (`v1.0.3-beta`,
/// `b1.0.9`).
fn major_minor(version: &str) -> Option<(u64, u64)> {
    let re = VERSION_RE.get_or_init(|| Regex::new(r"(\d+)\.(\d+)").expect("static regex"));
    let captures = re.captures(version)?;
    let major = captures.get(1)?.as_str().parse().ok()?;
    let minor = captures.get(2)?.as_str().parse().ok()?;
    Some((major, minor))
}

/// True iff both versions carry the same major and minor, regardless of
/// patch level or pre-release suffix. Unparseable versions never match.
pub fn within_range(a: &str, b: &str) -> bool {
    match (major_minor(a), major_minor(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
