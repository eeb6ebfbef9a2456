//! Provenance graph construction.
//!
//! Builds a directed forest of process nodes from store records and
//! resolves parent/child edges through shared data objects, in explicit
//! passes:
//!
//! 1. build all nodes (generation first, then execution),
//! 2. build an output id -> producer index,
//! 3. resolve edges against the index.
//!
//! Nodes are rebuilt from store queries every scheduling cycle; only the
//! underlying records persist.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{within_range, ConfigSet, WorkflowConfig};
use crate::error::GraphError;
use crate::records::{DataObject, ProcessRecord, RecordKind, TypeRegistry};
use crate::store::DocumentStore;

/// One instantiated processing record, decorated with graph state.
#[derive(Debug, Clone)]
pub struct ProcessNode {
    pub id: String,
    pub kind: RecordKind,
    pub name: String,
    /// Data object ids consumed, in declared order.
    pub has_input: Vec<String>,
    /// Data object ids produced, in declared order.
    pub has_output: Vec<String>,
    /// Root lineage key; equals `id` for generation nodes.
    pub was_informed_by: String,
    pub version: Option<String>,
    pub git_url: Option<String>,
    pub config: Arc<WorkflowConfig>,
    /// Arena index of the parent node, when one was resolved.
    pub parent: Option<usize>,
    /// Arena indices of resolved children.
    pub children: Vec<usize>,
    /// Data objects this node produced, keyed by data object type.
    pub data_objects_by_type: HashMap<String, DataObject>,
}

impl ProcessNode {
    fn from_record(record: &ProcessRecord, kind: RecordKind, config: Arc<WorkflowConfig>) -> Self {
        let was_informed_by = match kind {
            // A generation record is its own lineage root.
            RecordKind::Generation => record.id.clone(),
            RecordKind::Execution => record.was_informed_by.clone().unwrap_or_default(),
        };
        Self {
            id: record.id.clone(),
            kind,
            name: record.name.clone(),
            has_input: record.has_input.clone(),
            has_output: record.has_output.clone(),
            was_informed_by,
            version: record.version.clone(),
            git_url: record.git_url.clone(),
            config,
            parent: None,
            children: Vec::new(),
            data_objects_by_type: HashMap::new(),
        }
    }
}

/// Arena of process nodes with index-based edges.
#[derive(Debug, Default)]
pub struct ProcessGraph {
    nodes: Vec<ProcessNode>,
}

impl ProcessGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn indices(&self) -> std::ops::Range<usize> {
        0..self.nodes.len()
    }

    pub fn node(&self, idx: usize) -> &ProcessNode {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[ProcessNode] {
        &self.nodes
    }

    pub fn find(&self, id: &str) -> Option<&ProcessNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Children of a node, resolved to node references.
    pub fn children_of(&self, idx: usize) -> impl Iterator<Item = &ProcessNode> {
        self.nodes[idx].children.iter().map(|&c| &self.nodes[c])
    }

    /// Walks from a node up through parent links: the node itself first,
    /// then each ancestor in order.
    pub fn ancestors(&self, idx: usize) -> impl Iterator<Item = &ProcessNode> {
        let mut current = Some(idx);
        std::iter::from_fn(move || {
            let idx = current?;
            current = self.nodes[idx].parent;
            Some(&self.nodes[idx])
        })
    }

    /// Accumulates produced data objects walking from a node up through its
    /// ancestors, overwriting on type collision.
    ///
    /// Closer ancestors are visited first, so on collision the most
    /// distant ancestor's object wins. This mirrors the established
    /// scheduling behavior and is kept as-is pending product-owner review.
    pub fn accumulate_data_objects(&self, idx: usize) -> HashMap<String, DataObject> {
        let mut accumulated = HashMap::new();
        for node in self.ancestors(idx) {
            for (object_type, object) in &node.data_objects_by_type {
                accumulated.insert(object_type.clone(), object.clone());
            }
        }
        accumulated
    }
}

/// Builds the provenance graph from store queries.
///
/// Holds the set of node ids already warned about for missing parents, so
/// the warning fires once per node id across cycles.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    warned_missing_parent: HashSet<String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the node forest for one scheduling cycle.
    ///
    /// `allowlist`, when present, restricts generation records to the given
    /// ids; execution records are then restricted transitively through
    /// lineage membership.
    pub async fn build(
        &mut self,
        store: &dyn DocumentStore,
        configs: &ConfigSet,
        allowlist: Option<&HashSet<String>>,
    ) -> Result<ProcessGraph, GraphError> {
        let generation_configs = configs.generation_configs();
        let execution_configs = configs.execution_configs();
        let analyte_category = single_analyte_category(&generation_configs)?;
        let registry = TypeRegistry::from_configs(configs);

        // Only data objects of a required type participate in filtering
        // and parent resolution.
        let required_types = required_object_types(configs);
        let objects_by_id: HashMap<String, DataObject> = store
            .data_objects_by_type(&required_types)
            .await?
            .into_iter()
            .map(|o| (o.id.clone(), o))
            .collect();

        let mut graph = ProcessGraph::default();
        let mut retained_roots = HashSet::new();

        // Pass 1a: generation nodes. Their own id is the lineage root.
        for config in &generation_configs {
            let records = store
                .generation_records(&config.collection, &analyte_category, allowlist)
                .await?;
            for record in records {
                let kind = match registry.classify(&record) {
                    Ok((kind, _)) => kind,
                    Err(err) => {
                        warn!(record = %record.id, error = %err, "Skipping untypable record");
                        continue;
                    }
                };
                if is_missing_required_objects(&record, config, &objects_by_id) {
                    debug!(
                        record = %record.id,
                        workflow = %config.name,
                        "Dropping record missing required input/output object types"
                    );
                    continue;
                }
                retained_roots.insert(record.id.clone());
                graph
                    .nodes
                    .push(ProcessNode::from_record(&record, kind, config.clone()));
            }
        }

        // Pass 1b: execution nodes, gated on version range and retained
        // lineage. An active allowlist selects by lineage membership
        // instead of repository URL, so runs recorded under an older repo
        // URL still count as done.
        for config in &execution_configs {
            let records = if allowlist.is_some() {
                store
                    .execution_records_for_lineage(
                        &config.collection,
                        &config.type_tag,
                        &retained_roots,
                    )
                    .await?
            } else {
                store
                    .execution_records(&config.collection, &config.git_repo)
                    .await?
            };
            for record in records {
                let kind = match registry.classify(&record) {
                    Ok((kind, _)) => kind,
                    Err(err) => {
                        warn!(record = %record.id, error = %err, "Skipping untypable record");
                        continue;
                    }
                };
                let version_ok = record
                    .version
                    .as_deref()
                    .is_some_and(|v| within_range(v, &config.version));
                if !version_ok {
                    debug!(
                        record = %record.id,
                        record_version = record.version.as_deref().unwrap_or(""),
                        config_version = %config.version,
                        "Dropping record outside configured version range"
                    );
                    continue;
                }
                if is_missing_required_objects(&record, config, &objects_by_id) {
                    debug!(
                        record = %record.id,
                        workflow = %config.name,
                        "Dropping record missing required input/output object types"
                    );
                    continue;
                }
                let Some(root) = record.was_informed_by.as_deref() else {
                    debug!(record = %record.id, "Dropping record with no lineage key");
                    continue;
                };
                if !retained_roots.contains(root) {
                    continue;
                }
                graph
                    .nodes
                    .push(ProcessNode::from_record(&record, kind, config.clone()));
            }
        }

        // Pass 2: output id -> producer index. A duplicate producer nulls
        // the claim so no consumer links to the wrong parent.
        let mut producer_by_object: HashMap<String, Option<usize>> = HashMap::new();
        for idx in 0..graph.nodes.len() {
            for output_id in graph.nodes[idx].has_output.clone() {
                match producer_by_object.entry(output_id.clone()) {
                    std::collections::hash_map::Entry::Vacant(entry) => {
                        entry.insert(Some(idx));
                    }
                    std::collections::hash_map::Entry::Occupied(mut entry) => {
                        warn!(
                            data_object = %output_id,
                            node = %graph.nodes[idx].id,
                            "Data object produced by more than one record; ignoring it for parent resolution"
                        );
                        entry.insert(None);
                    }
                }
                if let Some(object) = objects_by_id.get(&output_id) {
                    graph.nodes[idx]
                        .data_objects_by_type
                        .insert(object.data_object_type.clone(), object.clone());
                }
            }
        }

        // Pass 3: parent resolution. First input id (declared order) whose
        // producer exists, is a configured parent stage, and shares the
        // lineage key wins; scanning stops at the first match.
        let mut edges = Vec::new();
        for idx in 0..graph.nodes.len() {
            let node = &graph.nodes[idx];
            if node.config.parents.is_empty() {
                continue;
            }
            let mut parent = None;
            for input_id in &node.has_input {
                let Some(Some(producer_idx)) = producer_by_object.get(input_id) else {
                    continue;
                };
                let producer = &graph.nodes[*producer_idx];
                if node.config.parents.contains(&producer.config.name)
                    && producer.was_informed_by == node.was_informed_by
                {
                    parent = Some(*producer_idx);
                    break;
                }
            }
            match parent {
                Some(parent_idx) => edges.push((idx, parent_idx)),
                None => {
                    if self.warned_missing_parent.insert(node.id.clone()) {
                        warn!(
                            node = %node.id,
                            workflow = %node.config.name,
                            "No qualifying parent found among declared inputs"
                        );
                    }
                }
            }
        }
        for (child, parent) in edges {
            graph.nodes[child].parent = Some(parent);
            graph.nodes[parent].children.push(child);
        }

        Ok(graph)
    }
}

/// The single analyte category the generation configs agree on. Zero or
/// several distinct categories is a configuration error, fatal for the
/// call.
fn single_analyte_category(
    generation_configs: &[Arc<WorkflowConfig>],
) -> Result<String, GraphError> {
    let categories: HashSet<&str> = generation_configs
        .iter()
        .map(|c| c.analyte_category.as_str())
        .filter(|c| !c.is_empty())
        .collect();
    match categories.len() {
        1 => Ok(categories.into_iter().next().unwrap_or_default().to_string()),
        0 => Err(GraphError::Configuration(
            "No analyte category declared by generation workflows".to_string(),
        )),
        n => Err(GraphError::Configuration(format!(
            "Generation workflows span {} analyte categories; exactly one is required",
            n
        ))),
    }
}

/// Union of all required data object types across the loaded configs.
fn required_object_types(configs: &ConfigSet) -> Vec<String> {
    let mut types = HashSet::new();
    for config in configs.iter() {
        types.extend(config.filter_input_objects.iter().cloned());
        types.extend(config.filter_output_objects.iter().cloned());
    }
    let mut types: Vec<String> = types.into_iter().collect();
    types.sort();
    types
}

/// A record passes only when, for both its input and output id lists,
/// every required type resolves among the known data objects. An empty
/// filter is vacuously satisfied; an empty id list against a non-empty
/// filter fails.
fn is_missing_required_objects(
    record: &ProcessRecord,
    config: &WorkflowConfig,
    objects_by_id: &HashMap<String, DataObject>,
) -> bool {
    missing_types(&record.has_input, &config.filter_input_objects, objects_by_id)
        || missing_types(
            &record.has_output,
            &config.filter_output_objects,
            objects_by_id,
        )
}

fn missing_types(
    ids: &[String],
    required: &[String],
    objects_by_id: &HashMap<String, DataObject>,
) -> bool {
    if required.is_empty() {
        return false;
    }
    if ids.is_empty() {
        return true;
    }
    let present: HashSet<&str> = ids
        .iter()
        .filter_map(|id| objects_by_id.get(id))
        .map(|o| o.data_object_type.as_str())
        .collect();
    required.iter().any(|t| !present.contains(t.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_configs;
    use crate::store::MemStore;

    const CONFIGS: &str = r#"
workflows:
  - name: Sequencing
    collection: data_generation_set
    type: "nmdc:NucleotideSequencing"
    analyte_category: metagenome
    filter_output_objects:
      - Metagenome Raw Reads

  - name: Reads QC
    collection: workflow_execution_set
    type: "nmdc:ReadQcAnalysis"
    git_repo: https://example.org/readsqc
    version: v1.0.14
    filter_input_objects:
      - Metagenome Raw Reads
    filter_output_objects:
      - Filtered Sequencing Reads
    predecessors:
      - Sequencing
"#;

    fn data_object(id: &str, object_type: &str) -> DataObject {
        DataObject {
            id: id.to_string(),
            name: format!("{}.bin", id),
            description: String::new(),
            url: format!("https://data.example.org/{}", id),
            md5_checksum: String::new(),
            file_size_bytes: 1,
            data_object_type: object_type.to_string(),
        }
    }

    fn generation_record(id: &str, outputs: &[&str]) -> ProcessRecord {
        ProcessRecord {
            id: id.to_string(),
            type_tag: "nmdc:NucleotideSequencing".to_string(),
            name: String::new(),
            has_input: vec![],
            has_output: outputs.iter().map(|s| s.to_string()).collect(),
            was_informed_by: None,
            analyte_category: Some("metagenome".to_string()),
            version: None,
            git_url: None,
            started_at_time: None,
            ended_at_time: None,
            execution_resource: None,
        }
    }

    fn execution_record(
        id: &str,
        informed_by: &str,
        version: &str,
        inputs: &[&str],
        outputs: &[&str],
    ) -> ProcessRecord {
        ProcessRecord {
            id: id.to_string(),
            type_tag: "nmdc:ReadQcAnalysis".to_string(),
            name: String::new(),
            has_input: inputs.iter().map(|s| s.to_string()).collect(),
            has_output: outputs.iter().map(|s| s.to_string()).collect(),
            was_informed_by: Some(informed_by.to_string()),
            analyte_category: None,
            version: Some(version.to_string()),
            git_url: Some("https://example.org/readsqc".to_string()),
            started_at_time: None,
            ended_at_time: None,
            execution_resource: None,
        }
    }

    fn seeded_store() -> MemStore {
        let store = MemStore::new();
        store.add_data_object(data_object("nmdc:dobj-raw", "Metagenome Raw Reads"));
        store.add_data_object(data_object("nmdc:dobj-filtered", "Filtered Sequencing Reads"));
        store.add_record(
            "data_generation_set",
            generation_record("nmdc:omprc-1", &["nmdc:dobj-raw"]),
        );
        store
    }

    #[tokio::test]
    async fn test_generation_node_is_its_own_lineage_root() {
        let configs = load_configs(CONFIGS).unwrap();
        let store = seeded_store();
        let graph = GraphBuilder::new()
            .build(&store, &configs, None)
            .await
            .unwrap();
        assert_eq!(graph.len(), 1);
        let node = graph.node(0);
        assert_eq!(node.id, "nmdc:omprc-1");
        assert_eq!(node.was_informed_by, "nmdc:omprc-1");
        assert_eq!(node.kind, RecordKind::Generation);
        assert!(node.parent.is_none());
    }

    #[tokio::test]
    async fn test_child_links_to_parent_through_shared_object() {
        let configs = load_configs(CONFIGS).unwrap();
        let store = seeded_store();
        store.add_record(
            "workflow_execution_set",
            execution_record(
                "nmdc:wfrqc-1.1",
                "nmdc:omprc-1",
                "v1.0.2",
                &["nmdc:dobj-raw"],
                &["nmdc:dobj-filtered"],
            ),
        );

        let graph = GraphBuilder::new()
            .build(&store, &configs, None)
            .await
            .unwrap();
        assert_eq!(graph.len(), 2);
        let child = graph.find("nmdc:wfrqc-1.1").unwrap();
        let parent_idx = child.parent.expect("child should have a parent");
        assert_eq!(graph.node(parent_idx).id, "nmdc:omprc-1");
        assert_eq!(
            graph.children_of(parent_idx).map(|n| n.id.as_str()).collect::<Vec<_>>(),
            vec!["nmdc:wfrqc-1.1"]
        );
    }

    #[tokio::test]
    async fn test_version_out_of_range_is_dropped() {
        let configs = load_configs(CONFIGS).unwrap();
        let store = seeded_store();
        store.add_record(
            "workflow_execution_set",
            execution_record(
                "nmdc:wfrqc-old",
                "nmdc:omprc-1",
                "v0.9.8",
                &["nmdc:dobj-raw"],
                &["nmdc:dobj-filtered"],
            ),
        );

        let graph = GraphBuilder::new()
            .build(&store, &configs, None)
            .await
            .unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.find("nmdc:wfrqc-old").is_none());
    }

    #[tokio::test]
    async fn test_missing_required_output_type_drops_generation_record() {
        let configs = load_configs(CONFIGS).unwrap();
        let store = MemStore::new();
        // Record has an output id, but it resolves to no known object.
        store.add_record(
            "data_generation_set",
            generation_record("nmdc:omprc-bare", &["nmdc:dobj-unknown"]),
        );
        // Record with no outputs at all against a non-empty filter.
        store.add_record(
            "data_generation_set",
            generation_record("nmdc:omprc-empty", &[]),
        );

        let graph = GraphBuilder::new()
            .build(&store, &configs, None)
            .await
            .unwrap();
        assert!(graph.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_output_blocks_parent_resolution() {
        let configs = load_configs(CONFIGS).unwrap();
        let store = seeded_store();
        // Two generation records both claim the raw reads object.
        store.add_record(
            "data_generation_set",
            generation_record("nmdc:omprc-2", &["nmdc:dobj-raw"]),
        );
        store.add_record(
            "workflow_execution_set",
            execution_record(
                "nmdc:wfrqc-1.1",
                "nmdc:omprc-1",
                "v1.0.2",
                &["nmdc:dobj-raw"],
                &["nmdc:dobj-filtered"],
            ),
        );

        let graph = GraphBuilder::new()
            .build(&store, &configs, None)
            .await
            .unwrap();
        let child = graph.find("nmdc:wfrqc-1.1").unwrap();
        assert!(child.parent.is_none());
    }

    #[tokio::test]
    async fn test_unretained_lineage_root_drops_execution_record() {
        let configs = load_configs(CONFIGS).unwrap();
        let store = seeded_store();
        store.add_record(
            "workflow_execution_set",
            execution_record(
                "nmdc:wfrqc-orphan",
                "nmdc:omprc-gone",
                "v1.0.2",
                &["nmdc:dobj-raw"],
                &["nmdc:dobj-filtered"],
            ),
        );

        let graph = GraphBuilder::new()
            .build(&store, &configs, None)
            .await
            .unwrap();
        assert!(graph.find("nmdc:wfrqc-orphan").is_none());
    }

    #[tokio::test]
    async fn test_allowlist_restricts_generation_and_lineage() {
        let configs = load_configs(CONFIGS).unwrap();
        let store = seeded_store();
        store.add_data_object(data_object("nmdc:dobj-raw2", "Metagenome Raw Reads"));
        store.add_record(
            "data_generation_set",
            generation_record("nmdc:omprc-2", &["nmdc:dobj-raw2"]),
        );
        store.add_record(
            "workflow_execution_set",
            execution_record(
                "nmdc:wfrqc-2.1",
                "nmdc:omprc-2",
                "v1.0.2",
                &["nmdc:dobj-raw2"],
                &[],
            ),
        );

        let allowlist: HashSet<String> = ["nmdc:omprc-1".to_string()].into_iter().collect();
        let graph = GraphBuilder::new()
            .build(&store, &configs, Some(&allowlist))
            .await
            .unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.node(0).id, "nmdc:omprc-1");
    }

    #[tokio::test]
    async fn test_allowlist_selects_executions_by_lineage_not_git_url() {
        let configs = load_configs(CONFIGS).unwrap();
        let store = seeded_store();
        // A finished run recorded under an older repository URL; the
        // version is still in range and the lineage root is allowlisted.
        let mut record = execution_record(
            "nmdc:wfrqc-1.1",
            "nmdc:omprc-1",
            "v1.0.2",
            &["nmdc:dobj-raw"],
            &["nmdc:dobj-filtered"],
        );
        record.git_url = Some("https://old.example.org/readsqc".to_string());
        store.add_record("workflow_execution_set", record);

        let allowlist: HashSet<String> = ["nmdc:omprc-1".to_string()].into_iter().collect();
        let graph = GraphBuilder::new()
            .build(&store, &configs, Some(&allowlist))
            .await
            .unwrap();

        assert_eq!(graph.len(), 2);
        let child = graph.find("nmdc:wfrqc-1.1").unwrap();
        assert!(child.parent.is_some());
        assert_eq!(graph.node(0).id, "nmdc:omprc-1");
        assert_eq!(
            graph.children_of(0).map(|n| n.id.as_str()).collect::<Vec<_>>(),
            vec!["nmdc:wfrqc-1.1"]
        );
    }

    #[tokio::test]
    async fn test_build_is_idempotent_within_a_cycle() {
        let configs = load_configs(CONFIGS).unwrap();
        let store = seeded_store();
        store.add_record(
            "workflow_execution_set",
            execution_record(
                "nmdc:wfrqc-1.1",
                "nmdc:omprc-1",
                "v1.0.2",
                &["nmdc:dobj-raw"],
                &["nmdc:dobj-filtered"],
            ),
        );

        let mut builder = GraphBuilder::new();
        let first = builder.build(&store, &configs, None).await.unwrap();
        let second = builder.build(&store, &configs, None).await.unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.nodes().iter().zip(second.nodes()) {
            assert_eq!(a.id, b.id);
            assert_eq!(
                a.parent.map(|p| first.node(p).id.clone()),
                b.parent.map(|p| second.node(p).id.clone())
            );
        }
    }

    #[tokio::test]
    async fn test_empty_or_ambiguous_analyte_category_is_fatal() {
        let store = MemStore::new();
        let none = load_configs(
            r#"
workflows:
  - name: Bare
    collection: data_generation_set
    type: "nmdc:NucleotideSequencing"
"#,
        )
        .unwrap();
        let err = GraphBuilder::new().build(&store, &none, None).await;
        assert!(matches!(err, Err(GraphError::Configuration(_))));

        let two = load_configs(
            r#"
workflows:
  - name: A
    collection: data_generation_set
    type: "nmdc:NucleotideSequencing"
    analyte_category: metagenome
  - name: B
    collection: data_generation_set
    type: "nmdc:MetatranscriptomeSequencing"
    analyte_category: metatranscriptome
"#,
        )
        .unwrap();
        let err = GraphBuilder::new().build(&store, &two, None).await;
        assert!(matches!(err, Err(GraphError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_unknown_record_type_skips_only_that_record() {
        let configs = load_configs(CONFIGS).unwrap();
        let store = seeded_store();
        let mut stray = generation_record("nmdc:omprc-stray", &["nmdc:dobj-raw"]);
        stray.type_tag = "nmdc:Mystery".to_string();
        store.add_record("data_generation_set", stray);

        let graph = GraphBuilder::new()
            .build(&store, &configs, None)
            .await
            .unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.find("nmdc:omprc-stray").is_none());
    }

    #[test]
    fn test_accumulate_prefers_most_distant_ancestor() {
        // Two nodes, child -> parent, both producing the same object type.
        let configs = load_configs(CONFIGS).unwrap();
        let sequencing = configs.get("Sequencing").unwrap().clone();
        let readsqc = configs.get("Reads QC").unwrap().clone();

        let mut parent = ProcessNode::from_record(
            &generation_record("nmdc:omprc-1", &[]),
            RecordKind::Generation,
            sequencing,
        );
        parent
            .data_objects_by_type
            .insert("Shared Type".to_string(), data_object("nmdc:far", "Shared Type"));

        let mut child = ProcessNode::from_record(
            &execution_record("nmdc:wfrqc-1.1", "nmdc:omprc-1", "v1.0.2", &[], &[]),
            RecordKind::Execution,
            readsqc,
        );
        child
            .data_objects_by_type
            .insert("Shared Type".to_string(), data_object("nmdc:near", "Shared Type"));
        child.parent = Some(0);

        let mut graph = ProcessGraph::default();
        parent.children.push(1);
        graph.nodes.push(parent);
        graph.nodes.push(child);

        let accumulated = graph.accumulate_data_objects(1);
        assert_eq!(accumulated["Shared Type"].id, "nmdc:far");
    }
}
