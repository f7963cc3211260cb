use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use stepflow_core::definition::GraphDefinition;
use stepflow_core::types::{GraphId, RunId};
use stepflow_engine::Graph;

use crate::protocol::RunRecord;

/// A built graph plus the name and definition it was created from.
#[derive(Clone)]
pub struct StoredGraph {
    pub name: String,
    pub definition: GraphDefinition,
    pub graph: Arc<Graph>,
}

/// In-memory storage for graphs and run records. Nothing is persisted.
#[derive(Default)]
pub struct MemoryStore {
    graphs: RwLock<HashMap<GraphId, StoredGraph>>,
    runs: RwLock<HashMap<RunId, RunRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a graph under a fresh id.
    pub async fn save_graph(&self, name: String, definition: GraphDefinition, graph: Graph) -> GraphId {
        let id = GraphId::new();
        let stored = StoredGraph {
            name,
            definition,
            graph: Arc::new(graph),
        };
        self.graphs.write().await.insert(id.clone(), stored);
        id
    }

    pub async fn get_graph(&self, id: &GraphId) -> Option<StoredGraph> {
        self.graphs.read().await.get(id).cloned()
    }

    /// Graph ids mapped to names.
    pub async fn list_graphs(&self) -> BTreeMap<String, String> {
        self.graphs
            .read()
            .await
            .iter()
            .map(|(id, g)| (id.to_string(), g.name.clone()))
            .collect()
    }

    pub async fn save_run(&self, id: RunId, record: RunRecord) {
        self.runs.write().await.insert(id, record);
    }

    pub async fn get_run(&self, id: &RunId) -> Option<RunRecord> {
        self.runs.read().await.get(id).cloned()
    }
}
