//! Global constants for memory-core
//!
//! This module centralizes all magic numbers and string constants used throughout
//! the memory system, making them easier to maintain and configure.

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    // Embedding
    pub const EMBEDDING_DIMENSION: usize = 1536;

    // Working memory
    pub const WORKING_MEMORY_CAPACITY: usize = 10;
    pub const CRITICAL_IMPORTANCE_FLOOR: f32 = 0.8;

    // Graph traversal
    pub const MIN_NEIGHBOR_DEPTH: u32 = 1;
    pub const MAX_NEIGHBOR_DEPTH: u32 = 5;
    pub const MIN_PATH_DEPTH: u32 = 1;
    pub const MAX_PATH_DEPTH: u32 = 10;
    pub const MAX_PATHS_RETURNED: usize = 10;
    pub const PATHFINDING_STATEMENT_TIMEOUT: Duration = Duration::from_secs(1);

    // Decay / IEF
    pub const RELEVANCE_STRENGTH_BASE: f64 = 100.0;
    pub const RELEVANCE_STRENGTH_FLOOR_HIGH: f64 = 200.0;
    pub const RELEVANCE_STRENGTH_FLOOR_MEDIUM: f64 = 100.0;
    pub const RECENCY_DECAY_DAYS: f64 = 30.0;
    pub const IEF_WEIGHT_RELEVANCE: f64 = 0.30;
    pub const IEF_WEIGHT_SIMILARITY: f64 = 0.25;
    pub const IEF_WEIGHT_RECENCY: f64 = 0.20;
    pub const IEF_WEIGHT_CONSTITUTIVE: f64 = 0.25;
    pub const IEF_CONSTITUTIVE_WEIGHT_FLOOR: f64 = 1.5;
    pub const IEF_DESCRIPTIVE_CONSTITUTIVE_WEIGHT: f64 = 1.0;
    pub const IEF_NUANCE_PENALTY: f64 = 0.1;
    pub const IEF_MIN_SCORE: f64 = 0.0;
    pub const IEF_MAX_SCORE: f64 = 1.5;
    pub const FEEDBACK_RECALIBRATION_THRESHOLD: u64 = 50;

    // Hybrid retrieval
    pub const RRF_K: f64 = 60.0;
    pub const DEFAULT_TOP_K: usize = 5;
    pub const MAX_TOP_K: usize = 100;
    pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.6;
    pub const DEFAULT_KEYWORD_WEIGHT: f64 = 0.2;
    pub const DEFAULT_GRAPH_WEIGHT: f64 = 0.2;
    pub const RELATIONAL_SEMANTIC_WEIGHT: f64 = 0.4;
    pub const RELATIONAL_KEYWORD_WEIGHT: f64 = 0.2;
    pub const RELATIONAL_GRAPH_WEIGHT: f64 = 0.4;
    pub const GRAPH_SEARCH_HOPS: u32 = 2;

    // Insight fidelity
    pub const DEFAULT_MEMORY_STRENGTH: f32 = 0.5;
    pub const DEFAULT_FIDELITY_THRESHOLD: f32 = 0.5;

    // Retry / resilience
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

    // Watchdog / lifecycle
    pub const WATCHDOG_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
}

/// Error messages
pub mod errors {
    pub const NODE_NOT_FOUND: &str = "Node not found";
    pub const EDGE_NOT_FOUND: &str = "Edge not found";
    pub const INSIGHT_NOT_FOUND: &str = "Insight not found";
    pub const EPISODE_NOT_FOUND: &str = "Episode not found";
    pub const WORKING_MEMORY_ITEM_NOT_FOUND: &str = "Working memory item not found";
    pub const INVALID_NODE_ID: &str = "Invalid node ID format";
    pub const INVALID_EDGE_ID: &str = "Invalid edge ID format";
    pub const STORAGE_CONNECTION_FAILED: &str = "Failed to connect to storage backend";
    pub const SERIALIZATION_FAILED: &str = "Failed to serialize data";
    pub const DESERIALIZATION_FAILED: &str = "Failed to deserialize data";
    pub const EMBEDDING_GENERATION_FAILED: &str = "Failed to generate embedding";
    pub const PARAMETER_VALIDATION_FAILED: &str = "Parameter validation failed";
}

/// Log messages and prefixes
pub mod logging {
    pub const LOG_PREFIX_GRAPH: &str = "[GRAPH]";
    pub const LOG_PREFIX_HYBRID: &str = "[HYBRID]";
    pub const LOG_PREFIX_WORKING_MEMORY: &str = "[WORKING_MEMORY]";
    pub const LOG_PREFIX_AUDIT: &str = "[AUDIT]";
    pub const LOG_PREFIX_STORAGE: &str = "[STORAGE]";
    pub const LOG_PREFIX_EMBEDDING: &str = "[EMBEDDING]";
}

/// File paths and extensions
pub mod paths {
    pub const DEFAULT_DATA_DIR: &str = "./data";
    pub const DEFAULT_LOG_DIR: &str = "./logs";

    pub const DB_FILE_EXTENSION: &str = ".db";
    pub const REDB_FILE_EXTENSION: &str = ".redb";
}

/// Database table and column names
pub mod db {
    pub const TABLE_NODES: &str = "nodes";
    pub const TABLE_EDGES: &str = "edges";
    pub const TABLE_INSIGHTS: &str = "insights";
    pub const TABLE_EPISODES: &str = "episodes";
    pub const TABLE_RAW_DIALOGUE: &str = "raw_dialogue";
    pub const TABLE_WORKING_MEMORY: &str = "working_memory";
    pub const TABLE_STALE_MEMORY: &str = "stale_memory";
    pub const TABLE_AUDIT_LOG: &str = "audit_log";
    pub const TABLE_NUANCE_REVIEWS: &str = "nuance_reviews";
    pub const TABLE_PROJECT_REGISTRY: &str = "project_registry";
    pub const TABLE_READ_PERMISSIONS: &str = "read_permissions";

    pub const COL_ID: &str = "id";
    pub const COL_PROJECT_ID: &str = "project_id";
    pub const COL_CREATED_AT: &str = "created_at";
}

/// HTTP and API constants
pub mod api {
    pub const DEFAULT_API_TIMEOUT_SECONDS: u64 = 30;
    pub const DEFAULT_MAX_RETRIES: usize = 3;

    /// User agent sent with embedding-provider HTTP requests.
    pub const USER_AGENT: &str = concat!("memory-core/", env!("CARGO_PKG_VERSION"));
}

/// Feature flags (for conditional compilation)
pub mod features {
    #[cfg(feature = "http-embeddings")]
    pub const HTTP_EMBEDDINGS_ENABLED: bool = true;
    #[cfg(not(feature = "http-embeddings"))]
    pub const HTTP_EMBEDDINGS_ENABLED: bool = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ief_weights_sum_to_one() {
        let sum = defaults::IEF_WEIGHT_RELEVANCE
            + defaults::IEF_WEIGHT_SIMILARITY
            + defaults::IEF_WEIGHT_RECENCY
            + defaults::IEF_WEIGHT_CONSTITUTIVE;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn depth_bounds_are_sane() {
        assert!(defaults::MIN_NEIGHBOR_DEPTH <= defaults::MAX_NEIGHBOR_DEPTH);
        assert!(defaults::MIN_PATH_DEPTH <= defaults::MAX_PATH_DEPTH);
    }

    #[test]
    fn error_messages_not_empty() {
        assert!(!errors::NODE_NOT_FOUND.is_empty());
        assert!(!errors::EDGE_NOT_FOUND.is_empty());
        assert!(!errors::STORAGE_CONNECTION_FAILED.is_empty());
    }
}
