// Catalog domain model - What the metrics service can count
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSource {
    pub source: String,
    pub count: u64,
}

impl VideoSource {
    pub fn new(source: String, count: u64) -> Self {
        Self { source, count }
    }
}
