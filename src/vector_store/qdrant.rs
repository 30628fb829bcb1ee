// Qdrant-backed vector store (gRPC)
use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind, vectors_config, CollectionInfo, ScrollPointsBuilder, SearchPointsBuilder,
    Value as QdrantValue,
};
use qdrant_client::Qdrant;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeSet, HashMap};

use super::{Document, ScoreOrder, ScoredDocument, VectorStore};
use crate::config::StoreConfig;
use crate::errors::{Result, RetrievalError};

/// Points fetched per scroll request when scanning payloads
const SCROLL_PAGE: u32 = 256;

/// Vector store over a Qdrant collection configured with cosine distance
pub struct QdrantStore {
    client: Qdrant,
    url: String,
}

impl QdrantStore {
    /// Build a client; no request is sent until the first search
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key.clone())
            .build()
            .map_err(|e| RetrievalError::StoreFailure(format!("Failed to create Qdrant client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn info(&self, collection: &str) -> Result<Option<CollectionInfo>> {
        let response = self
            .client
            .collection_info(collection)
            .await
            .map_err(RetrievalError::store)?;
        Ok(response.result)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn name(&self) -> &str {
        "qdrant"
    }

    fn score_order(&self) -> ScoreOrder {
        // Qdrant reports cosine similarity, not distance
        ScoreOrder::HigherIsBetter
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector.to_vec(), k as u64).with_payload(true),
            )
            .await
            .map_err(|e| RetrievalError::StoreFailure(format!("search in {} failed: {}", collection, e)))?;

        let hits = response
            .result
            .into_iter()
            .map(|point| ScoredDocument {
                document: Document::from_payload(payload_to_json(point.payload)),
                score: point.score,
            })
            .collect();

        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let info = self.info(collection).await?;
        Ok(info.and_then(|r| r.points_count).unwrap_or(0))
    }

    async fn dimension(&self, collection: &str) -> Result<Option<usize>> {
        let info = self.info(collection).await?;
        Ok(info.as_ref().and_then(vector_size))
    }

    async fn distinct_values(&self, collection: &str, key: &str) -> Result<Vec<String>> {
        let mut values = BTreeSet::new();
        let mut offset = None;

        loop {
            let mut request = ScrollPointsBuilder::new(collection)
                .limit(SCROLL_PAGE)
                .with_payload(true)
                .with_vectors(false);
            if let Some(point) = offset.take() {
                request = request.offset(point);
            }

            let page = self
                .client
                .scroll(request)
                .await
                .map_err(|e| RetrievalError::StoreFailure(format!("scroll in {} failed: {}", collection, e)))?;

            for point in &page.result {
                if let Some(Kind::StringValue(value)) =
                    point.payload.get(key).and_then(|v| v.kind.as_ref())
                {
                    values.insert(value.clone());
                }
            }

            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(values.into_iter().collect())
    }
}

/// Size of the collection's single unnamed vector; named vectors report `None`
fn vector_size(info: &CollectionInfo) -> Option<usize> {
    let vectors = info.config.as_ref()?.params.as_ref()?.vectors_config.as_ref()?;
    match vectors.config.as_ref()? {
        vectors_config::Config::Params(params) => Some(params.size as usize),
        vectors_config::Config::ParamsMap(_) => None,
    }
}

fn payload_to_json(payload: HashMap<String, QdrantValue>) -> Map<String, JsonValue> {
    payload
        .into_iter()
        .filter_map(|(key, value)| qdrant_to_json_value(&value).map(|json| (key, json)))
        .collect()
}

fn qdrant_to_json_value(value: &QdrantValue) -> Option<JsonValue> {
    value.kind.as_ref().and_then(|kind| match kind {
        Kind::StringValue(s) => Some(JsonValue::String(s.clone())),
        Kind::IntegerValue(i) => Some(JsonValue::Number((*i).into())),
        Kind::DoubleValue(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number),
        Kind::BoolValue(b) => Some(JsonValue::Bool(*b)),
        Kind::NullValue(_) => Some(JsonValue::Null),
        Kind::ListValue(list) => Some(JsonValue::Array(
            list.values.iter().filter_map(qdrant_to_json_value).collect(),
        )),
        Kind::StructValue(inner) => Some(JsonValue::Object(
            inner
                .fields
                .iter()
                .filter_map(|(k, v)| qdrant_to_json_value(v).map(|json| (k.clone(), json)))
                .collect(),
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_conversion() {
        let mut payload = HashMap::new();
        payload.insert("document".to_string(), QdrantValue::from("Reserved Instances"));
        payload.insert("provider".to_string(), QdrantValue::from("AWS"));
        payload.insert("chunk".to_string(), QdrantValue::from(3i64));
        payload.insert("verified".to_string(), QdrantValue::from(true));

        let doc = Document::from_payload(payload_to_json(payload));
        assert_eq!(doc.content, "Reserved Instances");
        assert_eq!(doc.metadata["provider"], "AWS");
        assert_eq!(doc.metadata["chunk"], 3);
        assert_eq!(doc.metadata["verified"], true);
    }

    #[test]
    fn test_vector_size_from_collection_info() {
        use qdrant_client::qdrant::{CollectionConfig, CollectionParams, VectorParams, VectorsConfig};

        let info = CollectionInfo {
            config: Some(CollectionConfig {
                params: Some(CollectionParams {
                    vectors_config: Some(VectorsConfig {
                        config: Some(vectors_config::Config::Params(VectorParams {
                            size: 1536,
                            ..Default::default()
                        })),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(vector_size(&info), Some(1536));
        assert_eq!(vector_size(&CollectionInfo::default()), None);
    }

    #[test]
    fn test_client_creation_is_lazy() {
        let config = StoreConfig {
            url: "http://localhost:6334".to_string(),
            ..Default::default()
        };
        let store = QdrantStore::new(&config).unwrap();
        assert_eq!(store.url(), "http://localhost:6334");
        assert_eq!(store.score_order(), ScoreOrder::HigherIsBetter);
    }

    #[tokio::test]
    #[ignore] // Integration test - requires Qdrant
    async fn test_search_live_collection() {
        let store = QdrantStore::new(&StoreConfig::default()).unwrap();
        let count = store.count("cloud_cost_optimization").await.unwrap();
        let hits = store
            .search("cloud_cost_optimization", &vec![0.1; 1536], 5)
            .await
            .unwrap();
        assert!(hits.len() as u64 <= count.min(5));
    }
}
