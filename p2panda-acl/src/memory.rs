// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::traits::PolicyStore;

#[derive(Clone, Debug)]
struct StoredDocument {
    bytes: Vec<u8>,
    content_type: String,
}

/// In-memory policy store.
///
/// Clones share the same documents.
#[derive(Clone, Debug, Default)]
pub struct MemoryPolicyStore {
    documents: Arc<RwLock<BTreeMap<String, StoredDocument>>>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type the document at this url was stored with.
    pub async fn content_type(&self, url: &str) -> Option<String> {
        let documents = self.documents.read().await;
        documents
            .get(url)
            .map(|document| document.content_type.clone())
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

impl PolicyStore for MemoryPolicyStore {
    type Error = Infallible;

    async fn get(&self, url: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let documents = self.documents.read().await;
        Ok(documents.get(url).map(|document| document.bytes.clone()))
    }

    async fn put(
        &self,
        url: &str,
        document: Vec<u8>,
        content_type: &str,
    ) -> Result<(), Self::Error> {
        let mut documents = self.documents.write().await;
        documents.insert(
            url.to_string(),
            StoredDocument {
                bytes: document,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete(&self, url: &str) -> Result<bool, Self::Error> {
        let mut documents = self.documents.write().await;
        Ok(documents.remove(url).is_some())
    }
}

#[cfg(test)]
mod tests {
    use crate::traits::PolicyStore;

    use super::MemoryPolicyStore;

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemoryPolicyStore::new();
        assert!(store.is_empty().await);
        assert_eq!(store.get("https://example.org/.acl").await.unwrap(), None);

        store
            .put("https://example.org/.acl", vec![1, 2, 3], "application/cbor")
            .await
            .unwrap();
        assert_eq!(
            store.get("https://example.org/.acl").await.unwrap(),
            Some(vec![1, 2, 3])
        );
        assert_eq!(
            store.content_type("https://example.org/.acl").await.as_deref(),
            Some("application/cbor")
        );

        // Clones share their documents.
        let clone = store.clone();
        assert_eq!(clone.len().await, 1);

        assert!(store.delete("https://example.org/.acl").await.unwrap());
        assert!(!clone.delete("https://example.org/.acl").await.unwrap());
        assert!(clone.is_empty().await);
    }
}
