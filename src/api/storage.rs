use crate::config::StorageConfig;

/// Resolves stored object paths (product images) to public URLs.
#[derive(Debug, Clone)]
pub struct ObjectStorage {
    base_url: String,
    bucket: String,
}

impl ObjectStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            bucket: config.bucket.trim_matches('/').to_string(),
        }
    }

    pub fn public_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> ObjectStorage {
        ObjectStorage::new(&StorageConfig {
            url: "https://cdn.example.com/".into(),
            bucket: "products".into(),
        })
    }

    #[test]
    fn relative_paths_land_in_the_public_bucket() {
        assert_eq!(
            storage().public_url("/gayo/natural.jpg"),
            "https://cdn.example.com/storage/v1/object/public/products/gayo/natural.jpg"
        );
    }

    #[test]
    fn absolute_urls_are_left_alone() {
        assert_eq!(
            storage().public_url("https://images.example.com/toraja.png"),
            "https://images.example.com/toraja.png"
        );
    }
}
