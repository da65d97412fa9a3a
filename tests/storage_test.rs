// Backend parity tests
// The same artifact tree is written to the local filesystem and to the
// in-memory object store; both must answer list/get/delete identically.

use bytes::Bytes;
use runvault_artifact::{
    ArtifactObject, ArtifactRepository, ErrorKind, InMemoryFactory, LocalFactory, StorageRegistry,
};
use std::sync::Arc;

const TREE: [(&str, usize); 4] = [
    ("metrics.json", 120),
    ("models/model.pkl", 4096),
    ("models/v2/weights.bin", 64),
    ("plots/loss.png", 10),
];

fn repository() -> ArtifactRepository {
    let mut registry = StorageRegistry::new();
    registry.register(InMemoryFactory::default());
    registry.register(LocalFactory::default());
    ArtifactRepository::new(Arc::new(registry))
}

async fn seed(repository: &ArtifactRepository, root: &str) {
    for (path, size) in TREE {
        repository
            .put(root, path, Bytes::from(vec![1u8; size]))
            .await
            .unwrap();
    }
}

async fn sorted_listing(repository: &ArtifactRepository, root: &str, path: &str) -> Vec<ArtifactObject> {
    let mut listing = repository.list(root, path).await.unwrap();
    listing.sort_by(|a, b| a.path.cmp(&b.path));
    listing
}

#[tokio::test]
async fn test_local_and_object_store_listings_match() {
    let dir = tempfile::tempdir().unwrap();
    let local_root = format!("file://{}", dir.path().display());
    let memory_root = "memory://bucket/team/exp1";

    let repository = repository();
    seed(&repository, &local_root).await;
    seed(&repository, memory_root).await;

    for path in ["", "models", "models/v2", "plots"] {
        let local = sorted_listing(&repository, &local_root, path).await;
        let memory = sorted_listing(&repository, memory_root, path).await;
        assert_eq!(local, memory, "listing of '{}'", path);
    }

    assert_eq!(
        sorted_listing(&repository, memory_root, "").await,
        vec![
            ArtifactObject::file("metrics.json", 120),
            ArtifactObject::dir("models"),
            ArtifactObject::dir("plots"),
        ]
    );
    assert_eq!(
        sorted_listing(&repository, memory_root, "models").await,
        vec![
            ArtifactObject::file("models/model.pkl", 4096),
            ArtifactObject::dir("models/v2"),
        ]
    );
}

#[tokio::test]
async fn test_listing_never_includes_queried_directory() {
    let dir = tempfile::tempdir().unwrap();
    let local_root = dir.path().display().to_string();
    let memory_root = "memory://bucket/exp1";

    let repository = repository();
    seed(&repository, &local_root).await;
    seed(&repository, memory_root).await;

    for root in [local_root.as_str(), memory_root] {
        for path in ["models", "models/", "./models"] {
            let listing = repository.list(root, path).await.unwrap();
            assert!(
                listing.iter().all(|object| object.path != "models"),
                "{} {}",
                root,
                path
            );
            assert_eq!(listing.len(), 2);
        }
    }
}

#[tokio::test]
async fn test_get_reads_same_bytes_from_every_backend() {
    let dir = tempfile::tempdir().unwrap();
    let local_root = dir.path().display().to_string();
    let memory_root = "memory://scratch/exp1".to_string();

    let repository = repository();
    seed(&repository, &local_root).await;
    seed(&repository, &memory_root).await;

    for root in [&local_root, &memory_root] {
        let bytes = repository
            .get(root, "models/v2/weights.bin")
            .await
            .unwrap()
            .read_to_end()
            .await
            .unwrap();
        assert_eq!(bytes.len(), 64, "{}", root);
    }
}

#[tokio::test]
async fn test_errors_share_one_taxonomy() {
    let dir = tempfile::tempdir().unwrap();
    let local_root = dir.path().display().to_string();
    let memory_root = "memory://bucket/exp1".to_string();

    let repository = repository();
    seed(&repository, &local_root).await;
    seed(&repository, &memory_root).await;

    for root in [&local_root, &memory_root] {
        let err = repository.get(root, "missing.txt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "{}", root);

        let err = repository.list(root, "../outside").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath, "{}", root);

        let err = repository.get(root, "models/../../x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath, "{}", root);
    }

    let err = repository.list("gs://bucket/exp1", "").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendInit);

    let err = repository.list("nosuch://bucket", "").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidUri);
}

#[tokio::test]
async fn test_get_on_directory_is_invalid_path_on_every_backend() {
    let dir = tempfile::tempdir().unwrap();
    let local_root = dir.path().display().to_string();
    let memory_root = "memory://bucket/exp1".to_string();

    let repository = repository();
    seed(&repository, &local_root).await;
    seed(&repository, &memory_root).await;

    for root in [&local_root, &memory_root] {
        for path in ["", ".", "models", "models/v2/"] {
            let err = repository.get(root, path).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidPath, "{} '{}'", root, path);
        }

        // A key sharing only a name prefix with a directory is still absent
        let err = repository.get(root, "model").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "{}", root);
    }
}

#[tokio::test]
async fn test_delete_directory_on_every_backend() {
    let dir = tempfile::tempdir().unwrap();
    let local_root = dir.path().display().to_string();
    let memory_root = "memory://bucket/exp1".to_string();

    let repository = repository();
    seed(&repository, &local_root).await;
    seed(&repository, &memory_root).await;

    for root in [&local_root, &memory_root] {
        repository.delete(root, "models").await.unwrap();
        // Deleting again is not an error
        repository.delete(root, "models").await.unwrap();

        let listing = sorted_listing(&repository, root, "").await;
        assert_eq!(
            listing,
            vec![
                ArtifactObject::file("metrics.json", 120),
                ArtifactObject::dir("plots"),
            ],
            "{}",
            root
        );
    }
}
