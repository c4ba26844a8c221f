use signage_assets::{AssetError, AssetStore, InMemoryAssetStore, asset_locator};

#[tokio::test]
async fn put_get_list_delete() {
    let store = InMemoryAssetStore::new();
    store
        .put("v2", "lobby.mp4", vec![1, 2, 3])
        .await
        .expect("put");
    store.put("v1", "menu.mp4", vec![9]).await.expect("put");

    assert!(store.exists("v1").await.expect("exists"));
    let asset = store.get("v2").await.expect("get").expect("present");
    assert_eq!(asset.meta.size, 3);
    assert_eq!(asset.bytes, vec![1, 2, 3]);

    let ids: Vec<String> = store
        .list()
        .await
        .expect("list")
        .into_iter()
        .map(|meta| meta.id)
        .collect();
    assert_eq!(ids, vec!["v1".to_string(), "v2".to_string()]);

    assert!(store.delete("v1").await.expect("delete"));
    assert!(!store.delete("v1").await.expect("delete again"));
    assert!(store.get("v1").await.expect("get").is_none());
}

#[tokio::test]
async fn path_like_ids_are_rejected() {
    let store = InMemoryAssetStore::new();
    let err = store
        .put("../etc/passwd", "x", Vec::new())
        .await
        .expect_err("invalid");
    assert!(matches!(err, AssetError::InvalidId(_)));
}

#[test]
fn locator_joins_base_and_id() {
    assert_eq!(
        asset_locator("http://screens.local:3000/", "v1"),
        "http://screens.local:3000/api/assets/v1/file"
    );
}
