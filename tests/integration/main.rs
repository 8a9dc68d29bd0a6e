//! Integration tests for Repodex

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn repodex() -> Command {
        cargo_bin_cmd!("repodex")
    }

    /// Config with a private state dir and one hosted store in a group
    fn write_config(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("config.toml");
        let state = dir.join("state");
        std::fs::write(
            &path,
            format!(
                r#"
[general]
state_dir = "{}"

[[stores]]
key = "maven:hosted:local"

[[stores]]
key = "maven:group:public"
constituents = ["maven:hosted:local"]
"#,
                state.display()
            ),
        )
        .unwrap();
        path
    }

    #[test]
    fn help_displays() {
        repodex()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("artifact repository content index"));
    }

    #[test]
    fn version_displays() {
        repodex()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("repodex"));
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("custom.toml");
        repodex()
            .args(["--config", config.to_str().unwrap(), "config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());
        repodex()
            .args(["--config", config.to_str().unwrap(), "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"));
    }

    #[test]
    fn stores_list() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());
        repodex()
            .args(["--config", config.to_str().unwrap(), "stores", "list", "-f", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("maven:hosted:local"))
            .stdout(predicate::str::contains("maven:group:public"));
    }

    #[test]
    fn put_then_get_through_group() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());
        let upload = dir.path().join("widget-1.0.pom");
        std::fs::write(&upload, "<project>widget</project>").unwrap();

        repodex()
            .args([
                "--config",
                config.to_str().unwrap(),
                "put",
                "maven:hosted:local",
                "org/example/widget/1.0/widget-1.0.pom",
                upload.to_str().unwrap(),
            ])
            .assert()
            .success();

        repodex()
            .args([
                "--config",
                config.to_str().unwrap(),
                "get",
                "maven:group:public",
                "org/example/widget/1.0/widget-1.0.pom",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("<project>widget</project>"));
    }

    #[test]
    fn get_missing_fails() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());
        repodex()
            .args([
                "--config",
                config.to_str().unwrap(),
                "get",
                "maven:group:public",
                "org/example/missing/1.0/missing-1.0.jar",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not found"));
    }

    #[test]
    fn invalid_store_key() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());
        repodex()
            .args(["--config", config.to_str().unwrap(), "get", "bogus", "a/b"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid store key"))
            .stderr(predicate::str::contains("maven:group:public"));
    }

    #[test]
    fn index_clear_requires_confirmation() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());
        repodex()
            .args([
                "--config",
                config.to_str().unwrap(),
                "index",
                "clear",
                "maven:group:public",
                "--yes",
            ])
            .assert()
            .success();
    }
}

mod index_tests {
    use repodex::index::{ContentIndexManager, IndexingStrategies};
    use repodex::model::StoreKey;

    #[test]
    fn indexed_origin_is_returned() {
        let index = ContentIndexManager::new(IndexingStrategies::standard(), 1000);
        let group = StoreKey::group("maven", "public");
        let central = StoreKey::remote("maven", "central");

        index.index_path_in_stores("org/a/1.0/a-1.0.jar", &central, &[group.clone()]);

        assert_eq!(
            index.get_indexed_store_key(&group, "org/a/1.0/a-1.0.jar"),
            Some(central.clone())
        );
        assert_eq!(
            index.get_indexed_store_key(&central, "org/a/1.0/a-1.0.jar"),
            Some(central)
        );
    }

    #[test]
    fn self_entry_is_written_once() {
        let index = ContentIndexManager::new(IndexingStrategies::identity(), 1000);
        let local = StoreKey::hosted("maven", "local");

        index.index_path_in_stores("org/a/1.0/a-1.0.jar", &local, &[]);
        index.index_path_in_stores("org/a/1.0/a-1.0.jar", &local, &[]);

        assert_eq!(index.count_in_store(&local), 1);
        assert_eq!(
            index
                .index()
                .count(|e| e.path == "org/a/1.0/a-1.0.jar"),
            1
        );
    }

    #[test]
    fn bulk_clear_spans_pages() {
        let index = ContentIndexManager::new(IndexingStrategies::identity(), 1000);
        let group = StoreKey::group("maven", "public");
        let local = StoreKey::hosted("maven", "local");

        let paths: Vec<String> = (0..2500)
            .map(|i| format!("org/bulk/{}/artifact-{}.jar", i, i))
            .collect();
        for path in &paths {
            index.index_path_in_stores(path, &local, &[group.clone()]);
        }
        assert_eq!(index.count_in_store(&group), 2500);

        let mut seen = 0;
        let cleared = index.clear_all_indexed_path_in_store(&group, |_| seen += 1);

        assert_eq!(cleared, 2500);
        assert_eq!(seen, 2500);
        assert!(paths
            .iter()
            .all(|p| index.get_indexed_store_key(&group, p).is_none()));
        // Entries of other stores are untouched
        assert_eq!(index.count_in_store(&local), 2500);
    }
}

mod engine_tests {
    use futures_util::future::join_all;
    use repodex::config::Config;
    use repodex::metadata::{Metadata, MetadataKey};
    use repodex::model::StoreKey;
    use repodex::storage::MemoryContentStore;
    use repodex::ContentEngine;
    use std::sync::Arc;
    use std::time::Duration;

    const JAR: &str = "org/example/widget/1.0/widget-1.0.jar";
    const MD: &str = "org/example/widget/maven-metadata.xml";

    fn config(stores: &str) -> Config {
        let mut config: Config = toml::from_str(stores).unwrap();
        config.index.persist = false;
        config
    }

    async fn engine(stores: &str, storage: Arc<MemoryContentStore>) -> ContentEngine {
        ContentEngine::builder(config(stores))
            .storage(storage)
            .build()
            .await
            .unwrap()
    }

    fn metadata(versions: &[&str]) -> String {
        let versions: String = versions
            .iter()
            .map(|v| format!("<version>{}</version>", v))
            .collect();
        format!(
            "<metadata><groupId>org.example</groupId><artifactId>widget</artifactId>\
             <versioning><versions>{}</versions></versioning></metadata>",
            versions
        )
    }

    const TWO_HOSTED: &str = r#"
        [[stores]]
        key = "maven:hosted:a"

        [[stores]]
        key = "maven:hosted:b"

        [[stores]]
        key = "maven:group:g"
        constituents = ["maven:hosted:a", "maven:hosted:b"]
    "#;

    #[tokio::test]
    async fn first_member_wins_and_is_indexed() {
        let storage = Arc::new(MemoryContentStore::new());
        let engine = engine(TWO_HOSTED, storage).await;
        let (a, b, g) = (
            StoreKey::hosted("maven", "a"),
            StoreKey::hosted("maven", "b"),
            StoreKey::group("maven", "g"),
        );
        engine.storage().store(&a, JAR, b"from-a").await.unwrap();
        engine.storage().store(&b, JAR, b"from-b").await.unwrap();

        let data = engine.get(&g, JAR).await.unwrap();
        assert_eq!(data.as_deref(), Some(b"from-a".as_slice()));

        engine.flush().await;
        assert_eq!(engine.index().get_indexed_store_key(&g, JAR), Some(a));
    }

    #[tokio::test]
    async fn stale_entry_falls_through_to_next_member() {
        let storage = Arc::new(MemoryContentStore::new());
        let engine = engine(TWO_HOSTED, storage).await;
        let (a, b, g) = (
            StoreKey::hosted("maven", "a"),
            StoreKey::hosted("maven", "b"),
            StoreKey::group("maven", "g"),
        );
        engine.storage().store(&a, JAR, b"from-a").await.unwrap();
        engine.storage().store(&b, JAR, b"from-b").await.unwrap();

        engine.get(&g, JAR).await.unwrap();
        engine.flush().await;
        assert_eq!(engine.index().get_indexed_store_key(&g, JAR), Some(a.clone()));

        // Behind the engine's back, so no invalidation event fires
        engine.storage().delete(&a, JAR).await.unwrap();

        let data = engine.get(&g, JAR).await.unwrap();
        assert_eq!(data.as_deref(), Some(b"from-b".as_slice()));

        engine.flush().await;
        assert_eq!(engine.index().get_indexed_store_key(&g, JAR), Some(b));
    }

    #[tokio::test]
    async fn stale_entry_without_fallback_is_not_found() {
        let storage = Arc::new(MemoryContentStore::new());
        let engine = engine(TWO_HOSTED, storage).await;
        let (a, g) = (StoreKey::hosted("maven", "a"), StoreKey::group("maven", "g"));
        engine.storage().store(&a, JAR, b"from-a").await.unwrap();

        engine.get(&g, JAR).await.unwrap();
        engine.flush().await;
        engine.storage().delete(&a, JAR).await.unwrap();

        assert!(engine.get(&g, JAR).await.unwrap().is_none());
        assert_ne!(engine.index().get_indexed_store_key(&g, JAR), Some(a));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_metadata_requests_merge_once() {
        let storage = Arc::new(MemoryContentStore::new().with_latency(Duration::from_millis(50)));
        let central = StoreKey::remote("maven", "central");
        let group = StoreKey::group("maven", "public");
        storage.seed_upstream(&central, MD, metadata(&["1.0", "1.1"]));

        let engine = engine(
            r#"
            [[stores]]
            key = "maven:hosted:local"

            [[stores]]
            key = "maven:remote:central"

            [[stores]]
            key = "maven:group:public"
            constituents = ["maven:hosted:local", "maven:remote:central"]
            "#,
            storage.clone(),
        )
        .await;

        let results = join_all((0..8).map(|_| engine.get(&group, MD))).await;

        let bodies: Vec<Vec<u8>> = results
            .into_iter()
            .map(|r| r.unwrap().expect("merged metadata"))
            .collect();
        assert!(bodies.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(storage.retrievals(&central), 1);

        let merged = Metadata::parse_bytes(&bodies[0], MD).unwrap();
        assert_eq!(merged.versions(), ["1.0", "1.1"]);
    }

    #[tokio::test]
    async fn hosted_write_invalidates_every_containing_group() {
        let storage = Arc::new(MemoryContentStore::new());
        let central = StoreKey::remote("maven", "central");
        let local = StoreKey::hosted("maven", "local");
        let (g1, g2) = (StoreKey::group("maven", "g1"), StoreKey::group("maven", "g2"));
        storage.seed_upstream(&central, JAR, b"upstream".to_vec());
        storage.seed_upstream(&central, MD, metadata(&["1.0"]));

        let engine = engine(
            r#"
            [[stores]]
            key = "maven:hosted:local"

            [[stores]]
            key = "maven:remote:central"

            [[stores]]
            key = "maven:group:g1"
            constituents = ["maven:hosted:local", "maven:remote:central"]

            [[stores]]
            key = "maven:group:g2"
            constituents = ["maven:hosted:local", "maven:remote:central"]
            "#,
            storage,
        )
        .await;

        for group in [&g1, &g2] {
            engine.get(group, JAR).await.unwrap();
            engine.get(group, MD).await.unwrap();
        }
        engine.flush().await;
        assert_eq!(engine.index().get_indexed_store_key(&g1, JAR), Some(central.clone()));
        assert!(engine
            .metadata_cache()
            .get(&MetadataKey::new(g2.clone(), MD))
            .is_some());

        engine.store(&local, JAR, b"local").await.unwrap();
        engine
            .store(&local, "org/example/widget/2.0/widget-2.0.pom", b"<project/>")
            .await
            .unwrap();

        for group in [&g1, &g2] {
            assert_ne!(engine.index().get_indexed_store_key(group, JAR), Some(central.clone()));
            assert!(engine
                .metadata_cache()
                .get(&MetadataKey::new(group.clone(), MD))
                .is_none());
        }

        let data = engine.get(&g1, JAR).await.unwrap();
        assert_eq!(data.as_deref(), Some(b"local".as_slice()));

        let merged = engine.get(&g2, MD).await.unwrap().unwrap();
        let merged = Metadata::parse_bytes(&merged, MD).unwrap();
        assert_eq!(merged.versions(), ["1.0", "2.0"]);
    }

    #[tokio::test]
    async fn removing_a_member_forgets_its_content() {
        let storage = Arc::new(MemoryContentStore::new());
        let engine = engine(TWO_HOSTED, storage).await;
        let (a, g) = (StoreKey::hosted("maven", "a"), StoreKey::group("maven", "g"));
        engine.storage().store(&a, JAR, b"from-a").await.unwrap();

        engine.get(&g, JAR).await.unwrap();
        engine.flush().await;
        assert_eq!(engine.index().get_indexed_store_key(&g, JAR), Some(a));

        let mut group = engine.store_definition(&g).await.unwrap();
        group.kind = repodex::model::StoreKind::Group {
            constituents: vec![StoreKey::hosted("maven", "b")],
        };
        engine.update_store(group).await.unwrap();

        assert!(engine.index().get_indexed_store_key(&g, JAR).is_none());
        assert!(engine.get(&g, JAR).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn uploaded_member_metadata_survives_a_pom_upload() {
        let storage = Arc::new(MemoryContentStore::new());
        let engine = engine(TWO_HOSTED, storage).await;
        let a = StoreKey::hosted("maven", "a");
        let uploaded = metadata(&["0.9"]);
        engine.store(&a, MD, uploaded.as_bytes()).await.unwrap();

        engine
            .store(&a, "org/example/widget/1.0/widget-1.0.pom", b"<project/>")
            .await
            .unwrap();

        let data = engine.get(&a, MD).await.unwrap();
        assert_eq!(data.as_deref(), Some(uploaded.as_bytes()));
    }

    #[tokio::test]
    async fn delete_through_group_refreshes_merged_metadata() {
        let storage = Arc::new(MemoryContentStore::new());
        let engine = engine(TWO_HOSTED, storage).await;
        let (a, g) = (StoreKey::hosted("maven", "a"), StoreKey::group("maven", "g"));
        let newest = "org/example/widget/2.0/widget-2.0.pom";
        engine
            .store(&a, "org/example/widget/1.0/widget-1.0.pom", b"<project/>")
            .await
            .unwrap();
        engine.store(&a, newest, b"<project/>").await.unwrap();

        let merged = engine.get(&g, MD).await.unwrap().unwrap();
        let merged = Metadata::parse_bytes(&merged, MD).unwrap();
        assert_eq!(merged.versions(), ["1.0", "2.0"]);

        assert!(engine.delete(&g, newest).await.unwrap());
        assert!(engine.get(&a, newest).await.unwrap().is_none());

        let merged = engine.get(&g, MD).await.unwrap().unwrap();
        let merged = Metadata::parse_bytes(&merged, MD).unwrap();
        assert_eq!(merged.versions(), ["1.0"]);
    }
}
