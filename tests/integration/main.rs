//! Integration tests for Stencil

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Command isolated from the user's config and environment
    fn stencil(config: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("stencil");
        cmd.env_remove("STENCIL_DATABASE_URL")
            .env_remove("STENCIL_CONFIG")
            .env("CI", "1")
            .arg("--config")
            .arg(config);
        cmd
    }

    fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, content).unwrap();
        path
    }

    fn addons(dir: &TempDir) -> std::path::PathBuf {
        let root = dir.path().join("addons");
        fs::create_dir_all(root.join("base/models")).unwrap();
        fs::write(root.join("base/__manifest__.py"), "{'name': 'base'}").unwrap();
        fs::write(root.join("base/models/res.py"), "class Res: pass").unwrap();
        root
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        stencil(&dir.path().join("config.toml"))
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Content-addressed cache of PostgreSQL database templates",
            ))
            .stdout(predicate::str::contains("Usage: stencil"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        stencil(&dir.path().join("config.toml"))
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("stencil"));
    }

    #[test]
    fn invalid_prefix_rejected_before_connecting() {
        let dir = TempDir::new().unwrap();
        stencil(&dir.path().join("config.toml"))
            .args(["--database-url", "postgres://nobody@127.0.0.1:1/postgres"])
            .args(["trim", "--cache-prefix", "bad_prefix"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid cache prefix"));
    }

    #[test]
    fn missing_database_url_has_hint() {
        let dir = TempDir::new().unwrap();
        stencil(&dir.path().join("config.toml"))
            .arg("list")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No database URL configured"))
            .stderr(predicate::str::contains("STENCIL_DATABASE_URL"));
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        stencil(&dir.path().join("config.toml"))
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_init_then_show() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        stencil(&path).args(["config", "init"]).assert().success();
        assert!(path.exists());

        stencil(&path)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("prefix = \"cache\""));
    }

    #[test]
    fn config_show_redacts_password() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "[database]\nurl = \"postgres://odoo:hunter2@db/postgres\"\n",
        );

        stencil(&path)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("odoo:***@db"))
            .stdout(predicate::str::contains("hunter2").not());
    }

    #[test]
    fn invalid_config_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[cache\n");

        stencil(&path)
            .arg("list")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn digest_prints_hex() {
        let dir = TempDir::new().unwrap();
        let root = addons(&dir);
        let path = write_config(
            &dir,
            &format!("[addons]\npaths = [{:?}]\n", root.display().to_string()),
        );

        let plain = stencil(&path)
            .args(["digest", "-i", "base"])
            .assert()
            .success()
            .stdout(predicate::str::is_match("^[0-9a-f]{40}\n$").unwrap())
            .get_output()
            .stdout
            .clone();

        let demo = stencil(&path)
            .args(["digest", "-i", "base", "--with-demo"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        assert_ne!(plain, demo);
    }

    #[test]
    fn digest_unknown_module() {
        let dir = TempDir::new().unwrap();
        let root = addons(&dir);
        let path = write_config(
            &dir,
            &format!("[addons]\npaths = [{:?}]\n", root.display().to_string()),
        );

        stencil(&path)
            .args(["digest", "-i", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Module 'nope' not found"));
    }

    #[test]
    fn init_without_builder() {
        let dir = TempDir::new().unwrap();
        stencil(&dir.path().join("config.toml"))
            .args(["init", "newdb", "--no-cache"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No template builder command configured"));
    }

    #[cfg(unix)]
    #[test]
    fn init_no_cache_runs_builder() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
                [builder]
                command = "sh"
                args = ["-c", "echo built $STENCIL_DATABASE with $STENCIL_MODULES"]
            "#,
        );

        stencil(&path)
            .args(["init", "newdb", "--no-cache", "-i", "base,mail"])
            .assert()
            .success()
            .stdout(predicate::str::contains("built newdb with base,mail"))
            .stdout(predicate::str::contains("New database newdb created"));
    }

    #[cfg(unix)]
    #[test]
    fn init_builder_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
                [builder]
                command = "sh"
                args = ["-c", "echo module base failed to load; exit 3"]
            "#,
        );

        stencil(&path)
            .args(["init", "newdb", "--no-cache"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("exit code 3"))
            .stderr(predicate::str::contains("module base failed to load"));
    }
}

mod cache_tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use stencil::cache::naming::lock_id;
    use stencil::cache::{Digest, ManualClock, Prefix, TemplateCache};
    use stencil::store::{MemoryCluster, MemoryStore, TemplateStore};

    type Cache = TemplateCache<MemoryStore, ManualClock>;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    fn digest(c: char) -> Digest {
        Digest::new(c.to_string().repeat(40)).unwrap()
    }

    fn cache(cluster: &MemoryCluster, clock: &ManualClock) -> Cache {
        let prefix = Prefix::lenient("cachetest").unwrap();
        TemplateCache::with_clock(cluster.session(), prefix, clock.clone())
    }

    /// Build a throwaway database and hand it to the cache
    async fn add(cluster: &MemoryCluster, cache: &mut Cache, source: &str, d: &Digest) {
        cluster.create_database(source).unwrap();
        cache.add(source, d).await.unwrap();
    }

    #[tokio::test]
    async fn create_add_purge_scenario() {
        let cluster = MemoryCluster::new();
        let clock = ManualClock::new(now());
        let mut cache = cache(&cluster, &clock);
        let d = digest('a');

        assert_eq!(cache.size().await.unwrap(), 0);
        assert!(!cache.create("db", &d).await.unwrap());
        add(&cluster, &mut cache, "db", &d).await;
        assert!(cache.create("newdb", &d).await.unwrap());
        assert_eq!(cache.size().await.unwrap(), 1);

        assert_eq!(cache.purge().await.unwrap(), 1);
        assert_eq!(cache.size().await.unwrap(), 0);
        assert!(cluster.contains("newdb"));
    }

    #[tokio::test]
    async fn long_prefix_names_are_truncated() {
        let cluster = MemoryCluster::new();
        let clock = ManualClock::new(now());
        let mut cache = cache(&cluster, &clock);
        add(&cluster, &mut cache, "db", &digest('a')).await;

        let names = cluster
            .databases()
            .into_iter()
            .filter(|n| n.starts_with("cachetest-"))
            .collect::<Vec<_>>();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].len(), 63);
        assert!(cache.create("newdb", &digest('a')).await.unwrap());
    }

    #[tokio::test]
    async fn miss_after_purge() {
        let cluster = MemoryCluster::new();
        let clock = ManualClock::new(now());
        let mut cache = cache(&cluster, &clock);
        add(&cluster, &mut cache, "db", &digest('a')).await;

        cache.purge().await.unwrap();
        assert!(!cache.create("newdb", &digest('a')).await.unwrap());
        assert!(!cluster.contains("newdb"));
    }

    #[tokio::test]
    async fn purge_is_idempotent() {
        let cluster = MemoryCluster::new();
        let clock = ManualClock::new(now());
        let mut cache = cache(&cluster, &clock);

        assert_eq!(cache.purge().await.unwrap(), 0);
        assert_eq!(cache.purge().await.unwrap(), 0);
        assert_eq!(cache.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_digests_collapse() {
        let cluster = MemoryCluster::new();
        let clock = ManualClock::new(now());
        let mut cache = cache(&cluster, &clock);

        for (i, c) in ['a', 'b', 'a', 'a', 'b'].into_iter().enumerate() {
            clock.advance(Duration::minutes(1));
            add(&cluster, &mut cache, &format!("src{}", i), &digest(c)).await;
        }

        assert_eq!(cache.size().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn trim_size_keeps_most_recent() {
        let cluster = MemoryCluster::new();
        let clock = ManualClock::new(now());
        let mut cache = cache(&cluster, &clock);

        for c in ['a', 'b', 'c'] {
            add(&cluster, &mut cache, &format!("src-{}", c), &digest(c)).await;
            clock.advance(Duration::minutes(5));
        }
        assert_eq!(cache.size().await.unwrap(), 3);

        assert_eq!(cache.trim_size(2).await.unwrap(), 1);
        assert_eq!(cache.size().await.unwrap(), 2);
        assert!(!cache.create("x", &digest('a')).await.unwrap());
        assert!(cache.create("y", &digest('b')).await.unwrap());
        assert!(cache.create("z", &digest('c')).await.unwrap());
    }

    #[tokio::test]
    async fn trim_size_follows_use_not_creation() {
        let cluster = MemoryCluster::new();
        let clock = ManualClock::new(now());
        let mut cache = cache(&cluster, &clock);

        add(&cluster, &mut cache, "one", &digest('1')).await;
        clock.advance(Duration::hours(1));
        add(&cluster, &mut cache, "two", &digest('2')).await;
        clock.advance(Duration::hours(1));
        assert!(cache.create("clone", &digest('1')).await.unwrap());

        assert_eq!(cache.trim_size(1).await.unwrap(), 1);
        assert!(cache.create("again", &digest('1')).await.unwrap());
        assert!(!cache.create("other", &digest('2')).await.unwrap());
    }

    #[tokio::test]
    async fn trim_age_boundary() {
        let cluster = MemoryCluster::new();
        let clock = ManualClock::new(now());
        let mut cache = cache(&cluster, &clock);

        clock.set(now() - Duration::days(2));
        add(&cluster, &mut cache, "two-days", &digest('a')).await;
        clock.set(now() - Duration::days(4));
        add(&cluster, &mut cache, "four-days", &digest('b')).await;
        clock.set(now());
        add(&cluster, &mut cache, "today", &digest('c')).await;

        assert_eq!(cache.trim_age(Duration::days(5)).await.unwrap(), 0);
        assert_eq!(cache.trim_age(Duration::days(4)).await.unwrap(), 0);
        assert_eq!(cache.trim_age(Duration::days(3)).await.unwrap(), 1);
        assert_eq!(cache.size().await.unwrap(), 2);
        assert!(!cache.create("old", &digest('b')).await.unwrap());
    }

    #[tokio::test]
    async fn trim_age_one_minute_past_boundary() {
        let cluster = MemoryCluster::new();
        let clock = ManualClock::new(now() - Duration::days(4) - Duration::minutes(1));
        let mut cache = cache(&cluster, &clock);
        add(&cluster, &mut cache, "old", &digest('a')).await;

        clock.set(now());
        assert_eq!(cache.trim_age(Duration::days(4)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn prefixes_do_not_share_entries() {
        let cluster = MemoryCluster::new();
        let clock = ManualClock::new(now());
        let mut first = cache(&cluster, &clock);
        let mut second =
            TemplateCache::with_clock(cluster.session(), Prefix::new("other").unwrap(), clock.clone());

        add(&cluster, &mut first, "db", &digest('a')).await;

        assert!(!second.create("newdb", &digest('a')).await.unwrap());
        assert_eq!(second.purge().await.unwrap(), 0);
        assert_eq!(first.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn same_prefix_waits_for_lock_holder() {
        let cluster = MemoryCluster::new();
        let clock = ManualClock::new(now());
        let prefix = Prefix::lenient("cachetest").unwrap();

        let mut holder = cluster.session();
        holder.advisory_lock(lock_id(&prefix)).await.unwrap();

        let mut cache = cache(&cluster, &clock);
        let waiting = tokio::spawn(async move { cache.size().await });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiting.is_finished(), "cache must wait for the namespace lock");

        holder.advisory_unlock(lock_id(&prefix)).await.unwrap();
        let size = tokio::time::timeout(std::time::Duration::from_secs(1), waiting)
            .await
            .expect("lock released")
            .unwrap()
            .unwrap();
        assert_eq!(size, 0);
    }

    #[tokio::test]
    async fn concurrent_adds_of_one_digest_keep_one_template() {
        let cluster = MemoryCluster::new();
        let clock = ManualClock::new(now());
        cluster.create_database("build-1").unwrap();
        cluster.create_database("build-2").unwrap();

        let mut tasks = Vec::new();
        for source in ["build-1", "build-2"] {
            let mut cache = cache(&cluster, &clock);
            tasks.push(tokio::spawn(async move {
                cache.add(source, &digest('a')).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut cache = cache(&cluster, &clock);
        assert_eq!(cache.size().await.unwrap(), 1);
        // Exactly one build was promoted, the other left for its caller
        let leftover = ["build-1", "build-2"]
            .iter()
            .filter(|name| cluster.contains(name))
            .count();
        assert_eq!(leftover, 1);
    }
}

/// Runs against a real server when STENCIL_TEST_DATABASE_URL is set
mod postgres_tests {
    use stencil::cache::{Digest, Prefix, TemplateCache};
    use stencil::store::{PgTemplateStore, TemplateStore};

    fn database_url() -> Option<String> {
        std::env::var("STENCIL_TEST_DATABASE_URL").ok()
    }

    #[tokio::test]
    async fn create_add_purge_roundtrip() {
        let Some(url) = database_url() else {
            eprintln!("STENCIL_TEST_DATABASE_URL not set, skipping");
            return;
        };

        let mut store = PgTemplateStore::connect(&url).await.unwrap();
        let source = format!("stencil_it_{}", std::process::id());
        store
            .create_database_from_template(&source, "template0")
            .await
            .unwrap();

        let prefix = Prefix::new("stenit").unwrap();
        let mut cache = TemplateCache::new(store, prefix);
        cache.purge().await.unwrap();
        let d = Digest::new("a".repeat(40)).unwrap();
        let target = format!("{}_clone", source);

        assert!(!cache.create(&target, &d).await.unwrap());
        cache.add(&source, &d).await.unwrap();
        assert!(cache.create(&target, &d).await.unwrap());
        assert_eq!(cache.size().await.unwrap(), 1);

        assert_eq!(cache.purge().await.unwrap(), 1);
        assert_eq!(cache.size().await.unwrap(), 0);

        let mut store = cache.into_store();
        store.drop_database(&target).await.unwrap();
        store.close().await.unwrap();
    }
}
