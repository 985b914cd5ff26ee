mod common;

use std::{fs, sync::Arc};

use chanmirror_core::{
    constants::{REPODATA_FILENAME, REPODATA_FILENAME_COMPRESSED},
    repodata::{decompress_bz2, load_repodata},
};
use chanmirror_dl::transport::MemoryTransport;
use chanmirror_events::{CollectorSink, NullSink};
use chanmirror_operations::{
    clone::sync_mirror, list::list_packages, validate::validate_mirror, SyncMode,
};
use common::{artifact, context, specs, StaticResolver};
use tempfile::tempdir;

#[tokio::test]
async fn test_single_package_into_empty_target() {
    let data = vec![0x5a; 1024];
    let record = artifact("linux-64", "tiny", &data);
    let transport = Arc::new(MemoryTransport::new().with_body(&record.url, data.clone()));
    let resolver = StaticResolver::new().with("tiny", vec![record.clone()]);
    let root = tempdir().unwrap();
    let ctx = context(root.path(), transport, resolver, Arc::new(NullSink));

    let report = sync_mirror(&ctx, &specs(&["tiny"]), SyncMode::Clone)
        .await
        .unwrap();

    assert_eq!(report.platforms.len(), 2);
    let linux = &report.platforms[0];
    assert_eq!(linux.platform, "linux-64");
    assert_eq!(linux.total_size, 1024);
    assert_eq!(linux.count, 1);
    assert_eq!(linux.new, 1);
    assert_eq!(linux.failed, 0);

    let noarch = &report.platforms[1];
    assert_eq!(noarch.platform, "noarch");
    assert_eq!(noarch.count, 0);
    assert!(root.path().join("noarch").join(REPODATA_FILENAME).is_file());

    let index = load_repodata(&root.path().join("linux-64").join(REPODATA_FILENAME))
        .unwrap()
        .unwrap();
    assert_eq!(index.info.subdir, "linux-64");
    assert_eq!(index.packages.len(), 1);
    assert_eq!(index.packages[&record.filename], record);
    assert_eq!(
        fs::read(root.path().join("linux-64").join(&record.filename)).unwrap(),
        data
    );

    let again = sync_mirror(&ctx, &specs(&["tiny"]), SyncMode::Clone)
        .await
        .unwrap();
    assert_eq!(again.platforms[0].new, 0);
    assert_eq!(again.platforms[0].count, 1);
}

#[tokio::test]
async fn test_second_clone_changes_nothing() {
    let data_a = vec![1u8; 4096];
    let data_b = b"noarch payload".to_vec();
    let a = artifact("linux-64", "alpha", &data_a);
    let b = artifact("noarch", "beta", &data_b);
    let transport = Arc::new(
        MemoryTransport::new()
            .with_body(&a.url, data_a.clone())
            .with_body(&b.url, data_b.clone()),
    );
    let resolver = StaticResolver::new().with("alpha", vec![a.clone(), b.clone()]);
    let root = tempdir().unwrap();
    let ctx = context(root.path(), transport.clone(), resolver, Arc::new(NullSink));

    let first = sync_mirror(&ctx, &specs(&["alpha"]), SyncMode::Clone)
        .await
        .unwrap();
    assert_eq!(first.downloaded(), 2);

    let linux_index = fs::read(root.path().join("linux-64").join(REPODATA_FILENAME)).unwrap();
    let noarch_index = fs::read(root.path().join("noarch").join(REPODATA_FILENAME)).unwrap();
    let noarch_bz2 = fs::read(root.path().join("noarch").join(REPODATA_FILENAME_COMPRESSED)).unwrap();

    transport.clear_requests();
    let second = sync_mirror(&ctx, &specs(&["alpha"]), SyncMode::Clone)
        .await
        .unwrap();

    assert_eq!(second.downloaded(), 0);
    assert!(transport.requests().is_empty());
    assert_eq!(
        fs::read(root.path().join("linux-64").join(REPODATA_FILENAME)).unwrap(),
        linux_index
    );
    assert_eq!(
        fs::read(root.path().join("noarch").join(REPODATA_FILENAME)).unwrap(),
        noarch_index
    );
    assert_eq!(
        fs::read(root.path().join("noarch").join(REPODATA_FILENAME_COMPRESSED)).unwrap(),
        noarch_bz2
    );
    assert_eq!(
        fs::read(root.path().join("linux-64").join(&a.filename)).unwrap(),
        data_a
    );
}

#[tokio::test]
async fn test_compressed_index_matches_plain() {
    let data = b"some package".to_vec();
    let record = artifact("noarch", "gamma", &data);
    let transport = Arc::new(MemoryTransport::new().with_body(&record.url, data));
    let resolver = StaticResolver::new().with("gamma", vec![record]);
    let root = tempdir().unwrap();
    let ctx = context(root.path(), transport, resolver, Arc::new(NullSink));

    sync_mirror(&ctx, &specs(&["gamma"]), SyncMode::Clone)
        .await
        .unwrap();

    for platform in ["noarch", "linux-64"] {
        let dir = root.path().join(platform);
        let plain = fs::read(dir.join(REPODATA_FILENAME)).unwrap();
        let compressed = fs::read(dir.join(REPODATA_FILENAME_COMPRESSED)).unwrap();
        assert_eq!(decompress_bz2(&compressed).unwrap(), plain);
        assert!(plain.ends_with(b"}\n"));
    }
}

#[tokio::test]
async fn test_corrupted_package_is_detected_cleaned_and_refetched() {
    let data = vec![9u8; 2048];
    let record = artifact("linux-64", "delta", &data);
    let transport = Arc::new(MemoryTransport::new().with_body(&record.url, data.clone()));
    let resolver = StaticResolver::new().with("delta", vec![record.clone()]);
    let root = tempdir().unwrap();
    let events = Arc::new(CollectorSink::default());
    let ctx = context(root.path(), transport, resolver, events.clone());

    sync_mirror(&ctx, &specs(&["delta"]), SyncMode::Clone)
        .await
        .unwrap();

    let path = root.path().join("linux-64").join(&record.filename);
    fs::write(&path, &data[..1000]).unwrap();

    let reports = validate_mirror(&ctx, false).unwrap();
    let linux = reports.iter().find(|r| r.platform == "linux-64").unwrap();
    assert_eq!(linux.packages, 0);
    assert_eq!(linux.invalid_packages, vec![record.filename.clone()]);
    assert!(path.exists());

    let reports = validate_mirror(&ctx, true).unwrap();
    let linux = reports.iter().find(|r| r.platform == "linux-64").unwrap();
    assert_eq!(linux.removed_files, vec![record.filename.clone()]);
    assert!(!path.exists());
    assert_eq!(events.removed(), vec![record.filename.clone()]);

    let report = sync_mirror(&ctx, &specs(&["delta"]), SyncMode::Clone)
        .await
        .unwrap();
    assert_eq!(report.platforms[0].new, 1);
    assert_eq!(fs::read(&path).unwrap(), data);
}

#[tokio::test]
async fn test_altered_package_is_replaced_by_clone() {
    let data = b"original bytes".to_vec();
    let record = artifact("noarch", "epsilon", &data);
    let transport = Arc::new(MemoryTransport::new().with_body(&record.url, data.clone()));
    let resolver = StaticResolver::new().with("epsilon", vec![record.clone()]);
    let root = tempdir().unwrap();
    let ctx = context(root.path(), transport, resolver, Arc::new(NullSink));

    sync_mirror(&ctx, &specs(&["epsilon"]), SyncMode::Clone)
        .await
        .unwrap();
    let path = root.path().join("noarch").join(&record.filename);
    fs::write(&path, b"modified bytes").unwrap();

    let report = sync_mirror(&ctx, &specs(&["epsilon"]), SyncMode::Clone)
        .await
        .unwrap();
    let noarch = report.platforms.iter().find(|r| r.platform == "noarch").unwrap();
    assert_eq!(noarch.new, 1);
    assert_eq!(fs::read(&path).unwrap(), data);
}

#[tokio::test]
async fn test_check_leaves_target_untouched() {
    let data_a = vec![3u8; 100];
    let data_b = vec![4u8; 200];
    let a = artifact("linux-64", "zeta", &data_a);
    let b = artifact("noarch", "eta", &data_b);
    let transport = Arc::new(
        MemoryTransport::new()
            .with_body(&a.url, data_a)
            .with_body(&b.url, data_b),
    );
    let resolver = StaticResolver::new().with("zeta", vec![a, b]);
    let parent = tempdir().unwrap();
    let root = parent.path().join("mirror");
    let ctx = context(&root, transport.clone(), resolver, Arc::new(NullSink));

    let report = sync_mirror(&ctx, &specs(&["zeta"]), SyncMode::Check)
        .await
        .unwrap();

    assert!(report.dry_run);
    assert!(!root.exists());
    assert!(transport.requests().is_empty());
    assert_eq!(report.downloaded(), 2);
    for platform in &report.platforms {
        assert_eq!(platform.count, 1);
        assert_eq!(platform.new, 1);
        assert!(platform.repodata.is_none());
    }
    assert_eq!(report.platforms[0].total_size, 100);
    assert_eq!(report.platforms[1].total_size, 200);
}

#[tokio::test]
async fn test_check_reports_present_packages() {
    let data = vec![8u8; 64];
    let record = artifact("noarch", "theta", &data);
    let transport = Arc::new(MemoryTransport::new().with_body(&record.url, data));
    let resolver = StaticResolver::new().with("theta", vec![record]);
    let root = tempdir().unwrap();
    let ctx = context(root.path(), transport, resolver, Arc::new(NullSink));

    sync_mirror(&ctx, &specs(&["theta"]), SyncMode::Clone)
        .await
        .unwrap();
    let index = fs::read(root.path().join("noarch").join(REPODATA_FILENAME)).unwrap();

    let report = sync_mirror(&ctx, &specs(&["theta"]), SyncMode::Check)
        .await
        .unwrap();
    let noarch = report.platforms.iter().find(|r| r.platform == "noarch").unwrap();
    assert_eq!(noarch.count, 1);
    assert_eq!(noarch.new, 0);
    assert_eq!(
        fs::read(root.path().join("noarch").join(REPODATA_FILENAME)).unwrap(),
        index
    );
}

#[tokio::test]
async fn test_previous_entries_are_retained() {
    let data_a = b"package A".to_vec();
    let data_b = b"package B".to_vec();
    let a = artifact("linux-64", "iota", &data_a);
    let b = artifact("linux-64", "kappa", &data_b);
    let transport = Arc::new(
        MemoryTransport::new()
            .with_body(&a.url, data_a.clone())
            .with_body(&b.url, data_b),
    );
    let root = tempdir().unwrap();

    let first = context(
        root.path(),
        transport.clone(),
        StaticResolver::new().with("iota", vec![a.clone()]),
        Arc::new(NullSink),
    );
    sync_mirror(&first, &specs(&["iota"]), SyncMode::Clone)
        .await
        .unwrap();

    transport.clear_requests();
    let second = context(
        root.path(),
        transport.clone(),
        StaticResolver::new().with("kappa", vec![b.clone()]),
        Arc::new(NullSink),
    );
    let report = sync_mirror(&second, &specs(&["kappa"]), SyncMode::Clone)
        .await
        .unwrap();

    let linux = &report.platforms[0];
    assert_eq!(linux.new, 1);
    assert_eq!(linux.old, 1);
    assert_eq!(transport.requests(), vec![b.url.clone()]);

    let index = load_repodata(&root.path().join("linux-64").join(REPODATA_FILENAME))
        .unwrap()
        .unwrap();
    assert!(index.packages.contains_key(&a.filename));
    assert!(index.packages.contains_key(&b.filename));
    assert_eq!(
        fs::read(root.path().join("linux-64").join(&a.filename)).unwrap(),
        data_a
    );
}

#[tokio::test]
async fn test_failed_download_does_not_stop_siblings() {
    let data_y = vec![5u8; 300];
    let data_z = vec![6u8; 400];
    let x = artifact("linux-64", "xi", b"never served");
    let y = artifact("linux-64", "omicron", &data_y);
    let z = artifact("linux-64", "pi", &data_z);
    let transport = Arc::new(
        MemoryTransport::new()
            .with_body(&y.url, data_y)
            .with_body(&z.url, data_z),
    );
    let resolver = StaticResolver::new().with("all", vec![x.clone(), y.clone(), z.clone()]);
    let root = tempdir().unwrap();
    let events = Arc::new(CollectorSink::default());
    let ctx = context(root.path(), transport, resolver, events.clone());

    let report = sync_mirror(&ctx, &specs(&["all"]), SyncMode::Clone)
        .await
        .unwrap();

    let linux = &report.platforms[0];
    assert_eq!(linux.failed, 1);
    assert_eq!(linux.failed_packages, vec![x.filename.clone()]);
    assert_eq!(linux.count, 2);
    assert_eq!(linux.new, 2);
    assert_eq!(linux.total_size, 700);

    let dir = root.path().join("linux-64");
    assert!(!dir.join(&x.filename).exists());
    assert!(dir.join(&y.filename).is_file());
    assert!(dir.join(&z.filename).is_file());

    let index = load_repodata(&dir.join(REPODATA_FILENAME)).unwrap().unwrap();
    assert!(!index.packages.contains_key(&x.filename));
    assert_eq!(index.packages.len(), 2);

    let mut downloaded = events.downloaded();
    downloaded.sort();
    assert_eq!(downloaded, vec![y.filename.clone(), z.filename.clone()]);
}

#[tokio::test]
async fn test_unresolvable_spec_is_reported() {
    let data = b"lambda".to_vec();
    let record = artifact("noarch", "lambda", &data);
    let transport = Arc::new(MemoryTransport::new().with_body(&record.url, data));
    let resolver = StaticResolver::new().with("lambda", vec![record]);
    let root = tempdir().unwrap();
    let ctx = context(root.path(), transport, resolver, Arc::new(NullSink));

    let report = sync_mirror(&ctx, &specs(&["missing", "lambda"]), SyncMode::Clone)
        .await
        .unwrap();

    assert_eq!(report.failed_specs.len(), 1);
    assert_eq!(report.failed_specs[0].spec, "missing");
    assert_eq!(report.downloaded(), 1);
}

#[tokio::test]
async fn test_list_after_clone() {
    let data_mu = b"mu".to_vec();
    let data_nu = b"nu".to_vec();
    let mu = artifact("linux-64", "mu", &data_mu);
    let nu = artifact("noarch", "nu", &data_nu);
    let transport = Arc::new(
        MemoryTransport::new()
            .with_body(&mu.url, data_mu)
            .with_body(&nu.url, data_nu),
    );
    let resolver = StaticResolver::new().with("nu", vec![nu, mu]);
    let root = tempdir().unwrap();
    let ctx = context(root.path(), transport, resolver, Arc::new(NullSink));

    sync_mirror(&ctx, &specs(&["nu"]), SyncMode::Clone)
        .await
        .unwrap();

    let entries = list_packages(&ctx).unwrap();
    let listed: Vec<_> = entries
        .iter()
        .map(|e| format!("{}: {}={}", e.platform, e.name, e.version))
        .collect();
    assert_eq!(listed, vec!["linux-64: mu=1.0", "noarch: nu=1.0"]);
}

#[tokio::test]
async fn test_escaping_filename_stays_inside_mirror() {
    let data = b"escaped payload".to_vec();
    let mut escaped = artifact("noarch", "escaped", &data);
    escaped.filename = "../../escaped.conda".into();
    let good_data = b"good payload".to_vec();
    let good = artifact("noarch", "good", &good_data);
    let transport = Arc::new(
        MemoryTransport::new()
            .with_body(&escaped.url, data)
            .with_body(&good.url, good_data),
    );
    let resolver = StaticResolver::new().with("escaped", vec![escaped, good.clone()]);
    let base = tempdir().unwrap();
    let root = base.path().join("mirror");
    let ctx = context(&root, transport.clone(), resolver, Arc::new(NullSink));

    let report = sync_mirror(&ctx, &specs(&["escaped"]), SyncMode::Clone)
        .await
        .unwrap();

    let noarch = report
        .platforms
        .iter()
        .find(|platform| platform.platform == "noarch")
        .unwrap();
    assert_eq!(noarch.new, 1);
    assert_eq!(noarch.failed, 0);
    assert!(!base.path().join("escaped.conda").exists());
    assert_eq!(transport.requests(), vec![good.url.clone()]);

    let index = load_repodata(&root.join("noarch").join(REPODATA_FILENAME))
        .unwrap()
        .unwrap();
    assert_eq!(index.packages.keys().collect::<Vec<_>>(), vec![&good.filename]);
}
