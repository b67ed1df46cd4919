use std::{
    fs,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc, Barrier,
    },
    thread,
    time::Duration,
};

use hds_cache::{
    CacheConfig, CacheManager, Contention, Coverage, ForcingArray, Manifest, Scope,
};
use hds_core::{
    AttributeTable, AttributeValue, BasinId, DatasetRegion, HdsError, SeriesArray, TimeRange,
    Variable, VariableKind,
};

fn forcing_var(name: &str) -> Variable {
    Variable::new(name, "mm/day", VariableKind::Forcing)
}

/// Deterministic stand-in for a raw read: value depends only on the cell.
fn synthetic(cov: &Coverage) -> ForcingArray {
    let time = cov.time.unwrap();
    let vars = cov.variables.iter().map(|v| forcing_var(v)).collect();
    let mut arr = SeriesArray::empty(cov.basins.clone(), time, vars);
    for (b, basin) in cov.basins.iter().enumerate() {
        for t in 0..time.len() {
            for v in 0..cov.variables.len() {
                let x = basin.as_str().len() as f64 * 100.0 + t as f64 + v as f64 / 10.0;
                arr.set(b, t, v, if t % 7 == 3 { None } else { Some(x / 3.0) });
            }
        }
    }
    ForcingArray(arr)
}

fn request(basins: &[&str], vars: &[&str], start: &str, end: &str) -> Coverage {
    Coverage::new(
        basins.iter().map(|b| BasinId::new(*b)).collect(),
        vars.iter().map(|v| v.to_string()).collect(),
        Some(TimeRange::parse(start, end).unwrap()),
    )
}

fn scope() -> Scope {
    Scope::new(DatasetRegion::CamelsCh, "/data/camels_ch", "sig-1")
}

#[test]
fn hit_matches_fresh_build_bit_for_bit() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::new(CacheConfig::new(dir.path()));
    let req = request(&["2009", "2011"], &["p", "t"], "2000-01-01", "2000-03-01");
    let calls = AtomicUsize::new(0);
    let build = |c: &Coverage| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(synthetic(c))
    };

    let miss: ForcingArray = cache.get_or_build(&scope(), &req, build).unwrap();
    let hit: ForcingArray = cache.get_or_build(&scope(), &req, build).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let bits = |a: &ForcingArray| -> Vec<Option<u64>> {
        a.0.values().iter().map(|v| v.map(f64::to_bits)).collect()
    };
    assert_eq!(bits(&miss), bits(&hit));
    assert_eq!(miss, hit);
}

#[test]
fn narrower_request_is_served_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::new(CacheConfig::new(dir.path()));
    let wide = request(&["a", "b", "c"], &["p", "t"], "2000-01-01", "2001-01-01");
    let _: ForcingArray = cache.get_or_build(&scope(), &wide, |c| Ok(synthetic(c))).unwrap();

    let narrow = request(&["c", "a"], &["t"], "2000-05-01", "2000-05-11");
    let got: ForcingArray = cache
        .get_or_build(&scope(), &narrow, |_| panic!("must not rebuild"))
        .unwrap();
    assert_eq!(got.0.basins, narrow.basins);
    assert_eq!(got.0.time_range.len(), 10);
    let expected = synthetic(&wide).0.subset(&narrow.basins, &narrow.variables, &narrow.time.unwrap());
    assert_eq!(Some(got.0), expected);
}

#[test]
fn uncovered_request_widens_stored_coverage() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::new(CacheConfig::new(dir.path()));
    let first = request(&["a"], &["p"], "2000-01-01", "2000-02-01");
    let second = request(&["b"], &["t"], "2000-03-01", "2000-04-01");
    let _: ForcingArray = cache.get_or_build(&scope(), &first, |c| Ok(synthetic(c))).unwrap();

    let mut seen = None;
    let _: ForcingArray = cache
        .get_or_build(&scope(), &second, |c| {
            seen = Some(c.clone());
            Ok(synthetic(c))
        })
        .unwrap();
    let widened = seen.unwrap();
    assert_eq!(widened, first.union(&second));

    // both earlier requests are now hits
    for req in [&first, &second] {
        let _: ForcingArray = cache
            .get_or_build(&scope(), req, |_| panic!("must not rebuild"))
            .unwrap();
    }
    // only one array file remains
    let scope_dir = cache.scope_dir(&scope());
    let arrays = fs::read_dir(&scope_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".f64.gz"))
        .count();
    assert_eq!(arrays, 1);
}

#[test]
fn changed_sources_invalidate() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::new(CacheConfig::new(dir.path()));
    let req = request(&["a"], &["p"], "2000-01-01", "2000-02-01");
    let _: ForcingArray = cache.get_or_build(&scope(), &req, |c| Ok(synthetic(c))).unwrap();

    let moved = Scope::new(DatasetRegion::CamelsCh, "/data/camels_ch", "sig-2");
    let calls = AtomicUsize::new(0);
    let _: ForcingArray = cache
        .get_or_build(&moved, &req, |c| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(synthetic(c))
        })
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let status = cache.status(&moved).unwrap();
    assert_eq!(status.len(), 1);
    assert!(status[0].current);
    assert!(!cache.status(&scope()).unwrap()[0].current);
}

#[test]
fn corrupt_array_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::new(CacheConfig::new(dir.path()));
    let req = request(&["a"], &["p"], "2000-01-01", "2000-02-01");
    let good: ForcingArray = cache.get_or_build(&scope(), &req, |c| Ok(synthetic(c))).unwrap();

    let scope_dir = cache.scope_dir(&scope());
    let manifest = Manifest::read(&scope_dir.join("forcing.manifest.json"))
        .unwrap()
        .unwrap();
    fs::write(scope_dir.join(&manifest.array_file), b"garbage").unwrap();

    let calls = AtomicUsize::new(0);
    let again: ForcingArray = cache
        .get_or_build(&scope(), &req, |c| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(synthetic(c))
        })
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(again, good);
}

#[test]
fn uncached_region_always_builds() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::new(CacheConfig::new(dir.path()));
    let se = Scope::new(DatasetRegion::CamelsSe, "/data/camels_se", "sig");
    let req = request(&["5"], &["p"], "2000-01-01", "2000-01-05");
    let calls = AtomicUsize::new(0);
    for _ in 0..2 {
        let _: ForcingArray = cache
            .get_or_build(&se, &req, |c| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(synthetic(c))
            })
            .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!cache.scope_dir(&se).exists());
}

#[test]
fn attribute_tables_are_cached() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::new(CacheConfig::new(dir.path()));
    let vars = vec![
        Variable::new("area", "km^2", VariableKind::Attribute),
        Variable::new("gauge_name", "text", VariableKind::Attribute),
    ];
    let build = |c: &Coverage| {
        let values = c
            .basins
            .iter()
            .flat_map(|b| {
                [
                    AttributeValue::Number(b.as_str().len() as f64 * 1.5),
                    AttributeValue::Text(format!("station {}", b)),
                ]
            })
            .collect();
        AttributeTable::from_values(c.basins.clone(), vars.clone(), values)
    };
    let req = Coverage::new(
        vec!["2009".into(), "2011".into()],
        vec!["gauge_name".into(), "area".into()],
        None,
    );
    let miss: AttributeTable = cache.get_or_build(&scope(), &req, build).unwrap();
    let hit: AttributeTable = cache
        .get_or_build(&scope(), &req, |_| panic!("must not rebuild"))
        .unwrap();
    assert_eq!(miss, hit);
    assert_eq!(
        hit.get("2011", "gauge_name"),
        Some(&AttributeValue::Text("station 2011".into()))
    );
    assert_eq!(hit.variables[0].name, "gauge_name");
}

#[test]
fn concurrent_callers_build_once_when_blocking() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::new(CacheConfig::new(dir.path()));
    let req = request(&["a", "b"], &["p"], "2000-01-01", "2000-06-01");
    let calls = Arc::new(AtomicUsize::new(0));
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let (cache, req) = (cache.clone(), req.clone());
            let (calls, active, max_active, start) =
                (calls.clone(), active.clone(), max_active.clone(), start.clone());
            thread::spawn(move || {
                start.wait();
                let got: ForcingArray = cache
                    .get_or_build(&scope(), &req, |c| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_active.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(100));
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(synthetic(c))
                    })
                    .unwrap();
                got
            })
        })
        .collect();

    let results: Vec<ForcingArray> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(max_active.load(Ordering::SeqCst), 1);
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn fail_fast_reports_build_in_progress() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::new(
        CacheConfig::new(dir.path()).with_contention(Contention::FailFast),
    );
    let req = request(&["a"], &["p"], "2000-01-01", "2000-02-01");
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let builder = {
        let (cache, req) = (cache.clone(), req.clone());
        thread::spawn(move || {
            let got: ForcingArray = cache
                .get_or_build(&scope(), &req, |c| {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok(synthetic(c))
                })
                .unwrap();
            got
        })
    };

    started_rx.recv().unwrap();
    let err = cache
        .get_or_build::<ForcingArray, _>(&scope(), &req, |_| panic!("must not build"))
        .unwrap_err();
    assert!(matches!(err, HdsError::CacheBuildInProgress { .. }));

    release_tx.send(()).unwrap();
    let built = builder.join().unwrap();
    // once built, fail-fast callers are served normally
    let hit: ForcingArray = cache
        .get_or_build(&scope(), &req, |_| panic!("must not rebuild"))
        .unwrap();
    assert_eq!(hit, built);
}
