//! Catalog invariants: ordering, idempotence, host isolation, cursor.

use std::sync::Arc;

use rocksdb::{Options, DB};
use stream_scraper::UrlCatalog;

fn open(host: &str) -> (tempfile::TempDir, UrlCatalog) {
    let dir = tempfile::tempdir().unwrap();
    let catalog = UrlCatalog::open(host, dir.path()).unwrap();
    (dir, catalog)
}

fn urls_of(catalog: &UrlCatalog) -> Vec<String> {
    catalog
        .iterate(None)
        .map(|entry| entry.unwrap().1)
        .collect()
}

#[test]
fn iteration_follows_lexical_path_order() {
    let (_dir, catalog) = open("a.com");
    catalog.add("https://a.com/dab").unwrap();
    catalog.add("https://a.com/ab").unwrap();
    catalog.add("https://a.com/cd").unwrap();
    assert_eq!(
        urls_of(&catalog),
        ["https://a.com/ab", "https://a.com/cd", "https://a.com/dab"]
    );
}

#[test]
fn adding_twice_keeps_one_entry() {
    let (_dir, catalog) = open("a.com");
    for _ in 0..3 {
        catalog.add("https://a.com/x").unwrap();
    }
    assert_eq!(catalog.total().unwrap(), 1);
}

#[test]
fn delete_removes_exactly_one_entry() {
    let (_dir, catalog) = open("a.com");
    catalog.add("https://a.com/x").unwrap();
    catalog.add("https://a.com/y").unwrap();
    catalog.delete("https://a.com/x").unwrap();
    assert_eq!(urls_of(&catalog), ["https://a.com/y"]);
}

#[test]
fn hosts_sharing_a_store_stay_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = Options::default();
    opts.create_if_missing(true);
    let db = Arc::new(DB::open(&opts, dir.path()).unwrap());

    let a = UrlCatalog::with_db(Arc::clone(&db), "a.com").unwrap();
    let b = UrlCatalog::with_db(Arc::clone(&db), "a.com.evil").unwrap();
    a.add("https://a.com/1").unwrap();
    a.add("https://a.com/2").unwrap();
    b.add("https://a.com.evil/other").unwrap();

    assert_eq!(urls_of(&a), ["https://a.com/1", "https://a.com/2"]);
    assert_eq!(urls_of(&b), ["https://a.com.evil/other"]);
}

#[test]
fn sentinels_never_appear_in_iteration() {
    let (_dir, catalog) = open("a.com");
    assert_eq!(catalog.total().unwrap(), 0);
    assert!(urls_of(&catalog).is_empty());
}

#[test]
fn query_is_part_of_the_key_but_empty_query_is_not() {
    let (_dir, catalog) = open("a.com");
    catalog.add("https://a.com/x?page=2").unwrap();
    catalog.add("https://a.com/x").unwrap();
    assert_eq!(catalog.total().unwrap(), 2);

    let plain = catalog.key_of("https://a.com/x");
    assert!(!plain.contains(&b'?'));
    let with_query = catalog.key_of("https://a.com/x?page=2");
    assert!(with_query.ends_with(b"/x?page=2"));
}

#[test]
fn bare_host_keys_as_root_path() {
    let (_dir, catalog) = open("a.com");
    catalog.add("https://a.com").unwrap();
    let key = catalog.key_of("https://a.com");
    assert!(key.ends_with(b"\x00/"));
    assert_eq!(urls_of(&catalog), ["https://a.com"]);
}

#[test]
fn cursor_defaults_to_lower_sentinel() {
    let (_dir, catalog) = open("a.com");
    assert_eq!(catalog.get_cursor().unwrap(), catalog.lower());
}

#[test]
fn cursor_round_trips_and_resets() {
    let (_dir, catalog) = open("a.com");
    catalog.add("https://a.com/x").unwrap();
    let key = catalog.key_of("https://a.com/x");
    catalog.set_cursor(Some(&key)).unwrap();
    assert_eq!(catalog.get_cursor().unwrap(), key);
    catalog.set_cursor(None).unwrap();
    assert_eq!(catalog.get_cursor().unwrap(), catalog.lower());
}

#[test]
fn iterate_after_skips_the_stored_key() {
    let (_dir, catalog) = open("a.com");
    for path in ["/1", "/2", "/3"] {
        catalog.add(&format!("https://a.com{path}")).unwrap();
    }
    let cursor = catalog.key_of("https://a.com/2");
    let rest: Vec<String> = catalog
        .iterate_after(&cursor)
        .map(|entry| entry.unwrap().1)
        .collect();
    assert_eq!(rest, ["https://a.com/3"]);
}

#[test]
fn current_index_counts_keys_up_to_the_cursor() {
    let (_dir, catalog) = open("a.com");
    for path in ["/1", "/2", "/3", "/4"] {
        catalog.add(&format!("https://a.com{path}")).unwrap();
    }
    assert_eq!(catalog.current_index().unwrap(), 0);
    catalog
        .set_cursor(Some(&catalog.key_of("https://a.com/2")))
        .unwrap();
    assert_eq!(catalog.current_index().unwrap(), 2);
    assert_eq!(catalog.total().unwrap(), 4);
}
