use imgproxy_core::{DedupLedger, LedgerKey, Surface};

#[test]
fn second_attempt_is_reported_as_processed() {
    let mut ledger = DedupLedger::new(true);
    let key = LedgerKey::url("https://cdn.example/a.png");

    assert!(ledger.should_process(&key));
    ledger.mark_processed(&key);
    assert!(!ledger.should_process(&key));
    assert_eq!(ledger.len(), 1);
}

#[test]
fn namespaces_keep_surfaces_apart() {
    let mut ledger = DedupLedger::new(true);
    let url = "https://cdn.example/a.png";
    ledger.mark_processed(&LedgerKey::url(url));

    assert!(ledger.should_process(&LedgerKey::namespaced(Surface::Background, url)));
    assert!(ledger.should_process(&LedgerKey::namespaced(Surface::Poster, url)));
    assert!(ledger.should_process(&LedgerKey::namespaced(
        Surface::Attribute("data-src".into()),
        url
    )));
}

#[test]
fn compound_keys_render_with_namespace_prefix() {
    let key = LedgerKey::namespaced(Surface::Attribute("data-lazy-src".into()), "a.png");
    assert_eq!(key.to_string(), "data-lazy-src:a.png");
    assert_eq!(
        LedgerKey::namespaced(Surface::Srcset, "a.jpg 1x").to_string(),
        "srcset:a.jpg 1x"
    );
    assert_eq!(LedgerKey::namespaced(Surface::Background, "b.png").to_string(), "bg:b.png");
}

#[test]
fn disabled_enforcement_still_records() {
    let mut ledger = DedupLedger::new(false);
    let key = LedgerKey::url("https://cdn.example/a.png");
    ledger.mark_processed(&key);

    assert!(ledger.should_process(&key));
    assert!(ledger.contains(&key));
}
