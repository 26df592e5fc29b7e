use std::sync::Arc;
use tierquota::{
    AccountStore, FileRecordStore, ManualClock, MembershipTier, PolicyTable, QuotaConfig,
    QuotaError, QuotaEvaluator, QuotaService, ResourceCategory,
};

#[tokio::test]
async fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(1_000);

    {
        let store = Arc::new(AccountStore::new(FileRecordStore::open(dir.path()).await.unwrap()));
        store.register("alice", MembershipTier::Basic).await.unwrap();
        let evaluator = QuotaEvaluator::new(store, Arc::new(PolicyTable::default_table()))
            .with_clock(clock.clone());
        assert!(evaluator.evaluate("alice", ResourceCategory::Espresso).await.unwrap().is_allowed());
    }

    let store = Arc::new(AccountStore::new(FileRecordStore::open(dir.path()).await.unwrap()));
    let evaluator = QuotaEvaluator::new(store.clone(), Arc::new(PolicyTable::default_table()))
        .with_clock(clock.clone());
    let d = evaluator.evaluate("alice", ResourceCategory::Espresso).await.unwrap();
    assert!(!d.is_allowed());
    assert_eq!(d.amount_consumed(), 1);

    let err = store.register("alice", MembershipTier::CoffeeLover).await.unwrap_err();
    assert!(matches!(err, QuotaError::AlreadyRegistered { .. }));
}

#[tokio::test]
async fn record_layout_is_one_json_document_per_user() {
    let dir = tempfile::tempdir().unwrap();
    let store = AccountStore::new(FileRecordStore::open(dir.path()).await.unwrap());
    store.register("bob", MembershipTier::EspressoManiac).await.unwrap();

    let raw = std::fs::read_to_string(dir.path().join("bob.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["tier"], "espresso_maniac");
    assert!(json["quota_state"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn corrupt_record_affects_only_its_user() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.json"), b"{\"tier\": 42").unwrap();

    let store = AccountStore::new(FileRecordStore::open(dir.path()).await.unwrap());
    store.register("fine", MembershipTier::Basic).await.unwrap();

    let err = store.get("broken").await.unwrap_err();
    assert!(matches!(err, QuotaError::CorruptRecord { .. }));
    assert!(store.get("fine").await.unwrap().is_some());
}

#[tokio::test]
async fn service_from_config_and_reset() {
    let dir = tempfile::tempdir().unwrap();
    let config = QuotaConfig::new(dir.path().join("db"));
    let service = QuotaService::from_config(&config).await.unwrap();

    service.register_user("carol", "espresso maniac").await.unwrap();
    assert!(dir.path().join("db").join("carol.json").exists());

    service.reset_all().await.unwrap();
    assert!(!dir.path().join("db").join("carol.json").exists());
    assert!(dir.path().join("db").exists());
    let outcome = service.evaluate("carol", "espresso").await.unwrap();
    assert!(!outcome.is_allowed());
}

#[tokio::test]
async fn config_file_drives_policies() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quota.json");
    let mut tiers = Vec::new();
    for tier in ["basic", "coffee_lover", "espresso_maniac"] {
        tiers.push(serde_json::json!({
            "tier": tier,
            "quotas": [
                { "category": "espresso", "allowance": 2, "window_secs": 60 },
                { "category": "americano", "allowance": 2, "window_secs": 60 },
                { "category": "cappuccino", "allowance": 2, "window_secs": 60 }
            ]
        }));
    }
    let json = serde_json::json!({ "data_dir": dir.path().join("db"), "policies": tiers });
    std::fs::write(&path, json.to_string()).unwrap();

    let config = QuotaConfig::from_json_file(&path).unwrap();
    let service = QuotaService::from_config(&config).await.unwrap();
    service.register_user("dan", "basic").await.unwrap();
    assert!(service.evaluate("dan", "espresso").await.unwrap().is_allowed());
    assert!(service.evaluate("dan", "espresso").await.unwrap().is_allowed());
    assert!(!service.evaluate("dan", "espresso").await.unwrap().is_allowed());
}
