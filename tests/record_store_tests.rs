mod common;

use chrono::NaiveDate;
use common::{UnreachableDurable, offline_store};
use procure_store::{
    CollectionKind, EventKind, IdStrategy, MaterialFilter, MaterialPatch, MemoryCache, NewMaterial,
    NewRequest, NewUser, RecordStore, RequestFilter, RequestPatch, RequestStatus, Role, StoreConfig,
    StoreError, StoreEvent, UserPatch, paginate,
};
use std::sync::{Arc, Mutex};

fn employee(login: &str) -> NewUser {
    NewUser {
        full_name: "Ivan Sidorov".to_string(),
        role: Role::Employee,
        login: login.to_string(),
        password: "secret".to_string(),
        department: None,
    }
}

fn request_for(user_id: u64, material: &str) -> NewRequest {
    NewRequest {
        user_id,
        material_name: material.to_string(),
        quantity: 10,
        unit: None,
        required_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
        justification: "Restock for the assembly line".to_string(),
    }
}

#[tokio::test]
async fn test_bolt_and_nut_scenario() {
    let (store, _) = offline_store().await;

    let bolt = store
        .add_material(NewMaterial::named("Bolt").unit("pcs"))
        .await
        .unwrap();
    assert_eq!(bolt.id, 1);
    assert_eq!(bolt.name, "Bolt");
    assert_eq!(bolt.unit, "pcs");

    let nut = store.add_material(NewMaterial::named("Nut")).await.unwrap();
    assert_eq!(nut.id, 2);
    assert_eq!(nut.unit, StoreConfig::DEFAULT_UNIT);

    assert!(store.delete_material(1).await.unwrap());
    let remaining = store.all_materials().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, 2);
}

#[tokio::test]
async fn test_ids_increase_by_one() {
    let (store, _) = offline_store().await;
    for expected in 1..=5 {
        let material = store
            .add_material(NewMaterial::named(format!("Item {expected}")))
            .await
            .unwrap();
        assert_eq!(material.id, expected);
    }
}

#[tokio::test]
async fn test_deleted_newest_id_is_not_reissued_by_default() {
    let (store, _) = offline_store().await;
    store.add_material(NewMaterial::named("Bolt")).await.unwrap();
    store.add_material(NewMaterial::named("Nut")).await.unwrap();
    assert!(store.delete_material(2).await.unwrap());

    let washer = store.add_material(NewMaterial::named("Washer")).await.unwrap();
    assert_eq!(washer.id, 3);
}

#[tokio::test]
async fn test_max_plus_one_reissues_deleted_newest_id() {
    let store = RecordStore::open(
        StoreConfig::new().id_strategy(IdStrategy::MaxPlusOne),
        Arc::new(UnreachableDurable),
        Arc::new(MemoryCache::new()),
    )
    .await;
    store.add_material(NewMaterial::named("Bolt")).await.unwrap();
    store.add_material(NewMaterial::named("Nut")).await.unwrap();
    store.delete_material(2).await.unwrap();

    let washer = store.add_material(NewMaterial::named("Washer")).await.unwrap();
    assert_eq!(washer.id, 2);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (store, _) = offline_store().await;
    let bolt = store.add_material(NewMaterial::named("Bolt")).await.unwrap();
    store.add_material(NewMaterial::named("Nut")).await.unwrap();

    assert!(store.delete_material(bolt.id).await.unwrap());
    assert!(!store.delete_material(bolt.id).await.unwrap());
    assert_eq!(store.all_materials().await.len(), 1);
}

#[tokio::test]
async fn test_update_unknown_id_is_a_noop() {
    let (store, _) = offline_store().await;
    let updated = store
        .update_material(
            42,
            MaterialPatch {
                unit: Some("kg".to_string()),
                ..MaterialPatch::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.is_none());
}

#[tokio::test]
async fn test_update_merges_fields_and_keeps_id() {
    let (store, _) = offline_store().await;
    let bolt = store
        .add_material(NewMaterial::named("Bolt").specifications("M8x40"))
        .await
        .unwrap();

    let updated = store
        .update_material(
            bolt.id,
            MaterialPatch {
                unit: Some("box".to_string()),
                ..MaterialPatch::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.id, bolt.id);
    assert_eq!(updated.unit, "box");
    assert_eq!(updated.specifications.as_deref(), Some("M8x40"));
    assert_eq!(store.material_by_id(bolt.id).await, Some(updated));
}

#[tokio::test]
async fn test_blank_material_name_is_rejected() {
    let (store, _) = offline_store().await;
    let err = store.add_material(NewMaterial::named("   ")).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(store.all_materials().await.is_empty());
}

#[tokio::test]
async fn test_mutations_write_through_to_cache() {
    let (store, cache) = offline_store().await;
    store.add_material(NewMaterial::named("Bolt")).await.unwrap();

    let cached = procure_store::LocalCache::get(cache.as_ref(), "materials")
        .unwrap()
        .unwrap();
    assert!(cached.contains("\"name\":\"Bolt\""));
}

#[tokio::test]
async fn test_logins_are_unique() {
    let (store, _) = offline_store().await;
    let ivan = store.add_user(employee("ivan")).await.unwrap();
    assert_eq!(ivan.department, "Sales");

    let err = store.add_user(employee("ivan")).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateLogin(login) if login == "ivan"));

    let olga = store.add_user(employee("olga")).await.unwrap();
    let err = store
        .update_user(
            olga.id,
            UserPatch {
                login: Some("ivan".to_string()),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateLogin(_)));

    // Keeping one's own login is not a conflict.
    let renamed = store
        .update_user(
            ivan.id,
            UserPatch {
                login: Some("ivan".to_string()),
                full_name: Some("Ivan S.".to_string()),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.full_name, "Ivan S.");
}

#[tokio::test]
async fn test_authenticate_and_lookup_by_login() {
    let (store, _) = offline_store().await;
    store.add_user(employee("ivan")).await.unwrap();

    assert!(store.authenticate("ivan", "secret").await.is_some());
    assert!(store.authenticate("ivan", "wrong").await.is_none());
    assert!(store.authenticate("nobody", "secret").await.is_none());
    assert_eq!(store.user_by_login("ivan").await.unwrap().role, Role::Employee);
}

#[tokio::test]
async fn test_request_starts_pending_with_catalog_unit() {
    let (store, _) = offline_store().await;
    let user = store.add_user(employee("ivan")).await.unwrap();
    store
        .add_material(NewMaterial::named("Cable").unit("m"))
        .await
        .unwrap();

    let request = store.add_request(request_for(user.id, "Cable")).await.unwrap();
    assert_eq!(request.id, 1);
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.unit, "m");
    assert!(request.updated_at.is_none());

    let err = store.add_request(request_for(99, "Cable")).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    let mut short = request_for(user.id, "Cable");
    short.justification = "because".to_string();
    assert!(store.add_request(short).await.is_err());
}

#[tokio::test]
async fn test_request_workflow() {
    let (store, _) = offline_store().await;
    let user = store.add_user(employee("ivan")).await.unwrap();
    let first = store.add_request(request_for(user.id, "Bolt")).await.unwrap();
    let second = store.add_request(request_for(user.id, "Nut")).await.unwrap();

    let err = store.confirm_request(first.id).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::InvalidTransition {
            from: RequestStatus::Pending,
            to: RequestStatus::Confirmed,
            ..
        }
    ));

    let approved = store.approve_request(first.id).await.unwrap().unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert!(approved.updated_at.is_some());
    let confirmed = store.confirm_request(first.id).await.unwrap().unwrap();
    assert_eq!(confirmed.status, RequestStatus::Confirmed);

    assert!(store.reject_request(second.id, "  ").await.is_err());
    let rejected = store
        .reject_request(second.id, "Out of budget")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rejected.rejection_comment.as_deref(), Some("Out of budget"));

    assert!(store.approve_request(404).await.unwrap().is_none());
    assert_eq!(store.requests_by_status(RequestStatus::Confirmed).await.len(), 1);
    assert_eq!(store.requests_for_user(user.id).await.len(), 2);
}

#[tokio::test]
async fn test_generic_request_update_is_permissive() {
    let (store, _) = offline_store().await;
    let user = store.add_user(employee("ivan")).await.unwrap();
    let request = store.add_request(request_for(user.id, "Bolt")).await.unwrap();

    let updated = store
        .update_request(request.id, RequestPatch::status(RequestStatus::Confirmed))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, RequestStatus::Confirmed);
    assert!(updated.updated_at.is_some());
}

#[tokio::test]
async fn test_filter_then_paginate() {
    let (store, _) = offline_store().await;
    let user = store.add_user(employee("ivan")).await.unwrap();
    for i in 0..12 {
        let name = if i % 3 == 0 { "Copper cable" } else { "Bolt" };
        store.add_request(request_for(user.id, name)).await.unwrap();
    }

    let bolts = store
        .filter_requests(&RequestFilter {
            search: Some("BOLT".to_string()),
            ..RequestFilter::default()
        })
        .await;
    assert_eq!(bolts.len(), 8);

    let page = paginate(&bolts, 2, 5);
    assert_eq!(page.data.len(), 3);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.data, bolts[5..8].to_vec());

    let catalog = store
        .filter_materials(&MaterialFilter {
            search: Some("bolt".to_string()),
        })
        .await;
    assert!(catalog.is_empty());
}

#[tokio::test]
async fn test_add_fans_out_in_subscription_order_despite_panics() {
    let (store, _) = offline_store().await;
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = seen.clone();
    store.subscribe(EventKind::MaterialAdded, move |_| {
        log.lock().unwrap().push("first");
        panic!("first handler failed");
    });
    let log = seen.clone();
    store.subscribe(EventKind::MaterialAdded, move |event| {
        if let StoreEvent::MaterialAdded(material) = event {
            log.lock().unwrap().push(if material.name == "Bolt" { "second" } else { "?" });
        }
    });
    let log = seen.clone();
    store.subscribe(EventKind::MaterialsChanged, move |event| {
        assert_eq!(event, &StoreEvent::CollectionChanged(CollectionKind::Materials));
        log.lock().unwrap().push("changed");
    });

    store.add_material(NewMaterial::named("Bolt")).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "changed"]);
}

#[tokio::test]
async fn test_unsubscribed_handler_is_not_called() {
    let (store, _) = offline_store().await;
    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    let id = store.subscribe(EventKind::MaterialDeleted, move |_| {
        *counter.lock().unwrap() += 1;
    });

    let bolt = store.add_material(NewMaterial::named("Bolt")).await.unwrap();
    assert!(store.unsubscribe(EventKind::MaterialDeleted, id));
    store.delete_material(bolt.id).await.unwrap();
    assert_eq!(*calls.lock().unwrap(), 0);
}
