use std::num::NonZeroU32;

use super::*;
use shared::{form::REQUIRED_MESSAGE, record::FieldValue};
use storage::Storage;

async fn setup(per_page: u32) -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    ApiContext::new(
        Arc::new(storage),
        Paginator::new(NonZeroU32::new(per_page).expect("page size")),
    )
}

fn form(pairs: &[(&str, &str)]) -> RawForm {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn query(search: Option<&str>, page: Option<&str>) -> ListQuery {
    ListQuery {
        search: search.map(str::to_string),
        page: page.map(str::to_string),
    }
}

fn names(view: &ListView) -> Vec<String> {
    view.page
        .items
        .iter()
        .map(|record| record.value("name").to_form_string())
        .collect()
}

async fn seed_equipment(ctx: &ApiContext, count: usize) {
    for i in 0..count {
        let name = format!("Item-{i:02}");
        let outcome = submit_create(ctx, EntityKind::Equipment, &form(&[("name", name.as_str())]))
            .await
            .expect("create");
        assert_eq!(outcome, FormOutcome::Redirect("/equipment/search".into()));
    }
}

#[tokio::test]
async fn search_filters_and_paginates_in_insertion_order() {
    let ctx = setup(10).await;
    seed_equipment(&ctx, 25).await;

    let view = search_and_list(&ctx, EntityKind::Equipment, &query(Some("Item-1"), Some("1")))
        .await
        .expect("list");
    let expected: Vec<String> = (10..20).map(|i| format!("Item-{i}")).collect();
    assert_eq!(names(&view), expected);
    assert_eq!(view.page.number, 1);
    assert_eq!(view.page.num_pages, 1);
    assert_eq!(view.page.total_count, 10);
    assert_eq!(view.search.as_deref(), Some("Item-1"));
    assert_eq!(view.template, "equipment/search.html");
}

#[tokio::test]
async fn page_past_the_end_returns_last_page() {
    let ctx = setup(10).await;
    seed_equipment(&ctx, 25).await;

    let view = search_and_list(&ctx, EntityKind::Equipment, &query(None, Some("99")))
        .await
        .expect("list");
    assert_eq!(view.page.number, 3);
    assert_eq!(view.page.items.len(), 5);
    assert_eq!(names(&view)[0], "Item-20");
    assert!(!view.page.has_next);
}

#[tokio::test]
async fn malformed_page_falls_back_to_first_page() {
    let ctx = setup(10).await;
    seed_equipment(&ctx, 25).await;

    for raw_page in ["abc", "0", "-2", ""] {
        let view = search_and_list(&ctx, EntityKind::Equipment, &query(None, Some(raw_page)))
            .await
            .expect("list");
        assert_eq!(view.page.number, 1, "page={raw_page}");
        assert_eq!(names(&view)[0], "Item-00");
    }

    let second = search_and_list(&ctx, EntityKind::Equipment, &query(Some(""), Some("2")))
        .await
        .expect("list");
    assert_eq!(second.page.number, 2);
    assert_eq!(second.page.total_count, 25);
    assert_eq!(second.search, None);
}

#[tokio::test]
async fn every_listed_record_contains_the_search_term() {
    let ctx = setup(50).await;
    for info in ["fragile", "Fragile glass", "cold chain", "keep fragile side up"] {
        submit_create(
            &ctx,
            EntityKind::Box,
            &form(&[("label", "B"), ("additional_info", info)]),
        )
        .await
        .expect("create");
    }

    let view = search_and_list(&ctx, EntityKind::Box, &query(Some("fragile"), None))
        .await
        .expect("list");
    assert_eq!(view.page.items.len(), 2);
    for record in &view.page.items {
        let info = record.value("additional_info").as_text().expect("text");
        assert!(info.contains("fragile"));
    }
}

#[tokio::test]
async fn trip_list_ignores_search() {
    let ctx = setup(10).await;
    submit_create(
        &ctx,
        EntityKind::Trip,
        &form(&[
            ("origin_hospital_id", "1"),
            ("destination_hospital_id", "2"),
            ("departure_date", "2024-01-15"),
        ]),
    )
    .await
    .expect("create");

    let view = search_and_list(&ctx, EntityKind::Trip, &query(Some("zzz"), None))
        .await
        .expect("list");
    assert_eq!(view.page.items.len(), 1);
    assert_eq!(view.search, None);
}

#[tokio::test]
async fn invalid_create_rebinds_form_and_persists_nothing() {
    let ctx = setup(10).await;
    let outcome = submit_create(&ctx, EntityKind::Hospital, &form(&[("name", "")]))
        .await
        .expect("create");

    let FormOutcome::Rebound(view) = outcome else {
        panic!("expected rebound form");
    };
    assert_eq!(
        view.field("name").expect("name field").errors,
        vec![REQUIRED_MESSAGE.to_string()]
    );
    let count = ctx
        .store
        .count(EntityKind::Hospital, None)
        .await
        .expect("count");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn create_then_edit_form_round_trips_values() {
    let ctx = setup(10).await;
    submit_create(
        &ctx,
        EntityKind::Hospital,
        &form(&[("name", "Hospital das Clinicas"), ("city", "Sao Paulo")]),
    )
    .await
    .expect("create");
    let id = ctx
        .store
        .list(EntityKind::Hospital, None, 1, 0)
        .await
        .expect("list")[0]
        .id;

    let view = edit_form(&ctx, EntityKind::Hospital, id).await.expect("edit");
    assert_eq!(view.record_id, Some(id));
    assert_eq!(view.action, format!("/hospital/edit/{}", id.0));
    assert_eq!(view.field("name").expect("name").value, "Hospital das Clinicas");
    assert_eq!(view.field("city").expect("city").value, "Sao Paulo");
}

#[tokio::test]
async fn edit_with_unchanged_values_is_idempotent() {
    let ctx = setup(10).await;
    let submitted = form(&[
        ("label", "BX-7"),
        ("equipment_id", "3"),
        ("additional_info", "spare"),
    ]);
    submit_create(&ctx, EntityKind::Box, &submitted)
        .await
        .expect("create");
    let before = ctx
        .store
        .list(EntityKind::Box, None, 1, 0)
        .await
        .expect("list")
        .remove(0);

    let outcome = submit_edit(&ctx, EntityKind::Box, before.id, &submitted)
        .await
        .expect("edit");
    assert_eq!(outcome, FormOutcome::Redirect("/box/search".into()));

    let after = ctx
        .store
        .get(EntityKind::Box, before.id)
        .await
        .expect("get")
        .expect("record");
    assert_eq!(after.id, before.id);
    assert_eq!(after.values, before.values);
    assert_eq!(after.value("equipment_id"), &FieldValue::Integer(3));
}

#[tokio::test]
async fn invalid_edit_keeps_stored_record() {
    let ctx = setup(10).await;
    submit_create(&ctx, EntityKind::Equipment, &form(&[("name", "Pump")]))
        .await
        .expect("create");
    let id = RecordId(1);

    let outcome = submit_edit(&ctx, EntityKind::Equipment, id, &form(&[("name", " ")]))
        .await
        .expect("edit");
    let FormOutcome::Rebound(view) = outcome else {
        panic!("expected rebound form");
    };
    assert!(view.has_errors());
    assert_eq!(view.record_id, Some(id));

    let stored = ctx
        .store
        .get(EntityKind::Equipment, id)
        .await
        .expect("get")
        .expect("record");
    assert_eq!(stored.value("name"), &FieldValue::Text("Pump".into()));
}

#[tokio::test]
async fn edit_of_unknown_trip_is_not_found() {
    let ctx = setup(10).await;
    let err = edit_form(&ctx, EntityKind::Trip, RecordId(404))
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = submit_edit(&ctx, EntityKind::Trip, RecordId(404), &RawForm::new())
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[test]
fn create_form_is_unbound() {
    let view = create_form(EntityKind::Equipment);
    assert_eq!(view.action, "/equipment/create");
    assert!(!view.has_errors());
    assert!(view.fields.iter().all(|field| field.value.is_empty()));
}

#[test]
fn repeated_query_keys_keep_last_value() {
    let pairs = [
        ("page", "2"),
        ("search", "a"),
        ("sort", "name"),
        ("page", "3"),
        ("search", "b"),
    ]
    .map(|(k, v)| (k.to_string(), v.to_string()));
    let query = ListQuery::from_pairs(pairs);
    assert_eq!(query.page.as_deref(), Some("3"));
    assert_eq!(query.search.as_deref(), Some("b"));

    let empty = ListQuery::from_pairs(Vec::new());
    assert_eq!(empty.page, None);
    assert_eq!(empty.search, None);
}
