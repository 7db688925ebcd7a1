use serde_json::json;
use std::io::Cursor;
use wiremock::matchers::{body_json, header, headers, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zoodb::auth::Privilege;
use zoodb::model::{BreedDraft, CategoryDraft, LogKind};
use zoodb::reconciler::{FieldKey, SaveStatus};
use zoodb::{Config, Error, ZooDb};

fn db_for(server: &MockServer) -> ZooDb {
    let config = Config::new(&server.uri(), "test-anon-key").unwrap();
    ZooDb::new(config)
}

fn breed_row() -> serde_json::Value {
    json!({
        "id": 42,
        "pet_type_id": 7,
        "name": "Border Collie",
        "image_url": "sb://breed-images/collie.jpg",
        "breed_tags": [{"tag": "smart"}, {"tag": "herding"}]
    })
}

#[tokio::test]
async fn pet_types_are_listed_by_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/pet_types"))
        .and(query_param("select", "id,name"))
        .and(query_param("order", "name.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "Cat"},
            {"id": 2, "name": "Dog"}
        ])))
        .mount(&server)
        .await;

    let db = db_for(&server);
    let types = db.catalog().pet_types().await.unwrap();

    assert_eq!(types.len(), 2);
    assert_eq!(types[0].id, "1");
    assert_eq!(types[1].name, "Dog");
}

#[tokio::test]
async fn breed_listings_embed_their_tags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/breeds"))
        .and(query_param(
            "select",
            "id,name,image_url,pet_type_id,breed_tags(tag)",
        ))
        .and(query_param("pet_type_id", "eq.7"))
        .and(query_param("order", "name.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([breed_row()])))
        .mount(&server)
        .await;

    let db = db_for(&server);
    let breeds = db.catalog().breeds_for_type("7").await.unwrap();

    assert_eq!(breeds.len(), 1);
    assert_eq!(breeds[0].id, "42");
    assert_eq!(breeds[0].tags, vec!["smart", "herding"]);
}

#[tokio::test]
async fn breed_detail_selects_every_column() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/breeds"))
        .and(query_param("select", "*,breed_tags(tag)"))
        .and(query_param("id", "eq.42"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([breed_row()])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/breeds"))
        .and(query_param("id", "eq.404"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let db = db_for(&server);

    let found = db.catalog().breed("42").await.unwrap();
    assert_eq!(found.unwrap().name, "Border Collie");

    let missing = db.catalog().breed("404").await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn breed_validation_fails_before_any_request() {
    let server = MockServer::start().await;
    let db = db_for(&server);

    let no_type = BreedDraft {
        name: "Border Collie".into(),
        ..Default::default()
    };
    let err = db.catalog().upsert_breed(&no_type).await.unwrap_err();
    assert_eq!(err.to_string(), "validation error: pick a pet type for this breed");

    let no_name = BreedDraft {
        pet_type_id: "7".into(),
        name: "   ".into(),
        ..Default::default()
    };
    let err = db.catalog().upsert_breed(&no_name).await.unwrap_err();
    assert_eq!(err.to_string(), "validation error: breed name is required");

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn breed_upsert_sends_a_trimmed_merge_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/breeds"))
        .and(headers(
            "Prefer",
            vec!["return=representation", "resolution=merge-duplicates"],
        ))
        .and(body_json(json!({
            "id": "42",
            "pet_type_id": "7",
            "name": "Border Collie",
            "proper_name": null,
            "description": "Happiest with a job to do",
            "image_url": null,
            "lifespan": null,
            "size": null,
            "height_weight": null,
            "group": null,
            "origin": "Scotland"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([breed_row()])))
        .mount(&server)
        .await;

    let db = db_for(&server);
    let draft = BreedDraft {
        id: "42".into(),
        pet_type_id: "7".into(),
        name: "  Border Collie ".into(),
        proper_name: "   ".into(),
        description: " Happiest with a job to do ".into(),
        origin: "Scotland".into(),
        ..Default::default()
    };

    let breed = db.catalog().upsert_breed(&draft).await.unwrap();
    assert_eq!(breed.id, "42");
}

#[tokio::test]
async fn a_new_breed_omits_the_id_so_the_row_inserts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/breeds"))
        .and(body_json(json!({
            "pet_type_id": "7",
            "name": "Maine Coon",
            "proper_name": null,
            "description": null,
            "image_url": null,
            "lifespan": null,
            "size": null,
            "height_weight": null,
            "group": null,
            "origin": null
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"id": 9, "pet_type_id": 7, "name": "Maine Coon"}
        ])))
        .mount(&server)
        .await;

    let db = db_for(&server);
    let draft = BreedDraft {
        pet_type_id: "7".into(),
        name: "Maine Coon".into(),
        ..Default::default()
    };

    let breed = db.catalog().upsert_breed(&draft).await.unwrap();
    assert_eq!(breed.id, "9");
}

#[tokio::test]
async fn saving_a_breed_replaces_its_tag_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/breeds"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"id": 42, "pet_type_id": 7, "name": "Border Collie"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/breed_tags"))
        .and(query_param("breed_id", "eq.42"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/breed_tags"))
        .and(header("Prefer", "return=minimal"))
        .and(body_json(json!([
            {"breed_id": "42", "tag": "loud"},
            {"breed_id": "42", "tag": "kid-friendly"}
        ])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let db = db_for(&server);
    let draft = BreedDraft {
        id: "42".into(),
        pet_type_id: "7".into(),
        name: "Border Collie".into(),
        ..Default::default()
    };
    let raw_tags = vec![
        "  Loud ".to_string(),
        "KID  Friendly".to_string(),
        "loud".to_string(),
    ];

    let breed = db
        .catalog()
        .save_breed_with_tags(&draft, &raw_tags)
        .await
        .unwrap();

    assert_eq!(breed.tags, vec!["loud", "kid-friendly"]);

    // old tag rows go before the new ones arrive
    let requests = server.received_requests().await.unwrap();
    let tag_methods: Vec<String> = requests
        .iter()
        .filter(|r| r.url.path() == "/rest/v1/breed_tags")
        .map(|r| r.method.to_string())
        .collect();
    assert_eq!(tag_methods, vec!["DELETE", "POST"]);
}

#[tokio::test]
async fn a_tag_failure_after_the_breed_saved_reads_as_partial() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/breeds"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"id": 42, "pet_type_id": 7, "name": "Border Collie"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/breed_tags"))
        .respond_with(ResponseTemplate::new(500).set_body_string("permission denied"))
        .mount(&server)
        .await;

    let db = db_for(&server);
    let draft = BreedDraft {
        id: "42".into(),
        pet_type_id: "7".into(),
        name: "Border Collie".into(),
        ..Default::default()
    };

    let err = db
        .catalog()
        .save_breed_with_tags(&draft, &["loud".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Partial { .. }));
    let message = err.to_string();
    assert!(message.starts_with("breed saved but tags failed:"), "{message}");
}

#[tokio::test]
async fn a_failed_reinsert_reports_the_tags_as_cleared() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/breed_tags"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/breed_tags"))
        .respond_with(ResponseTemplate::new(500).set_body_string("permission denied"))
        .mount(&server)
        .await;

    let db = db_for(&server);
    let err = db
        .catalog()
        .replace_tags("42", &["loud".to_string()])
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("tags cleared but re-insert failed:"), "{message}");
}

#[tokio::test]
async fn an_all_duplicate_tag_set_ends_at_the_delete() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/breed_tags"))
        .and(query_param("breed_id", "eq.42"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let db = db_for(&server);
    let tags = db
        .catalog()
        .replace_tags("42", &["   ".to_string(), "".to_string()])
        .await
        .unwrap();

    assert!(tags.is_empty());
    // nothing but the delete went over the wire
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn committing_the_same_tags_twice_repeats_the_same_writes() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/breed_tags"))
        .and(query_param("breed_id", "eq.42"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/breed_tags"))
        .and(body_json(json!([
            {"breed_id": "42", "tag": "loud"},
            {"breed_id": "42", "tag": "kid-friendly"}
        ])))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;

    let db = db_for(&server);
    let raw = vec!["  Loud ".to_string(), "Kid Friendly".to_string()];

    let first = db.catalog().replace_tags("42", &raw).await.unwrap();
    let second = db.catalog().replace_tags("42", &raw).await.unwrap();

    assert_eq!(first, vec!["loud", "kid-friendly"]);
    assert_eq!(second, first);

    // each commit is the same delete-then-insert pair
    let tag_methods: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/rest/v1/breed_tags")
        .map(|r| r.method.to_string())
        .collect();
    assert_eq!(tag_methods, vec!["DELETE", "POST", "DELETE", "POST"]);
}

#[tokio::test]
async fn categories_come_back_in_sort_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/care_categories"))
        .and(query_param("select", "id,name,icon,sort_order"))
        .and(query_param("order", "sort_order.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "Feeding", "icon": "🍖", "sort_order": 1},
            {"id": 2, "name": "Grooming", "icon": null, "sort_order": 2}
        ])))
        .mount(&server)
        .await;

    let db = db_for(&server);
    let categories = db.catalog().categories().await.unwrap();

    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0].icon.as_deref(), Some("🍖"));
    assert_eq!(categories[1].icon, None);
}

#[tokio::test]
async fn category_upsert_defaults_the_icon() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/care_categories"))
        .and(body_json(json!({
            "name": "Feeding",
            "icon": "📌",
            "sort_order": 3
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"id": 5, "name": "Feeding", "icon": "📌", "sort_order": 3}
        ])))
        .mount(&server)
        .await;

    let db = db_for(&server);
    let draft = CategoryDraft {
        name: " Feeding ".into(),
        icon: "  ".into(),
        sort_order: 3,
        ..Default::default()
    };

    let category = db.catalog().upsert_category(&draft).await.unwrap();
    assert_eq!(category.id, "5");
}

#[tokio::test]
async fn guides_read_as_a_category_map_with_blank_missing_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/care_guides"))
        .and(query_param("select", "category_id,content"))
        .and(query_param("breed_id", "eq.42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"category_id": 1, "content": "Feed twice daily"},
            {"category_id": 2, "content": null}
        ])))
        .mount(&server)
        .await;

    let db = db_for(&server);
    let guides = db.catalog().guides_for_breed("42").await.unwrap();

    assert_eq!(guides.get("1").map(String::as_str), Some("Feed twice daily"));
    assert_eq!(guides.get("2").map(String::as_str), Some(""));
}

#[tokio::test]
async fn guide_upserts_target_the_breed_category_pair() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/care_guides"))
        .and(query_param("on_conflict", "breed_id,category_id"))
        .and(headers(
            "Prefer",
            vec!["return=representation", "resolution=merge-duplicates"],
        ))
        .and(body_json(json!({
            "breed_id": "42",
            "category_id": "3",
            "content": "Short coat, weekly brush"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"breed_id": 42, "category_id": 3, "content": "Short coat, weekly brush"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let db = db_for(&server);
    let result = db
        .catalog()
        .upsert_guide("42", "3", "Short coat, weekly brush")
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn the_guide_editor_loads_and_saves_through_the_facade() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/care_guides"))
        .and(query_param("breed_id", "eq.42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"category_id": 1, "content": "Feed twice daily"},
            {"category_id": 2, "content": null}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/care_guides"))
        .and(query_param("on_conflict", "breed_id,category_id"))
        .and(body_json(json!({
            "breed_id": "42",
            "category_id": "1",
            "content": "Feed three times daily"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"breed_id": 42, "category_id": 1, "content": "Feed three times daily"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let db = db_for(&server);
    db.open_breed_guides("42").await.unwrap();

    let feeding = FieldKey::new("42", "1");
    let editor = db.guide_editor();
    assert_eq!(editor.snapshot(&feeding).await.persisted, "Feed twice daily");
    assert_eq!(editor.snapshot(&FieldKey::new("42", "2")).await.persisted, "");

    editor.set_draft(&feeding, "  Feed three times daily ").await;
    editor.save(&feeding).await;

    let state = editor.snapshot(&feeding).await;
    assert_eq!(state.persisted, "Feed three times daily");
    assert_eq!(state.status, SaveStatus::Saved);
}

#[tokio::test]
async fn image_uploads_come_back_as_storage_pointers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(
            r"^/storage/v1/object/breed-images/[0-9a-f-]{36}\.jpg$",
        ))
        .and(header("x-upsert", "false"))
        .and(header("Content-Type", "image/jpeg"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Key": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let src = image::RgbImage::from_fn(64, 36, |x, _| image::Rgb([(x * 4) as u8, 80, 120]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(src)
        .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
        .unwrap();

    let db = db_for(&server);
    let pointer = db.catalog().upload_breed_image(&png).await.unwrap();

    assert!(pointer.starts_with("sb://breed-images/"), "{pointer}");
    assert!(pointer.ends_with(".jpg"));
}

#[tokio::test]
async fn undecodable_image_bytes_never_reach_storage() {
    let server = MockServer::start().await;
    let db = db_for(&server);

    let err = db
        .catalog()
        .upload_breed_image(b"not an image at all")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Image(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn admin_image_pointers_prefer_signed_urls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/sign/breed-images/collie.jpg"))
        .and(body_json(json!({"expiresIn": 3600})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "signedURL": "/object/sign/breed-images/collie.jpg?token=abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let db = db_for(&server);
    let url = db
        .resolver()
        .resolve("sb://breed-images/collie.jpg", Privilege::Admin)
        .await;

    assert_eq!(
        url,
        format!(
            "{}/storage/v1/object/sign/breed-images/collie.jpg?token=abc",
            server.uri()
        )
    );

    // the second look is served from the cache; expect(1) above holds
    let again = db
        .resolver()
        .resolve("sb://breed-images/collie.jpg", Privilege::Admin)
        .await;
    assert_eq!(again, url);
}

#[tokio::test]
async fn anonymous_image_pointers_use_the_public_url_without_requests() {
    let server = MockServer::start().await;

    let db = db_for(&server);
    let url = db
        .resolver()
        .resolve("sb://breed-images/collie.jpg", Privilege::Anonymous)
        .await;

    assert_eq!(
        url,
        format!("{}/storage/v1/object/public/breed-images/collie.jpg", server.uri())
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn a_refused_signature_falls_back_to_the_public_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/sign/breed-images/collie.jpg"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bucket is public"))
        .mount(&server)
        .await;

    let db = db_for(&server);
    let url = db
        .resolver()
        .resolve("sb://breed-images/collie.jpg", Privilege::Admin)
        .await;

    assert_eq!(
        url,
        format!("{}/storage/v1/object/public/breed-images/collie.jpg", server.uri())
    );
}

#[tokio::test]
async fn reminders_without_an_identity_short_circuit_to_empty() {
    let server = MockServer::start().await;

    let db = db_for(&server);
    let reminders = db.reminders_for("42").await.unwrap();

    assert!(reminders.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn reminders_are_fetched_soonest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/reminders"))
        .and(query_param("user_id", "eq.user-1"))
        .and(query_param("breed_id", "eq.42"))
        .and(query_param("order", "due_on.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 1,
            "breed_id": 42,
            "user_id": "user-1",
            "title": "Nail trim",
            "due_on": "2026-09-01",
            "repeat_every_days": 14,
            "is_active": true
        }])))
        .mount(&server)
        .await;

    let db = db_for(&server);
    let reminders = db
        .catalog()
        .reminders(Some("user-1"), "42")
        .await
        .unwrap();

    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].title, "Nail trim");
    assert_eq!(reminders[0].repeat_every_days, Some(14));
}

#[tokio::test]
async fn the_care_log_window_is_capped_and_newest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/care_logs"))
        .and(query_param("user_id", "eq.user-1"))
        .and(query_param("breed_id", "eq.42"))
        .and(query_param("order", "done_at.desc"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 7,
            "breed_id": 42,
            "user_id": "user-1",
            "kind": "water_change",
            "note": null,
            "done_at": "2026-08-25T10:00:00Z"
        }])))
        .mount(&server)
        .await;

    let db = db_for(&server);
    let entries = db
        .catalog()
        .recent_log_entries(Some("user-1"), "42")
        .await
        .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, LogKind::WaterChange);
}

#[tokio::test]
async fn deleting_a_breed_filters_on_its_id() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/breeds"))
        .and(query_param("id", "eq.42"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let db = db_for(&server);
    assert!(db.catalog().delete_breed("42").await.is_ok());
}
