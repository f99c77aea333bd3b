use chrono::{Local, NaiveDate, TimeZone};
use image::GenericImageView;
use rapportapp::ident::next_identifier;
use rapportapp::model::{report_id_of, AssetKind, Collection, NewReport, ReportId, Row, UserIdentity};
use rapportapp::test_utils::{png_bytes as png, TestEnv};
use rapportapp::RapportApi;
use serde_json::{json, Value};
use std::fs;

fn setup(csv_mirror: bool) -> (TestEnv, RapportApi) {
    let env = TestEnv::with_csv_mirror(csv_mirror);
    let api = env.api();
    (env, api)
}

fn rows(value: Value) -> Vec<Row> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
}

fn user() -> UserIdentity {
    UserIdentity {
        iduser: "U-2550".into(),
        vorname: "Admin".into(),
        nachname: "System".into(),
        rolle: "Administrator".into(),
    }
}

fn report_input() -> NewReport {
    NewReport {
        anlage: "Halle 1".into(),
        bereich: "Sicherheit".into(),
        titel: "Notausgang verstellt".into(),
        meldung: "Paletten vor der Tür".into(),
    }
}

#[tokio::test]
async fn test_write_then_read_collection() {
    let (_env, api) = setup(false);
    let data = rows(json!([
        {"idmassnahme": "a", "idmeldung": "250101-000", "massnahme": "x"},
        {"idmassnahme": "b", "idmeldung": "250101-000", "massnahme": "y", "iso": "2025"}
    ]));
    api.write_collection(Collection::Massnahmen, &data).await.unwrap();
    assert_eq!(api.read_collection(Collection::Massnahmen).await.unwrap(), data);
}

#[tokio::test]
async fn test_never_written_collection_is_empty() {
    let (env, api) = setup(false);
    assert!(api.read_collection(Collection::Rapporte).await.unwrap().is_empty());
    // Reading resolved and seeded the namespace.
    for name in ["users", "rapporte", "massnahmen", "meldungen"] {
        let body = fs::read_to_string(env.root.join("DB").join(format!("{}.json", name))).unwrap();
        assert_eq!(body, "[]");
    }
    assert!(env.root.join("MELD").is_dir());
    assert!(env.root.join("FOTOS").is_dir());
}

#[tokio::test]
async fn test_deleted_collection_file_reads_empty() {
    let (env, api) = setup(false);
    api.init().await.unwrap();
    fs::remove_file(env.root.join("DB/users.json")).unwrap();
    assert!(api.read_collection(Collection::Users).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_save_detail_mirror_scenario() {
    let (env, api) = setup(false);
    api.write_collection(Collection::Meldungen, &[]).await.unwrap();

    let doc = json!({"idmeldung": "250101-000", "titel": "Test"});
    api.save_detail("250101-000", doc.as_object().cloned().unwrap())
        .await
        .unwrap();

    let index = api.read_collection(Collection::Meldungen).await.unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(report_id_of(&index[0]), "250101-000");
    assert!(env.root.join("MELD/250101-000.json").is_file());
}

#[tokio::test]
async fn test_save_then_list_details_once_with_last_content() {
    let (_env, api) = setup(false);
    for titel in ["eins", "zwei", "drei"] {
        let doc = json!({"titel": titel});
        api.save_detail("250101-004", doc.as_object().cloned().unwrap())
            .await
            .unwrap();
    }
    api.save_detail("250101-002", Row::new()).await.unwrap();

    let listed = api.list_details().await.unwrap();
    let ids: Vec<_> = listed.iter().map(report_id_of).collect();
    assert_eq!(ids, vec!["250101-002", "250101-004"]);
    assert_eq!(listed[1]["titel"], "drei");
}

#[test]
fn test_sequential_identifiers_on_one_day() {
    let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let mut existing: Vec<Row> = Vec::new();
    let mut issued = Vec::new();
    for _ in 0..3 {
        let id = next_identifier(&existing, today).unwrap();
        let row = json!({"idmeldung": id.as_str()});
        existing.push(row.as_object().cloned().unwrap());
        issued.push(id);
    }
    let issued: Vec<_> = issued.iter().map(ReportId::as_str).collect();
    assert_eq!(issued, vec!["250101-000", "250101-001", "250101-002"]);
}

#[tokio::test]
async fn test_photo_bounds_and_slot_exhaustion() {
    let (env, api) = setup(false);
    let now = Local.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).single().unwrap();
    api.create_report(&user(), report_input(), now).await.unwrap();

    let sizes = [(2400, 1200), (100, 100), (900, 3000)];
    for (w, h) in sizes {
        api.attach_photo("250101-000", png(w, h)).await.unwrap();
    }

    let fotos = env.root.join("FOTOS");
    let mut dims = Vec::new();
    for entry in fs::read_dir(&fotos).unwrap() {
        let path = entry.unwrap().path();
        let img = image::open(&path).unwrap();
        assert!(img.width() <= 600 && img.height() <= 800);
        dims.push(img.dimensions());
    }
    dims.sort();
    assert_eq!(dims, vec![(100, 100), (240, 800), (600, 300)]);

    let detail = api.load_detail("250101-000").await.unwrap();
    assert!(detail["photo1"].as_str().unwrap().starts_with("/fotos/250101-000-"));

    let err = api.attach_photo("250101-000", png(10, 10)).await.unwrap_err();
    assert_eq!(err.reason_code(), Some("slots-exhausted"));
    assert_eq!(fs::read_dir(&fotos).unwrap().count(), 3);
}

#[tokio::test]
async fn test_massnahme_photo_is_not_slotted() {
    let (env, api) = setup(false);
    let now = Local.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).single().unwrap();
    api.create_report(&user(), report_input(), now).await.unwrap();
    api.add_massnahme("250101-000", &user(), "geräumt", Some(png(50, 50)), now)
        .await
        .unwrap();

    let detail = api.load_detail("250101-000").await.unwrap();
    assert_eq!(detail["photo1"], "");
    let names: Vec<String> = fs::read_dir(env.root.join("FOTOS"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("250101-000-m-"));

    let notes = api.massnahmen_for("250101-000").await.unwrap().listed_rows;
    assert_eq!(notes[0]["mphoto"], format!("/fotos/{}", names[0]).as_str());
}

#[tokio::test]
async fn test_legacy_wrapper_is_read_and_rewritten_as_array() {
    let (env, api) = setup(false);
    api.init().await.unwrap();
    let path = env.root.join("DB/rapporte.json");
    fs::write(&path, r#"{"items": [{"idmeldung": "240101-000"}]}"#).unwrap();

    let mut read = api.read_collection(Collection::Rapporte).await.unwrap();
    assert_eq!(read.len(), 1);

    read.push(json!({"idmeldung": "240101-001"}).as_object().cloned().unwrap());
    api.write_collection(Collection::Rapporte, &read).await.unwrap();

    let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_csv_mirror_on_disk() {
    let (env, api) = setup(true);
    api.write_collection(
        Collection::Users,
        &rows(json!([{"iduser": "U-1", "benutzer": "a"}, {"iduser": "U-2"}])),
    )
    .await
    .unwrap();
    let csv = fs::read_to_string(env.root.join("DB/users.csv")).unwrap();
    assert_eq!(csv, "iduser,benutzer\nU-1,a\nU-2,\n");
}

#[tokio::test]
async fn test_unlocked_read_modify_write_is_last_writer_wins() {
    let (_env, api) = setup(false);
    let first = api.read_collection(Collection::Massnahmen).await.unwrap();
    let second = api.read_collection(Collection::Massnahmen).await.unwrap();

    let mut a = first.clone();
    a.push(json!({"massnahme": "a"}).as_object().cloned().unwrap());
    let mut b = second.clone();
    b.push(json!({"massnahme": "b"}).as_object().cloned().unwrap());

    api.write_collection(Collection::Massnahmen, &a).await.unwrap();
    api.write_collection(Collection::Massnahmen, &b).await.unwrap();

    // The first writer's row is gone: whole-collection replace, no merge.
    let stored = api.read_collection(Collection::Massnahmen).await.unwrap();
    assert_eq!(stored, b);
}

#[tokio::test]
async fn test_concurrent_detail_saves_keep_both_index_entries() {
    let (_env, api) = setup(false);
    api.init().await.unwrap();

    let saves = (0..8).map(|n| {
        let api = api.clone();
        tokio::spawn(async move {
            api.save_detail(&format!("250101-{:03}", n), Row::new()).await
        })
    });
    for handle in saves.collect::<Vec<_>>() {
        handle.await.unwrap().unwrap();
    }

    let index = api.read_collection(Collection::Meldungen).await.unwrap();
    let ids: Vec<_> = index.iter().map(report_id_of).collect();
    let expected: Vec<String> = (0..8).map(|n| format!("250101-{:03}", n)).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_ingest_photo_takes_slots_and_refuses_a_fourth() {
    let (env, api) = setup(false);
    let now = Local.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).single().unwrap();
    api.create_report(&user(), report_input(), now).await.unwrap();

    for _ in 0..3 {
        let asset = api
            .ingest_photo(png(700, 700), "250101-000", AssetKind::Report)
            .await
            .unwrap();
        assert_eq!(asset.reference, format!("/fotos/{}", asset.name));
        let img = image::open(env.root.join("FOTOS").join(&asset.name)).unwrap();
        assert_eq!(img.dimensions(), (600, 600));
    }
    let detail = api.load_detail("250101-000").await.unwrap();
    assert!(detail["photo3"].as_str().unwrap().starts_with("/fotos/"));

    let before = fs::read_to_string(env.root.join("MELD/250101-000.json")).unwrap();
    let err = api
        .ingest_photo(png(700, 700), "250101-000", AssetKind::Report)
        .await
        .unwrap_err();
    assert_eq!(err.reason_code(), Some("slots-exhausted"));
    assert_eq!(fs::read_dir(env.root.join("FOTOS")).unwrap().count(), 3);
    let after = fs::read_to_string(env.root.join("MELD/250101-000.json")).unwrap();
    assert_eq!(before, after);
}
