mod common;

use common::TestFixture;
use serde_json::json;
use zenfig::ErrorCode;
use zenfig::commands::{
    DeleteOptions, ExportFormat, ExportOptions, ListOptions, UpsertOptions, ValidateOptions,
};

async fn seed(fixture: &TestFixture) {
    let app = fixture.app();
    let provider = fixture.provider(&app);
    for (key, value) in [("database.host", "db.local"), ("database.port", "5432")] {
        app.upsert(
            provider.as_ref(),
            UpsertOptions {
                key,
                value: Some(value.to_string()),
                ..Default::default()
            },
            &mut Vec::new(),
        )
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn test_upsert_then_export() {
    let fixture = TestFixture::new();
    seed(&fixture).await;
    let app = fixture.app();
    let provider = fixture.provider(&app);

    let value = app
        .export_value(provider.as_ref(), &ExportOptions::default())
        .await
        .unwrap();
    assert_eq!(
        value,
        json!({
            "database": { "host": "db.local", "port": 5432 },
            "api": { "max_retries": 3 }
        })
    );

    let mut out = Vec::new();
    app.export(
        provider.as_ref(),
        &ExportOptions {
            format: ExportFormat::Env,
            ..Default::default()
        },
        &mut out,
    )
    .await
    .unwrap();
    let printed = String::from_utf8(out).unwrap();
    assert_eq!(
        printed.lines().collect::<Vec<_>>(),
        vec![
            "API_MAX_RETRIES=3",
            "DATABASE_HOST=db.local",
            "DATABASE_PORT=5432"
        ]
    );
}

#[tokio::test]
async fn test_store_file_uses_parameter_paths() {
    let fixture = TestFixture::new();
    seed(&fixture).await;

    let store = std::fs::read_to_string(fixture.base_path.join("store.json")).unwrap();
    assert!(store.contains("/zenfig/dev/api/database/host"));
    assert!(store.contains("/zenfig/dev/api/database/port"));
}

#[tokio::test]
async fn test_upsert_rejects_out_of_range_value() {
    let fixture = TestFixture::new();
    let app = fixture.app();
    let provider = fixture.provider(&app);

    let err = app
        .upsert(
            provider.as_ref(),
            UpsertOptions {
                key: "database.port",
                value: Some("70000".to_string()),
                ..Default::default()
            },
            &mut Vec::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConstraintViolation);
    assert_eq!(err.exit_code(), 1);
    assert!(!fixture.base_path.join("store.json").exists());
}

#[tokio::test]
async fn test_validate_reports_missing_values() {
    let fixture = TestFixture::new();
    let app = fixture.app();
    let provider = fixture.provider(&app);

    let err = app
        .validate_stored(provider.as_ref(), &ValidateOptions::default(), &mut Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingRequired);

    seed(&fixture).await;
    let mut out = Vec::new();
    app.validate_stored(provider.as_ref(), &ValidateOptions::default(), &mut out)
        .await
        .unwrap();
    assert!(String::from_utf8(out).unwrap().contains("Configuration is valid"));
}

#[tokio::test]
async fn test_delete_and_list() {
    let fixture = TestFixture::new();
    seed(&fixture).await;
    let app = fixture.app();
    let provider = fixture.provider(&app);

    app.delete(
        provider.as_ref(),
        DeleteOptions {
            key: "database.host",
            ..Default::default()
        },
        &mut Vec::new(),
    )
    .await
    .unwrap();

    let listed = app
        .list(provider.as_ref(), &ListOptions::default(), &mut Vec::new())
        .await
        .unwrap();
    let keys: Vec<&str> = listed.iter().map(|k| k.key.as_str()).collect();
    assert_eq!(keys, vec!["database.port"]);
    assert!(listed.iter().all(|k| k.known));
}

#[tokio::test]
async fn test_missing_env_is_a_cli_error() {
    let fixture = TestFixture::new();
    let app = fixture.app();
    let provider = fixture.provider(&app);

    let err = app
        .export_value(
            provider.as_ref(),
            &ExportOptions {
                env: Some("../prod"),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert_eq!(err.exit_code(), 2);
}
