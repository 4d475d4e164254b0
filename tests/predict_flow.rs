use crux_core::testing::AppTester;
use planktoscan_core::capabilities::{HttpError, HttpOperation, HttpResponseData};
use planktoscan_core::event::FilePayload;
use planktoscan_core::model::{AuthContext, UserRole};
use planktoscan_core::staging::{ImageSource, StagedImage};
use planktoscan_core::{App, Boot, Effect, ErrorKind, Event, Model, WorkflowConfig};

fn jpeg_bytes(total_len: usize) -> Vec<u8> {
    let mut bytes = vec![
        0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01,
    ];
    bytes.resize(total_len.max(bytes.len()), 0);
    bytes
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn boot(app: &AppTester<App, Effect>, model: &mut Model, auth: AuthContext) {
    let _ = app.update(
        Event::Started(Box::new(Boot {
            auth,
            config: WorkflowConfig::default(),
        })),
        model,
    );
}

fn boot_with_config(app: &AppTester<App, Effect>, model: &mut Model, config: WorkflowConfig) {
    let _ = app.update(
        Event::Started(Box::new(Boot {
            auth: AuthContext::member(UserRole::Brin),
            config,
        })),
        model,
    );
}

fn sample_payload() -> Box<FilePayload> {
    Box::new(FilePayload {
        name: "sample.jpg".to_string(),
        mime: "image/jpeg".to_string(),
        bytes: jpeg_bytes(2 * 1024 * 1024),
    })
}

#[test]
fn predict_happy_path_submits_one_request_and_redirects() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    boot(&app, &mut model, AuthContext::member(UserRole::Brin));

    let _ = app.update(Event::FileSelected(sample_payload()), &mut model);
    assert!(model.staged.is_some());

    let _ = app.update(Event::LocationInputChanged("Jakarta".to_string()), &mut model);

    let update = app.update(Event::SubmitRequested, &mut model);
    let mut requests: Vec<_> = update
        .effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .collect();
    assert_eq!(requests.len(), 1, "exactly one /predict request goes out");
    assert!(model.is_submitting);

    let HttpOperation::Execute(op) = requests[0].operation.clone();
    assert!(op.url().ends_with("/predict"));
    assert_eq!(op.timeout_ms(), 60_000);
    assert!(op.header("content-type").unwrap().starts_with("multipart/form-data; boundary="));

    let body = op.body().expect("multipart body");
    assert!(contains(body, b"name=\"location\"\r\n\r\nJakarta\r\n"));
    assert!(contains(body, b"name=\"model_option\"\r\n\r\nefficientnetv2b0\r\n"));
    assert!(contains(body, b"name=\"file\"; filename=\"sample.jpg\""));

    let response = HttpResponseData::new(
        200,
        serde_json::to_vec(&serde_json::json!({"success": true, "result_id": 42})).unwrap(),
    );
    let update = app
        .resolve(&mut requests[0], Ok(response))
        .expect("response resolves");
    for event in update.events {
        let _ = app.update(event, &mut model);
    }

    assert!(!model.is_submitting);
    assert_eq!(model.redirect.as_deref(), Some("/result/42"));
    assert!(model.staged.is_none(), "a successful submission consumes the stage");
    assert!(model.active_error.is_none());
}

#[test]
fn submit_without_staged_image_is_network_silent() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    boot(&app, &mut model, AuthContext::member(UserRole::Brin));

    let update = app.update(Event::SubmitRequested, &mut model);
    let http_count = update
        .effects
        .iter()
        .filter(|effect| matches!(effect, Effect::Http(_)))
        .count();
    assert_eq!(http_count, 0);

    let error = model.active_error.as_ref().expect("a validation error");
    assert_eq!(error.message, "No Image Selected");
    assert_eq!(error.kind, ErrorKind::Validation);
}

#[test]
fn empty_location_substitutes_unknown() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    boot(&app, &mut model, AuthContext::member(UserRole::Brin));

    let _ = app.update(Event::FileSelected(sample_payload()), &mut model);
    let _ = app.update(Event::LocationInputChanged("   ".to_string()), &mut model);

    let update = app.update(Event::SubmitRequested, &mut model);
    let request = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .expect("request still goes out");

    let HttpOperation::Execute(op) = request.operation.clone();
    assert!(contains(op.body().unwrap(), b"name=\"location\"\r\n\r\nUnknown\r\n"));
}

#[test]
fn require_location_variant_rejects_empty_location() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    let config = WorkflowConfig {
        require_location: true,
        ..WorkflowConfig::default()
    };
    boot_with_config(&app, &mut model, config);

    let _ = app.update(Event::FileSelected(sample_payload()), &mut model);
    let update = app.update(Event::SubmitRequested, &mut model);

    let http_count = update
        .effects
        .iter()
        .filter(|effect| matches!(effect, Effect::Http(_)))
        .count();
    assert_eq!(http_count, 0);
    assert_eq!(
        model.active_error.as_ref().unwrap().message,
        "Location Required"
    );
}

#[test]
fn status_and_transport_failures_keep_the_stage_for_retry() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    boot(&app, &mut model, AuthContext::member(UserRole::Brin));

    let _ = app.update(Event::FileSelected(sample_payload()), &mut model);
    let _ = app.update(Event::LocationInputChanged("Jakarta".to_string()), &mut model);

    // 413 from the server.
    let update = app.update(Event::SubmitRequested, &mut model);
    let mut request = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .unwrap();
    let update = app
        .resolve(&mut request, Ok(HttpResponseData::new(413, Vec::new())))
        .expect("response resolves");
    for event in update.events {
        let _ = app.update(event, &mut model);
    }
    let error = model.active_error.clone().unwrap();
    assert_eq!(error.kind, ErrorKind::PayloadTooLarge);
    assert!(error.detail.unwrap().contains("smaller image"));
    assert!(model.staged.is_some(), "stage survives for retry");

    // Timeout on the retry.
    let update = app.update(Event::SubmitRequested, &mut model);
    let mut request = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .unwrap();
    let update = app
        .resolve(
            &mut request,
            Err(HttpError::Timeout { timeout_ms: 60_000 }),
        )
        .expect("error resolves");
    for event in update.events {
        let _ = app.update(event, &mut model);
    }
    let error = model.active_error.clone().unwrap();
    assert_eq!(error.kind, ErrorKind::Timeout);
    assert_eq!(
        error.detail.as_deref(),
        Some("Request timed out. Please try again.")
    );
    assert!(model.staged.is_some());
    assert!(!model.is_submitting);
}

#[test]
fn server_reported_failure_shows_its_message() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    boot(&app, &mut model, AuthContext::member(UserRole::Brin));

    let _ = app.update(Event::FileSelected(sample_payload()), &mut model);
    let _ = app.update(Event::LocationInputChanged("Jakarta".to_string()), &mut model);

    let update = app.update(Event::SubmitRequested, &mut model);
    let mut request = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .unwrap();
    let response = HttpResponseData::new(
        200,
        serde_json::to_vec(
            &serde_json::json!({"success": false, "error": "model weights missing"}),
        )
        .unwrap(),
    );
    let update = app
        .resolve(&mut request, Ok(response))
        .expect("response resolves");
    for event in update.events {
        let _ = app.update(event, &mut model);
    }

    let error = model.active_error.clone().unwrap();
    assert_eq!(error.detail.as_deref(), Some("model weights missing"));
    assert!(model.redirect.is_none());
}

#[test]
fn eager_upload_commits_then_submits_the_server_path() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    let config = WorkflowConfig {
        eager_upload: true,
        ..WorkflowConfig::default()
    };
    boot_with_config(&app, &mut model, config);

    let update = app.update(Event::FileSelected(sample_payload()), &mut model);
    let mut upload = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .expect("upload goes out at selection time");
    {
        let HttpOperation::Execute(op) = upload.operation.clone();
        assert!(op.url().ends_with("/upload"));
        assert_eq!(op.timeout_ms(), 30_000);
    }
    assert!(model.eager_upload_in_flight);

    let response = HttpResponseData::new(
        200,
        serde_json::to_vec(&serde_json::json!({"img_path": "static/uploads/abc.jpg"})).unwrap(),
    );
    let update = app
        .resolve(&mut upload, Ok(response))
        .expect("upload resolves");
    for event in update.events {
        let _ = app.update(event, &mut model);
    }

    assert!(!model.eager_upload_in_flight);
    match model.staged {
        Some(StagedImage::UploadedPath { ref img_path, .. }) => {
            assert_eq!(img_path, "static/uploads/abc.jpg");
        }
        ref other => panic!("expected an uploaded path, got {other:?}"),
    }
    assert_eq!(model.staged.as_ref().unwrap().source(), ImageSource::File);

    let _ = app.update(Event::LocationInputChanged("Jakarta".to_string()), &mut model);
    let update = app.update(Event::SubmitRequested, &mut model);
    let request = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .unwrap();
    let HttpOperation::Execute(op) = request.operation.clone();
    let body = op.body().unwrap();
    assert!(contains(
        body,
        b"name=\"img_path\"\r\n\r\nstatic/uploads/abc.jpg\r\n"
    ));
    assert!(!contains(body, b"filename="), "path submissions carry no file part");
}

#[test]
fn oversized_file_is_rejected_and_prior_stage_untouched() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    boot(&app, &mut model, AuthContext::member(UserRole::Brin));

    let _ = app.update(Event::FileSelected(sample_payload()), &mut model);
    let staged_before = model.staged.clone();

    let oversized = Box::new(FilePayload {
        name: "huge.jpg".to_string(),
        mime: "image/jpeg".to_string(),
        bytes: jpeg_bytes(10 * 1024 * 1024 + 1),
    });
    let _ = app.update(Event::FileSelected(oversized), &mut model);

    assert_eq!(model.staged, staged_before);
    assert_eq!(
        model.active_error.as_ref().unwrap().kind,
        ErrorKind::ImageTooLarge
    );
}

#[test]
fn view_enables_submission_only_when_fully_staged() {
    use crux_core::App as _;

    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    boot(&app, &mut model, AuthContext::member(UserRole::Brin));

    let core = App::default();
    assert!(!core.view(&model).submit_enabled);

    let _ = app.update(Event::FileSelected(sample_payload()), &mut model);
    assert!(
        !core.view(&model).submit_enabled,
        "location is still missing"
    );

    let _ = app.update(Event::LocationInputChanged("Jakarta".to_string()), &mut model);
    let view = core.view(&model);
    assert!(view.submit_enabled);
    assert_eq!(view.file_label, "sample.jpg");
    assert_eq!(view.selected_model, "efficientnetv2b0");
    assert!(view
        .staged
        .unwrap()
        .preview
        .starts_with("data:image/jpeg;base64,"));
}

#[test]
fn guest_submission_is_blocked_with_a_login_hint() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    boot(&app, &mut model, AuthContext::member(UserRole::Guest));

    let _ = app.update(Event::FileSelected(sample_payload()), &mut model);
    let _ = app.update(Event::LocationInputChanged("Jakarta".to_string()), &mut model);

    let update = app.update(Event::SubmitRequested, &mut model);
    let http_count = update
        .effects
        .iter()
        .filter(|effect| matches!(effect, Effect::Http(_)))
        .count();
    assert_eq!(http_count, 0);
    assert_eq!(model.redirect.as_deref(), Some("/login"));
}
