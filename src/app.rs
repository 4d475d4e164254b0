use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::capabilities::{
    CameraError, CameraOutput, Capabilities, GeoError, HttpError, HttpRequestData, MultipartForm,
    PositionOptions, StreamConfig, WELCOME_SEEN_KEY,
};
use crate::capabilities::{CameraFacing, KvOutput};
use crate::config::WorkflowConfig;
use crate::event::{Boot, Coordinate, Event, FilePayload};
use crate::imaging;
use crate::location::{coords_fallback, place_name, GeoFix, ReverseGeocodeResponse};
use crate::model::{
    AcquisitionMode, CameraPhase, Model, ModelSelection, MODEL_OPTIONS,
};
use crate::staging::{self, ImageSource, StagedImage};
use crate::{
    format_file_size, AppError, ErrorKind, UnixTimeMs, CAMERA_CAPTURE_FILENAME, LOGIN_PATH,
    UNKNOWN_LOCATION,
};

#[derive(Default)]
pub struct App;

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    #[allow(clippy::too_many_lines)]
    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        match event {
            Event::Started(boot) => self.start(*boot, model, caps),
            Event::WelcomeFlagLoaded(result) => {
                model.show_welcome = match *result {
                    Ok(KvOutput::Value(Some(ref seen))) => seen != "true",
                    Ok(KvOutput::Value(None)) => true,
                    Ok(KvOutput::Written) => {
                        warn!("unexpected kv output for welcome flag read");
                        false
                    }
                    Err(ref e) => {
                        warn!(error = %e, "could not read welcome flag");
                        false
                    }
                };
                caps.render.render();
            }
            Event::WelcomeDismissed => {
                model.show_welcome = false;
                caps.kv.set(WELCOME_SEEN_KEY, "true", |result| {
                    Event::WelcomeFlagStored(Box::new(result))
                });
                caps.render.render();
            }
            Event::WelcomeFlagStored(result) => {
                if let Err(e) = *result {
                    warn!(error = %e, "could not persist welcome flag");
                }
            }

            Event::ModeSelected(mode) => self.select_mode(mode, model, caps),

            Event::FileSelected(payload) => self.select_file(&payload, model, caps),
            Event::StagedImageCleared => self.clear_staged(model, caps),
            Event::EagerUploadResponse(result) => self.handle_eager_upload(&result, model, caps),

            Event::CameraStreamStarted(result) => self.handle_stream_started(*result, model, caps),
            Event::CameraStreamStopped(result) => self.handle_stream_stopped(&result, model, caps),
            Event::SwitchFacingRequested => {
                if model.mode != AcquisitionMode::Camera {
                    debug!("facing switch ignored outside camera mode");
                    return;
                }
                model.camera.facing = model.camera.facing.toggle();
                info!(facing = ?model.camera.facing, "switching camera facing");
                self.restart_camera(model, caps);
                caps.render.render();
            }
            Event::CapturePhotoRequested => self.capture_photo(model, caps),
            Event::CameraFrameCaptured(result) => self.handle_frame(*result, model, caps),
            Event::RetakeRequested => {
                if model.camera.phase != CameraPhase::Captured {
                    debug!(phase = ?model.camera.phase, "retake ignored");
                    return;
                }
                model.staged = None;
                model.reset_location_unless_gps();
                // The capture stopped the stream, so the device needs
                // the settle delay before it will hand the camera back.
                self.issue_start(model, caps, model.config.camera_settle_delay_ms);
                caps.render.render();
            }

            Event::LocationInputChanged(text) => {
                if let Some(notice) = model
                    .location
                    .set_manual(&text, model.config.max_location_length)
                {
                    model.active_notice = Some(notice);
                }
                caps.render.render();
            }
            Event::GpsLocationRequested => self.acquire_location(model, caps),
            Event::GpsPositionReceived(result) => self.handle_position(*result, model, caps),
            Event::ReverseGeocodeResolved(result) => {
                let Some(fix) = model.location.last_fix else {
                    debug!("geocode response after location was cleared");
                    return;
                };
                let resolved = match &*result {
                    Ok(response) if response.is_success() => response
                        .json::<ReverseGeocodeResponse>()
                        .ok()
                        .and_then(|r| place_name(&r)),
                    Ok(response) => {
                        debug!(status = response.status(), "reverse geocode failed");
                        None
                    }
                    Err(e) => {
                        debug!(error = %e, "reverse geocode request failed");
                        None
                    }
                };
                // Never leave the field in a loading state.
                model.location.text =
                    resolved.unwrap_or_else(|| coords_fallback(fix.latitude, fix.longitude));
                model.location.badge_visible = true;
                caps.render.render();
            }
            Event::LocationCleared => {
                model.location.clear();
                caps.render.render();
            }

            Event::ModelSelected(raw) => {
                model.model_selection.set(&raw);
                caps.render.render();
            }
            Event::SubmitRequested => self.submit(model, caps),
            Event::PredictResponse(result) => self.handle_predict(&result, model, caps),

            Event::ErrorDismissed => {
                model.active_error = None;
                model.active_notice = None;
                caps.render.render();
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        let staged = model.staged.as_ref().map(|s| StagedImageView {
            file_name: s.file_name().to_string(),
            preview: s.preview().to_string(),
            size_label: s.byte_len().map(format_file_size),
            source: s.source(),
        });

        let file_label = if model.eager_upload_in_flight {
            "Uploading...".to_string()
        } else {
            staged
                .as_ref()
                .map_or_else(|| "No file selected".to_string(), |s| s.file_name.clone())
        };

        let has_location = !model.location.text.trim().is_empty();
        let submit_enabled = staged.is_some()
            && has_location
            && !model.eager_upload_in_flight
            && !model.is_submitting
            && model.auth.may_upload();

        ViewModel {
            mode: model.mode,
            upload_zone_visible: model.mode == AcquisitionMode::File,
            camera_visible: model.mode == AcquisitionMode::Camera,
            camera_phase: model.camera.phase,
            camera_facing: model.camera.facing,
            staged,
            file_label,
            submit_enabled,
            is_submitting: model.is_submitting,
            location_text: model.location.text.clone(),
            location_placeholder: if model.location.acquiring {
                "Getting GPS location...".to_string()
            } else {
                "Enter location or use GPS...".to_string()
            },
            gps_busy: model.location.acquiring,
            accuracy_text: model.location.accuracy_text(),
            coords_text: model.location.coords_text(),
            model_options: MODEL_OPTIONS.iter().map(ToString::to_string).collect(),
            selected_model: model
                .model_selection
                .resolve(&model.config.default_model)
                .to_string(),
            redirect: model.redirect.clone(),
            error: model.active_error.clone(),
            notice: model.active_notice.clone(),
            show_welcome: model.show_welcome,
        }
    }
}

impl App {
    fn start(&self, boot: Boot, model: &mut Model, caps: &Capabilities) {
        model.auth = boot.auth;
        match boot.config.validate() {
            Ok(()) => model.config = boot.config,
            Err(e) => {
                warn!(error = %e, "invalid workflow config, falling back to defaults");
                model.config = WorkflowConfig::default();
            }
        }
        model.mode = AcquisitionMode::File;
        model.model_selection = ModelSelection::default();
        info!(authenticated = model.auth.is_authenticated, "workflow core started");

        caps.kv.get(WELCOME_SEEN_KEY, |result| {
            Event::WelcomeFlagLoaded(Box::new(result))
        });
        caps.render.render();
    }

    /// Re-entrant by design: selecting the already-active mode performs
    /// a full reset-and-reacquire to recover from stuck states.
    fn select_mode(&self, mode: AcquisitionMode, model: &mut Model, caps: &Capabilities) {
        if mode == AcquisitionMode::Camera && !model.auth.may_upload() {
            warn!("camera mode blocked for unauthenticated or guest session");
            model.mode = AcquisitionMode::File;
            model.redirect = Some(LOGIN_PATH.to_string());
            caps.render.render();
            return;
        }

        info!(mode = mode.as_str(), "switching acquisition mode");
        model.staged = None;
        model.eager_upload_in_flight = false;

        match mode {
            AcquisitionMode::File => {
                model.mode = AcquisitionMode::File;
                self.teardown_camera(model, caps);
            }
            AcquisitionMode::Camera => {
                model.mode = AcquisitionMode::Camera;
                self.restart_camera(model, caps);
            }
        }
        caps.render.render();
    }

    /// Stops the stream if one exists and forgets any deferred start.
    /// Safe to call in any phase. An acquisition still in flight keeps
    /// its phase so no second start can slip in; its handler resolves
    /// against the then-current mode.
    fn teardown_camera(&self, model: &mut Model, caps: &Capabilities) {
        model.camera.start_pending = false;
        if !model.camera.phase.blocks_start() {
            model.camera.phase = CameraPhase::Stopped;
        }
        if let Some(stream_id) = model.camera.stream.take() {
            caps.camera.stop_stream(stream_id, |result| {
                Event::CameraStreamStopped(Box::new(result))
            });
        }
    }

    /// Start, preceded by a stop when a stream is still held. The start
    /// is deferred until the stop completes — acquiring a second handle
    /// while the first is live is the one thing this session must never
    /// do.
    fn restart_camera(&self, model: &mut Model, caps: &Capabilities) {
        if model.camera.phase.blocks_start() {
            debug!(phase = ?model.camera.phase, "start suppressed, acquisition in flight");
            return;
        }
        if let Some(stream_id) = model.camera.stream.take() {
            model.camera.phase = CameraPhase::Stopped;
            model.camera.start_pending = true;
            caps.camera.stop_stream(stream_id, |result| {
                Event::CameraStreamStopped(Box::new(result))
            });
        } else {
            self.issue_start(model, caps, 0);
        }
    }

    fn issue_start(&self, model: &mut Model, caps: &Capabilities, settle_delay_ms: u64) {
        if model.camera.phase.blocks_start() {
            debug!(phase = ?model.camera.phase, "start suppressed, acquisition in flight");
            return;
        }
        model.camera.phase = CameraPhase::Starting;
        let config = StreamConfig {
            facing: model.camera.facing,
            ideal_width: model.config.ideal_stream_width,
            ideal_height: model.config.ideal_stream_height,
            settle_delay_ms,
        };
        debug!(facing = ?config.facing, settle_delay_ms, "requesting camera stream");
        caps.camera.start_stream(config, |result| {
            Event::CameraStreamStarted(Box::new(result))
        });
    }

    fn handle_stream_started(
        &self,
        result: Result<CameraOutput, CameraError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        match result {
            Ok(CameraOutput::StreamStarted { stream_id }) => {
                if model.mode != AcquisitionMode::Camera {
                    // The user left camera mode while the device was
                    // acquiring; release the orphaned handle.
                    debug!(%stream_id, "releasing stream acquired after mode switch");
                    model.camera.reset();
                    caps.camera.stop_stream(stream_id, |result| {
                        Event::CameraStreamStopped(Box::new(result))
                    });
                } else {
                    info!(%stream_id, "camera stream active");
                    model.camera.phase = CameraPhase::Active;
                    model.camera.stream = Some(stream_id);
                }
            }
            Ok(other) => {
                warn!(?other, "unexpected camera output for start");
                model.camera.reset();
                model.mode = AcquisitionMode::File;
                model.active_error = Some(
                    AppError::new(ErrorKind::Protocol, "Camera Error")
                        .with_detail("The camera returned an unexpected response."),
                );
            }
            Err(e) => {
                error!(error = %e, "camera stream failed to start");
                model.camera.reset();
                if model.mode == AcquisitionMode::Camera {
                    // Device or permission failure falls back to file mode.
                    model.mode = AcquisitionMode::File;
                    model.active_error = Some(camera_error(&e));
                }
            }
        }
        caps.render.render();
    }

    fn handle_stream_stopped(
        &self,
        result: &Result<CameraOutput, CameraError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        // Stop is always safe: failures are logged, never surfaced.
        if let Err(e) = result {
            warn!(error = %e, "camera stream stop reported an error");
        }

        if model.camera.start_pending {
            model.camera.start_pending = false;
            if model.mode == AcquisitionMode::Camera {
                self.issue_start(model, caps, model.config.camera_settle_delay_ms);
            }
        }
        caps.render.render();
    }

    fn capture_photo(&self, model: &mut Model, caps: &Capabilities) {
        if !model.camera.phase.can_capture() {
            debug!(phase = ?model.camera.phase, "capture ignored");
            return;
        }
        let Some(stream_id) = model.camera.stream.clone() else {
            warn!("active phase without a stream handle");
            model.camera.reset();
            caps.render.render();
            return;
        };
        model.camera.phase = CameraPhase::Capturing;
        caps.camera.capture_frame(stream_id, |result| {
            Event::CameraFrameCaptured(Box::new(result))
        });
        caps.render.render();
    }

    fn handle_frame(
        &self,
        result: Result<CameraOutput, CameraError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if model.camera.phase != CameraPhase::Capturing {
            debug!(phase = ?model.camera.phase, "stale capture result");
            return;
        }
        if model.mode != AcquisitionMode::Camera {
            debug!("capture result after leaving camera mode");
            model.camera.reset();
            caps.render.render();
            return;
        }

        match result {
            Ok(CameraOutput::Frame(frame)) => {
                let (width, height) = (frame.width, frame.height);
                match imaging::encode_capture_jpeg(&frame, model.config.capture_jpeg_quality) {
                    Ok(jpeg) => {
                        info!(width, height, bytes = jpeg.len(), "photo captured");
                        let preview = staging::preview_data_url("image/jpeg", &jpeg);
                        model.staged = Some(StagedImage::CameraCapture {
                            jpeg,
                            width,
                            height,
                            preview,
                        });
                        model.camera.phase = CameraPhase::Captured;
                        // Capturing freezes the preview and frees the
                        // device for other apps.
                        if let Some(stream_id) = model.camera.stream.take() {
                            caps.camera.stop_stream(stream_id, |result| {
                                Event::CameraStreamStopped(Box::new(result))
                            });
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "capture frame could not be encoded");
                        model.camera.phase = phase_after_failed_capture(model);
                        model.active_error = Some(e.into());
                    }
                }
            }
            Ok(other) => {
                warn!(?other, "unexpected camera output for capture");
                model.camera.phase = phase_after_failed_capture(model);
                model.active_error = Some(
                    AppError::new(ErrorKind::Protocol, "Capture Failed")
                        .with_detail("The camera returned an unexpected response."),
                );
            }
            Err(e) => {
                warn!(error = %e, "capture failed");
                model.camera.phase = phase_after_failed_capture(model);
                model.active_error = Some(camera_error(&e));
            }
        }
        caps.render.render();
    }

    fn select_file(&self, payload: &FilePayload, model: &mut Model, caps: &Capabilities) {
        if model.mode != AcquisitionMode::File {
            debug!("file selection ignored outside file mode");
            return;
        }

        match staging::validate_file(&payload.mime, &payload.bytes, model.config.max_image_bytes) {
            Err(e) => {
                warn!(error = %e, file = %payload.name, "rejected file");
                // Prior staged state stays untouched.
                model.active_error = Some(e.into());
            }
            Ok(mime) => {
                info!(file = %payload.name, bytes = payload.bytes.len(), "file staged");
                let preview = staging::preview_data_url(&mime, &payload.bytes);
                model.staged = Some(StagedImage::PickedFile {
                    file_name: payload.name.clone(),
                    mime: mime.clone(),
                    bytes: payload.bytes.clone(),
                    preview,
                });
                if model.config.eager_upload {
                    self.send_eager_upload(payload, &mime, model, caps);
                }
            }
        }
        caps.render.render();
    }

    fn send_eager_upload(
        &self,
        payload: &FilePayload,
        mime: &str,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let (content_type, body) = MultipartForm::new()
            .file("file", &payload.name, mime, &payload.bytes)
            .finish();

        let request = HttpRequestData::post(model.config.endpoint("upload"))
            .and_then(|r| r.with_header("Content-Type", content_type))
            .and_then(|r| r.with_body(body))
            .and_then(|r| r.with_timeout_ms(model.config.upload_timeout_ms));

        match request {
            Ok(request) => {
                model.eager_upload_in_flight = true;
                caps.http.send(request, |result| {
                    Event::EagerUploadResponse(Box::new(result))
                });
            }
            Err(e) => {
                warn!(error = %e, "could not build upload request");
                model.staged = None;
                model.active_error = Some(request_build_error(&e));
            }
        }
    }

    fn handle_eager_upload(
        &self,
        result: &Result<crate::capabilities::HttpResponseData, HttpError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        model.eager_upload_in_flight = false;

        let failure = match result {
            Ok(response) if response.is_success() => {
                match response.json::<UploadResponseBody>() {
                    Ok(body) => {
                        if let Some(StagedImage::PickedFile {
                            file_name, preview, ..
                        }) = model.staged.take()
                        {
                            info!(img_path = %body.img_path, "eager upload committed");
                            model.staged = Some(StagedImage::UploadedPath {
                                file_name,
                                img_path: body.img_path,
                                preview,
                            });
                            None
                        } else {
                            // Cleared or replaced while the upload ran.
                            debug!("upload response arrived for a discarded stage");
                            None
                        }
                    }
                    Err(e) => Some(
                        AppError::new(ErrorKind::Protocol, "Upload Error")
                            .with_detail(e.to_string()),
                    ),
                }
            }
            Ok(response) => Some(AppError::from_http_status(response.status(), response.body())),
            Err(e) => Some(transport_error(e)),
        };

        if let Some(mut error) = failure {
            warn!(error = %error, "eager upload failed");
            if error.detail.is_none() {
                error.detail = Some("Failed to upload image. Please try again.".to_string());
            }
            model.staged = None;
            model.reset_location_unless_gps();
            model.active_error = Some(error);
        }
        caps.render.render();
    }

    fn clear_staged(&self, model: &mut Model, caps: &Capabilities) {
        info!("staged image cleared");
        model.staged = None;
        model.eager_upload_in_flight = false;
        model.reset_location_unless_gps();

        // Cancelling a capture restarts the stream for another shot.
        if model.mode == AcquisitionMode::Camera && model.camera.phase == CameraPhase::Captured {
            self.issue_start(model, caps, model.config.camera_settle_delay_ms);
        }
        caps.render.render();
    }

    fn acquire_location(&self, model: &mut Model, caps: &Capabilities) {
        if model.location.acquiring {
            debug!("GPS request already in progress");
            return;
        }

        let now = UnixTimeMs::now();
        if let Some(fix) = model
            .location
            .fresh_fix(now, model.config.location_cache_window_ms)
        {
            debug!("reusing cached GPS fix");
            model.location.badge_visible = true;
            self.issue_reverse_geocode(fix, model, caps);
        } else {
            model.location.acquiring = true;
            let options = PositionOptions {
                high_accuracy: true,
                timeout_ms: model.config.gps_timeout_ms,
                maximum_age_ms: model.config.gps_maximum_age_ms,
            };
            caps.geolocation.get_position(options, |result| {
                Event::GpsPositionReceived(Box::new(result))
            });
        }
        caps.render.render();
    }

    fn handle_position(
        &self,
        result: Result<crate::capabilities::GeoPosition, GeoError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        model.location.acquiring = false;
        match result {
            Ok(position) => match Coordinate::new(position.latitude, position.longitude) {
                Ok(_) => {
                    info!(
                        accuracy_m = position.accuracy_m,
                        "GPS fix obtained"
                    );
                    let fix = GeoFix::from_position(position, UnixTimeMs::now());
                    model.location.store_fix(fix);
                    self.issue_reverse_geocode(fix, model, caps);
                }
                Err(e) => {
                    warn!(error = %e, "shell returned an invalid position");
                    model.active_error = Some(
                        AppError::new(ErrorKind::Protocol, "GPS Error")
                            .with_detail(e.to_string()),
                    );
                }
            },
            Err(e) => {
                warn!(error = %e, "GPS acquisition failed");
                // The location text stays exactly as it was.
                model.active_error = Some(geo_error(&e));
            }
        }
        caps.render.render();
    }

    fn issue_reverse_geocode(&self, fix: GeoFix, model: &mut Model, caps: &Capabilities) {
        let url = model
            .config
            .reverse_geocode_endpoint(fix.latitude, fix.longitude);
        let request =
            HttpRequestData::get(url).and_then(|r| r.with_timeout_ms(model.config.geocode_timeout_ms));
        match request {
            Ok(request) => {
                caps.http.send(request, |result| {
                    Event::ReverseGeocodeResolved(Box::new(result))
                });
            }
            Err(e) => {
                warn!(error = %e, "could not build reverse geocode request");
                model.location.text = coords_fallback(fix.latitude, fix.longitude);
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn submit(&self, model: &mut Model, caps: &Capabilities) {
        if model.is_submitting {
            debug!("submission already in flight");
            return;
        }
        if model.eager_upload_in_flight {
            debug!("submission blocked while upload is in flight");
            return;
        }
        if !model.auth.may_upload() {
            warn!("submission blocked for unauthenticated or guest session");
            model.redirect = Some(LOGIN_PATH.to_string());
            caps.render.render();
            return;
        }

        let Some(staged) = &model.staged else {
            model.active_error = Some(
                AppError::new(ErrorKind::Validation, "No Image Selected")
                    .with_detail("Please upload an image or capture a photo first."),
            );
            caps.render.render();
            return;
        };

        let trimmed = model.location.text.trim();
        let location = if trimmed.is_empty() {
            if model.config.require_location {
                model.active_error = Some(
                    AppError::new(ErrorKind::Validation, "Location Required")
                        .with_detail("Please enter a sampling location."),
                );
                caps.render.render();
                return;
            }
            UNKNOWN_LOCATION.to_string()
        } else {
            trimmed.to_string()
        };

        let model_option = model
            .model_selection
            .resolve(&model.config.default_model)
            .to_string();

        let mut form = MultipartForm::new()
            .text("location", &location)
            .text("model_option", &model_option);
        form = match staged {
            StagedImage::PickedFile {
                file_name,
                mime,
                bytes,
                ..
            } => form.file("file", file_name, mime, bytes),
            StagedImage::CameraCapture { jpeg, .. } => form
                .file("file", CAMERA_CAPTURE_FILENAME, "image/jpeg", jpeg)
                .text("has_captured_file", "true"),
            StagedImage::UploadedPath { img_path, .. } => form.text("img_path", img_path),
        };
        let (content_type, body) = form.finish();

        let request = HttpRequestData::post(model.config.endpoint("predict"))
            .and_then(|r| r.with_header("Content-Type", content_type))
            .and_then(|r| r.with_body(body))
            .and_then(|r| r.with_timeout_ms(model.config.predict_timeout_ms));

        match request {
            Ok(request) => {
                info!(location = %location, model_option = %model_option, "submitting prediction");
                model.is_submitting = true;
                caps.http
                    .send(request, |result| Event::PredictResponse(Box::new(result)));
            }
            Err(e) => {
                warn!(error = %e, "could not build prediction request");
                model.active_error = Some(request_build_error(&e));
            }
        }
        caps.render.render();
    }

    fn handle_predict(
        &self,
        result: &Result<crate::capabilities::HttpResponseData, HttpError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        model.is_submitting = false;

        match result {
            Ok(response) if response.is_success() => {
                match response.json::<PredictResponseBody>() {
                    Ok(body) if body.success => {
                        if let Some(result_id) = body.result_id {
                            info!(result_id, "prediction succeeded");
                            model.redirect = Some(format!("/result/{result_id}"));
                            // The staged image is consumed by a
                            // successful submission.
                            model.staged = None;
                        } else {
                            model.active_error = Some(protocol_error());
                        }
                    }
                    Ok(body) => {
                        let detail = body
                            .error
                            .unwrap_or_else(|| "Prediction failed: Invalid response".to_string());
                        warn!(detail = %detail, "prediction rejected by server");
                        model.active_error = Some(
                            AppError::new(ErrorKind::Server, "Prediction Failed")
                                .with_detail(detail),
                        );
                    }
                    Err(_) => model.active_error = Some(protocol_error()),
                }
            }
            Ok(response) => {
                warn!(status = response.status(), "prediction returned an error status");
                model.active_error =
                    Some(AppError::from_http_status(response.status(), response.body()));
            }
            Err(e) => {
                error!(error = %e, "prediction request failed");
                model.active_error = Some(transport_error(e));
            }
        }
        caps.render.render();
    }
}

/// A failed capture returns to the live stream when it survived, or all
/// the way to stopped when it did not.
fn phase_after_failed_capture(model: &Model) -> CameraPhase {
    if model.camera.stream.is_some() {
        CameraPhase::Active
    } else {
        CameraPhase::Stopped
    }
}

fn camera_error(e: &CameraError) -> AppError {
    if e.is_permission_error() {
        AppError::new(ErrorKind::CameraPermissionDenied, "Camera Error").with_detail(
            "Error accessing camera. Please make sure you have granted camera permissions.",
        )
    } else {
        AppError::new(ErrorKind::Camera, "Camera Error").with_detail(e.to_string())
    }
}

fn geo_error(e: &GeoError) -> AppError {
    let kind = match e {
        GeoError::PermissionDenied => ErrorKind::LocationPermissionDenied,
        GeoError::PositionUnavailable => ErrorKind::LocationUnavailable,
        GeoError::Timeout { .. } => ErrorKind::LocationTimeout,
        GeoError::Unsupported => ErrorKind::FeatureUnavailable,
    };
    let title = if matches!(e, GeoError::Unsupported) {
        "GPS Not Supported"
    } else {
        "GPS Error"
    };
    let mut error = AppError::new(kind, title)
        .with_detail(format!("{} {}", e.status_message(), e.user_action()));
    if e.offers_retry() {
        error = error.with_retry();
    }
    error
}

fn transport_error(e: &HttpError) -> AppError {
    match e {
        HttpError::Timeout { .. } => AppError::new(ErrorKind::Timeout, "Request Timed Out")
            .with_detail("Request timed out. Please try again."),
        HttpError::Network { .. } => AppError::new(ErrorKind::Network, "Network Error")
            .with_detail("Network error. Please check your connection."),
        _ => AppError::new(ErrorKind::Unknown, "Request Failed")
            .with_detail("Failed to analyze image. Please try again."),
    }
}

fn request_build_error(e: &HttpError) -> AppError {
    AppError::new(ErrorKind::Internal, "Request Failed").with_detail(e.to_string())
}

fn protocol_error() -> AppError {
    AppError::new(ErrorKind::Protocol, "Prediction Failed")
        .with_detail("Invalid response from server")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UploadResponseBody {
    img_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PredictResponseBody {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result_id: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedImageView {
    pub file_name: String,
    pub preview: String,
    pub size_label: Option<String>,
    pub source: ImageSource,
}

/// Everything the shell needs to paint the workflow screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub mode: AcquisitionMode,
    pub upload_zone_visible: bool,
    pub camera_visible: bool,
    pub camera_phase: CameraPhase,
    pub camera_facing: CameraFacing,
    pub staged: Option<StagedImageView>,
    pub file_label: String,
    pub submit_enabled: bool,
    pub is_submitting: bool,
    pub location_text: String,
    pub location_placeholder: String,
    pub gps_busy: bool,
    pub accuracy_text: Option<String>,
    pub coords_text: Option<String>,
    pub model_options: Vec<String>,
    pub selected_model: String,
    pub redirect: Option<String>,
    pub error: Option<AppError>,
    pub notice: Option<String>,
    pub show_welcome: bool,
}
