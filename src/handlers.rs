// src/handlers.rs
use crate::{AppState, errors::OutfitError, models::*};
use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, error::JsonPayloadError, web};
use futures_util::TryStreamExt;
use log::info;

const IMAGE_FIELD: &str = "file";
const KIDS_FIELD: &str = "kids";

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .service(
            web::scope("/api")
                .route("/analyze", web::post().to(analyze))
                .route("/generate", web::post().to(recommend))
                .route("/recommend", web::post().to(recommend))
                .route("/outfit", web::post().to(outfit))
                .route("/image-gen", web::post().to(generate_image))
                .route("/horoscope", web::post().to(horoscope)),
        )
        .route("/health", web::get().to(health_check));
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    OutfitError::Validation(format!("invalid request body: {}", err)).into()
}

struct UploadForm {
    image: Option<UploadedImage>,
    kids: bool,
}

/// Reads the multipart form, refusing to buffer more than `max_bytes` of image.
async fn read_form(payload: &mut Multipart, max_bytes: usize) -> Result<UploadForm, OutfitError> {
    let mut form = UploadForm {
        image: None,
        kids: false,
    };

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| OutfitError::Validation(format!("malformed multipart body: {}", e)))?
    {
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let filename = disposition.get_filename().map(str::to_string);
        let content_type = field
            .content_type()
            .map(|ct| ct.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| OutfitError::Validation(format!("failed to read upload: {}", e)))?
        {
            if data.len() + chunk.len() > max_bytes {
                return Err(OutfitError::Validation(format!(
                    "image exceeds the {} byte limit",
                    max_bytes
                )));
            }
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            IMAGE_FIELD => {
                let mut image = UploadedImage::new(content_type, data);
                image.filename = filename;
                form.image = Some(image);
            }
            KIDS_FIELD => {
                let value = String::from_utf8_lossy(&data);
                form.kids = matches!(value.trim(), "true" | "1" | "on");
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn require_image(
    payload: &mut Multipart,
    data: &AppState,
) -> Result<(UploadedImage, bool), OutfitError> {
    let form = read_form(payload, data.pipeline.max_upload_bytes()).await?;
    let image = form
        .image
        .ok_or_else(|| OutfitError::Validation("no image uploaded".to_string()))?;
    info!(
        "Received upload {} ({}, {} bytes)",
        image.filename.as_deref().unwrap_or("<unnamed>"),
        image.mime_type,
        image.size()
    );
    Ok((image, form.kids))
}

pub async fn analyze(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, OutfitError> {
    let (image, _) = require_image(&mut payload, &data).await?;
    let response = data.pipeline.analyze(image).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn recommend(
    body: web::Json<RecommendRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, OutfitError> {
    let request = body.into_inner();
    let response = data
        .pipeline
        .recommend(&request.current_outfit, &request.analysis, request.kids)
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn outfit(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, OutfitError> {
    let (image, kids) = require_image(&mut payload, &data).await?;
    let report = data.pipeline.run(image, kids).await?;
    Ok(HttpResponse::Ok().json(report))
}

pub async fn generate_image(
    body: web::Json<ImageGenRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, OutfitError> {
    let image_url = data.image_gen.generate(&body.prompt).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "image_url": image_url })))
}

pub async fn horoscope(
    body: web::Json<HoroscopeRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, OutfitError> {
    let prediction = data.horoscope.predict(&body).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "prediction": prediction })))
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::image_processor::encode_test_jpeg;
    use crate::services::pipeline::tests::Fakes;
    use crate::services::retry::{Backoff, RetryPolicy};
    use crate::services::testing::{ANALYSIS_JSON, FakeImageGenerator, FakeTextModel};
    use crate::services::{HoroscopeService, ImageGenService};
    use actix_web::{App, http::StatusCode, http::header, test};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;

    const BOUNDARY: &str = "----outfit-test-boundary";

    fn state(fakes: &Fakes) -> AppState {
        let retry = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::ZERO,
            backoff: Backoff::Fixed,
            call_timeout: Duration::from_secs(5),
        };
        AppState {
            pipeline: Arc::new(fakes.pipeline()),
            image_gen: Arc::new(ImageGenService::new(
                Arc::new(FakeImageGenerator::new(vec![Ok(vec![1, 2, 3])])),
                retry,
            )),
            horoscope: Arc::new(HoroscopeService::new(
                Arc::new(FakeTextModel::always(Ok("Lucky color: navy.".into()))),
                retry,
            )),
        }
    }

    fn multipart(field: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"look.jpg\"\r\n\
Content-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(uri: &str, body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri(uri)
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn analyze_returns_analysis_and_description() {
        let fakes = Fakes::healthy();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&fakes)))
                .configure(configure_routes),
        )
        .await;

        let body = multipart("file", "image/jpeg", &encode_test_jpeg(32, 32));
        let resp = test::call_service(&app, upload_request("/api/analyze", body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["analysis"]["scores"]["overall"], 8.0);
        assert!(json["styleDescription"].as_str().unwrap().contains("trench"));
    }

    #[actix_web::test]
    async fn analyze_rejects_unsupported_type() {
        let fakes = Fakes::healthy();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&fakes)))
                .configure(configure_routes),
        )
        .await;

        let body = multipart("file", "image/gif", b"GIF89a");
        let resp = test::call_service(&app, upload_request("/api/analyze", body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["kind"], "validation_error");
        assert_eq!(fakes.analysis.calls(), 0);
    }

    #[actix_web::test]
    async fn analyze_without_file_field_is_bad_request() {
        let fakes = Fakes::healthy();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&fakes)))
                .configure(configure_routes),
        )
        .await;

        let body = multipart("photo", "image/jpeg", &encode_test_jpeg(8, 8));
        let resp = test::call_service(&app, upload_request("/api/analyze", body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn recommend_and_generate_alias_agree() {
        let fakes = Fakes::healthy();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&fakes)))
                .configure(configure_routes),
        )
        .await;
        let analysis: Value = serde_json::from_str(ANALYSIS_JSON).unwrap();
        let payload = serde_json::json!({ "currentOutfit": "beige trench", "analysis": analysis });

        for uri in ["/api/generate", "/api/recommend"] {
            let req = test::TestRequest::post()
                .uri(uri)
                .set_json(&payload)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);

            let json: Value = test::read_body_json(resp).await;
            assert_eq!(json["queries"].as_array().unwrap().len(), 3);
            let results = json["results"].as_array().unwrap();
            assert_eq!(results.len(), 3);
            assert!(results[0]["comment"].is_string());
            assert!(results[0]["siteGroup"].is_string());
        }
    }

    #[actix_web::test]
    async fn recommend_without_analysis_is_bad_request() {
        let fakes = Fakes::healthy();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&fakes)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/generate")
            .set_json(serde_json::json!({ "currentOutfit": "jeans" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["kind"], "validation_error");
    }

    #[actix_web::test]
    async fn outfit_runs_the_full_pipeline() {
        let fakes = Fakes::healthy();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&fakes)))
                .configure(configure_routes),
        )
        .await;

        let body = multipart("file", "image/png", &encode_test_png());
        let resp = test::call_service(&app, upload_request("/api/outfit", body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["analysis"]["scores"]["overall"], 8.0);
        assert_eq!(json["queries"].as_array().unwrap().len(), 3);
        assert_eq!(json["results"].as_array().unwrap().len(), 3);
        assert_eq!(fakes.analysis.last_mime_type().as_deref(), Some("image/jpeg"));
    }

    #[actix_web::test]
    async fn image_gen_and_horoscope_respond() {
        let fakes = Fakes::healthy();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(&fakes)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/image-gen")
            .set_json(serde_json::json!({ "prompt": "navy blazer" }))
            .to_request();
        let json: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(json["image_url"], "data:image/jpeg;base64,AQID");

        let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();
        let req = test::TestRequest::post()
            .uri("/api/horoscope")
            .set_json(serde_json::json!({
                "zodiac_sign": "Leo", "name": "Sam", "date": today,
                "weather": "rainy", "gender": "male", "blood_type": "O"
            }))
            .to_request();
        let json: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(json["prediction"], "Lucky color: navy.");

        let req = test::TestRequest::post()
            .uri("/api/horoscope")
            .set_json(serde_json::json!({ "zodiac_sign": "Leo" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn health_reports_service() {
        let app = test::init_service(App::new().configure(configure_routes)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let json: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "outfit-advisor");
    }

    fn encode_test_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(16, 16, image::Rgb([200, 180, 150]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }
}
