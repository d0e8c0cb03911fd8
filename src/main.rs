use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;

mod compose;
mod config;
mod error;
mod qr;
mod storage;

use config::Config;
use error::ApiError;
use qr::{QrService, QrStyle};
use storage::FileStorage;

#[derive(Serialize)]
struct ServerInfo {
    message: String,
    status: String,
    version: String,
    endpoints: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    text: String,
    fg: Option<String>,
    bg: Option<String>,
    size: Option<u32>,
    center_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileQrRequest {
    file_url: String,
    fg: Option<String>,
    bg: Option<String>,
    size: Option<u32>,
    center_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScanRequest {
    image: String,
}

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    filename: String,
    file_id: String,
    size: usize,
    url: String,
    uploaded_at: DateTime<Utc>,
}

// API index
async fn index() -> HttpResponse {
    let info = ServerInfo {
        message: "QR Share Rust API Server 🦀".to_string(),
        status: "running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: vec![
            "/health".to_string(),
            "/generate".to_string(),
            "/upload".to_string(),
            "/files/{filename}".to_string(),
            "/download/{filename}".to_string(),
            "/generate-file-qr".to_string(),
            "/scan-qr".to_string(),
        ],
    };
    HttpResponse::Ok().json(info)
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

// Generate a QR PNG from text
async fn generate_qr(
    qr_service: web::Data<QrService>,
    config: web::Data<Config>,
    req: web::Json<GenerateRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    log::info!("Generating QR code ({} chars of text)", req.text.len());

    let style = QrStyle::from_parts(
        &config.qr,
        req.fg.as_deref(),
        req.bg.as_deref(),
        req.size,
        req.center_image,
    )?;
    let png = qr_service.generate_png(&req.text, &style)?;

    Ok(HttpResponse::Ok().content_type("image/png").body(png))
}

// Generate a QR PNG for an uploaded file's URL
async fn generate_file_qr(
    qr_service: web::Data<QrService>,
    config: web::Data<Config>,
    req: web::Json<FileQrRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();

    if req.file_url.trim().is_empty() {
        return Err(ApiError::Validation("file_url is required".to_string()));
    }
    log::info!("Generating QR code for file URL {}", req.file_url);

    let style = QrStyle::from_parts(
        &config.qr,
        req.fg.as_deref(),
        req.bg.as_deref(),
        req.size,
        req.center_image,
    )?;
    let png = qr_service.generate_png(&req.file_url, &style)?;

    Ok(HttpResponse::Ok().content_type("image/png").body(png))
}

// Multipart upload, field name "file"
async fn upload_file(
    storage: web::Data<FileStorage>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart payload: {e}")))?
    {
        let (name, filename) = {
            let disposition = field.content_disposition();
            (
                disposition.get_name().map(str::to_string),
                disposition.get_filename().map(str::to_string),
            )
        };

        if name.as_deref() != Some("file") {
            continue;
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| ApiError::Validation(format!("failed to read upload: {e}")))?;

            // Stop buffering as soon as the limit is passed.
            if data.len() + chunk.len() > storage.max_file_size() {
                return Err(ApiError::PayloadTooLarge {
                    limit: storage.max_file_size(),
                });
            }
            data.extend_from_slice(&chunk);
        }

        upload = Some((filename.unwrap_or_default(), data));
        break;
    }

    let (filename, data) =
        upload.ok_or_else(|| ApiError::Validation("no file provided".to_string()))?;

    if filename.is_empty() {
        return Err(ApiError::Validation("no file selected".to_string()));
    }

    let record = storage.save(&filename, &data).await?;
    log::info!(
        "Uploaded {} as {} ({} bytes)",
        record.original_name,
        record.stored_name,
        record.size
    );

    Ok(HttpResponse::Ok().json(UploadResponse {
        success: true,
        url: format!("/files/{}", record.stored_name),
        filename: record.original_name,
        file_id: record.file_id,
        size: record.size,
        uploaded_at: record.uploaded_at,
    }))
}

async fn serve_file(
    storage: web::Data<FileStorage>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    let (data, content_type) = storage.load(&name).await?;

    Ok(HttpResponse::Ok().content_type(content_type).body(data))
}

async fn download_file(
    storage: web::Data<FileStorage>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    let (data, content_type) = storage.load(&name).await?;

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .append_header((
            "Content-Disposition",
            format!("attachment; filename=\"{name}\""),
        ))
        .body(data))
}

// No decoder crate is wired in; the capability is reported as unavailable.
async fn scan_qr(req: web::Json<ScanRequest>) -> Result<HttpResponse, ApiError> {
    if req.image.trim().is_empty() {
        return Err(ApiError::Validation("image is required".to_string()));
    }

    Err(ApiError::Unavailable("QR decoding"))
}

fn json_error_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::Validation(format!("invalid request body: {err}")).into()
    })
}

fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/health", web::get().to(health))
        .route("/generate", web::post().to(generate_qr))
        .route("/upload", web::post().to(upload_file))
        .route("/files/{filename}", web::get().to(serve_file))
        .route("/download/{filename}", web::get().to(download_file))
        .route("/generate-file-qr", web::post().to(generate_file_qr))
        .route("/scan-qr", web::post().to(scan_qr));
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::load().expect("Failed to load config");
    let storage = FileStorage::new(&config.storage).expect("Failed to initialize file storage");
    let qr_service = QrService::new(&config.qr);

    let host = config.server.host.clone();
    let port = config.server.port;

    println!("🚀 QR Share server starting on http://{}:{}", host, port);
    println!("📁 Upload folder: {}", config.storage.upload_dir.display());
    println!(
        "🖼  Max upload size: {} bytes",
        config.storage.max_file_size
    );

    let config_data = web::Data::new(config);
    let storage_data = web::Data::new(storage);
    let qr_data = web::Data::new(qr_service);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(config_data.clone())
            .app_data(storage_data.clone())
            .app_data(qr_data.clone())
            .app_data(json_error_config())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(configure_routes)
    })
    .bind(format!("{}:{}", host, port))?
    .run()
    .await
}
