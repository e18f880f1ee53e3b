use std::{env, fs, io};

use actix_octet_stream::{DeferredUpload, Files, OctetStream, OctetStreamConfig};
use actix_web::{error, middleware::Logger, post, web, App, Error, HttpServer, Responder};

#[post("/upload")]
async fn upload(files: Files) -> impl Responder {
    web::Json(files)
}

#[post("/upload")]
async fn upload_with_progress(mut deferred: DeferredUpload) -> Result<impl Responder, Error> {
    while let Some(event) = deferred.next_event().await {
        log::info!("{event:?}");
    }

    let files = deferred.finish().await.map_err(error::ErrorBadRequest)?;
    Ok(web::Json(files))
}

/// Reads middleware configuration from the JSON file named by `UPLOAD_CONFIG`, if set.
fn load_config() -> io::Result<OctetStreamConfig> {
    let Ok(path) = env::var("UPLOAD_CONFIG") else {
        return Ok(OctetStreamConfig::default().upload_dir("./uploads"));
    };

    let value = serde_json::from_str(&fs::read_to_string(path)?)?;
    OctetStreamConfig::from_json(value).map_err(io::Error::other)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = load_config()?;
    if let Some(dir) = config.get_upload_dir() {
        fs::create_dir_all(dir)?;
    }

    log::info!("starting HTTP server at http://localhost:8080");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(
                web::scope("/deferred")
                    .wrap(OctetStream::new(config.clone().defer(true)))
                    .service(upload_with_progress),
            )
            .service(
                web::scope("")
                    .wrap(OctetStream::new(config.clone()))
                    .service(upload),
            )
    })
    .workers(2)
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
}
