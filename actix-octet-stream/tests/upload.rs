use std::path::Path;

use actix_octet_stream::{
    test::{octet_stream_request, uploaded_file, ScriptedTokenizer},
    Body, DeferredUpload, Event, Files, OctetStream, OctetStreamConfig, X_FILE_NAME,
};
use actix_web::{
    dev::{Service, ServiceResponse},
    http::{header, StatusCode},
    test::{self, TestRequest},
    web, App, Error, HttpResponse,
};
use serde_json::{json, Value};

async fn echo(body: Body, files: Files) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "body": body, "files": files }))
}

async fn status_of<S, R>(app: &S, req: R) -> StatusCode
where
    S: Service<R, Response = ServiceResponse, Error = Error>,
{
    match test::try_call_service(app, req).await {
        Ok(res) => res.status(),
        Err(err) => err.as_response_error().status_code(),
    }
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[actix_rt::test]
async fn upload_is_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();

    let app = test::init_service(
        App::new()
            .wrap(OctetStream::new(
                OctetStreamConfig::default()
                    .upload_dir(dir.path())
                    .keep_extensions(true)
                    .hash(true),
            ))
            .default_service(web::to(echo)),
    )
    .await;

    let req = octet_stream_request()
        .uri("/upload")
        .insert_header((X_FILE_NAME, "notes.txt"))
        .insert_header((header::CONTENT_LENGTH, "11"))
        .set_payload("hello world")
        .to_request();
    let res: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(res["body"], Value::Null);

    let file = &res["files"]["file"];
    assert_eq!(file["size"], 11);
    assert_eq!(file["file_name"], "notes.txt");
    assert_eq!(file["content_type"], "application/octet-stream");
    assert_eq!(
        file["hash"],
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );

    let path = Path::new(file["path"].as_str().unwrap());
    assert!(path.starts_with(dir.path()));
    assert_eq!(path.extension().unwrap(), "txt");
    assert_eq!(std::fs::read(path).unwrap(), b"hello world");
}

#[actix_rt::test]
async fn other_requests_see_empty_data() {
    let dir = tempfile::tempdir().unwrap();

    let app = test::init_service(
        App::new()
            .wrap(OctetStream::new(
                OctetStreamConfig::default().upload_dir(dir.path()),
            ))
            .route("/echo", web::to(echo))
            .route(
                "/raw",
                web::post().to(|body: Body, bytes: web::Bytes| async move {
                    assert!(!body.is_null());
                    HttpResponse::Ok().body(bytes)
                }),
            ),
    )
    .await;

    let req = octet_stream_request()
        .method(actix_web::http::Method::GET)
        .uri("/echo")
        .to_request();
    let res: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(res, json!({ "body": {}, "files": {} }));

    // payload of other content types is left for the handler
    let req = TestRequest::post()
        .uri("/raw")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload(r#"{"a":1}"#)
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, r#"{"a":1}"#);

    assert_eq!(file_count(dir.path()), 0);
}

#[actix_rt::test]
async fn oversized_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let app = test::init_service(
        App::new()
            .wrap(OctetStream::new(
                OctetStreamConfig::default()
                    .upload_dir(dir.path())
                    .max_file_size(4),
            ))
            .default_service(web::to(|| async {
                HttpResponse::Ok().finish()
            })),
    )
    .await;

    let req = octet_stream_request().set_payload("too large").to_request();
    assert_eq!(status_of(&app, req).await, StatusCode::BAD_REQUEST);
    assert_eq!(file_count(dir.path()), 0);

    let req = octet_stream_request().set_payload("fits").to_request();
    assert_eq!(status_of(&app, req).await, StatusCode::OK);
    assert_eq!(file_count(dir.path()), 1);
}

#[actix_rt::test]
async fn registered_twice_parses_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = OctetStreamConfig::default().upload_dir(dir.path());

    let app = test::init_service(
        App::new()
            .wrap(OctetStream::new(config.clone()))
            .wrap(OctetStream::new(config))
            .default_service(web::to(echo)),
    )
    .await;

    let req = octet_stream_request().set_payload("once").to_request();
    let res: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(res["files"]["file"]["size"], 4);
    assert_eq!(file_count(dir.path()), 1);
}

#[actix_rt::test]
async fn deferred_upload() {
    let dir = tempfile::tempdir().unwrap();

    let app = test::init_service(
        App::new()
            .wrap(OctetStream::new(
                OctetStreamConfig::default()
                    .upload_dir(dir.path())
                    .defer(true),
            ))
            .default_service(web::to(|files: Files, upload: DeferredUpload| async move {
                assert!(files.is_empty());

                match upload.finish().await {
                    Ok(files) => HttpResponse::Ok().json(files),
                    Err(err) => HttpResponse::UnprocessableEntity().body(err.to_string()),
                }
            })),
    )
    .await;

    let req = octet_stream_request().set_payload("later").to_request();
    let res: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(res["file"]["size"], 5);

    // errors never reach the chain on their own
    let app = test::init_service(
        App::new()
            .wrap(OctetStream::new(
                OctetStreamConfig::default()
                    .upload_dir(dir.path())
                    .max_file_size(1)
                    .defer(true),
            ))
            .default_service(web::to(|| async { HttpResponse::Accepted().finish() })),
    )
    .await;

    let req = octet_stream_request().set_payload("later").to_request();
    assert_eq!(status_of(&app, req).await, StatusCode::ACCEPTED);
}

#[actix_rt::test]
async fn custom_tokenizer_names() {
    let tokenizer = ScriptedTokenizer::new();
    tokenizer.push(vec![
        Ok(Event::File {
            name: "photos[]".to_owned(),
            file: uploaded_file("/tmp/a", 1),
        }),
        Ok(Event::File {
            name: "avatar[small]".to_owned(),
            file: uploaded_file("/tmp/b", 2),
        }),
        Ok(Event::File {
            name: "photos[]".to_owned(),
            file: uploaded_file("/tmp/c", 3),
        }),
    ]);

    let app = test::init_service(
        App::new()
            .wrap(OctetStream::with_tokenizer(
                OctetStreamConfig::default(),
                tokenizer.clone(),
            ))
            .default_service(web::to(echo)),
    )
    .await;

    let req = octet_stream_request().to_request();
    let res: Value = test::call_and_read_body_json(&app, req).await;

    let files = &res["files"];
    assert_eq!(files["photos"][0]["path"], "/tmp/a");
    assert_eq!(files["photos"][1]["path"], "/tmp/c");
    assert_eq!(files["avatar"]["small"]["size"], 2);
    assert_eq!(tokenizer.calls(), 1);
}
