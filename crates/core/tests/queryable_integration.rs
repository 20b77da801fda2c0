//! URL composition, invocation and the HTTP verb helpers

mod support;

use querykit_core::{DefaultParse, Observer, Queryable, UseTransport};
use querykit_domain::{HttpMethod, LogLevel, QueryError, RequestInit};
use serde_json::json;
use support::{LogRecorder, ScriptedTransport};

fn root(transport: &ScriptedTransport) -> Queryable {
    Queryable::new("https://x.example/sites/dev/")
        .using(UseTransport::new(transport.clone()))
        .using(DefaultParse)
}

#[test]
fn urls_compose_through_children_and_concat() {
    let q = Queryable::new("https://x.example/sites/dev/").child("/_api/").child("web");
    assert_eq!(q.to_url(), "https://x.example/sites/dev/_api/web");

    let by_title = q.child("lists").concat("/getByTitle('Docs')");
    assert_eq!(by_title.url(), "https://x.example/sites/dev/_api/web/lists/getByTitle('Docs')");

    let mut items = by_title.child("items");
    items.query_mut().set("$top", "5").set("$select", "Title");
    let expected = concat!(
        "https://x.example/sites/dev/_api/web/lists/getByTitle('Docs')/items",
        "?%24top=5&%24select=Title"
    );
    assert_eq!(items.to_request_url(), expected);

    // query parameters belong to one instance
    assert!(items.child("x").query().is_empty());
}

#[test]
fn invoking_outside_a_runtime_is_a_config_error() {
    let q = root(&ScriptedTransport::json(json!({})));
    let result = futures::executor::block_on(q.get());
    assert!(matches!(result, Err(QueryError::Config(_))));
}

#[tokio::test]
async fn missing_send_is_a_config_error() {
    let q = Queryable::new("https://x.example/_api/web").using(DefaultParse);
    let execution = q.get();
    assert_eq!(execution.id(), None);
    assert!(matches!(execution.await, Err(QueryError::Config(_))));
}

#[tokio::test]
async fn invocations_do_not_see_each_other() {
    let transport = ScriptedTransport::echo();
    let mut q = root(&transport).child("_api/web");
    q.on_mut().init.append(Observer::init(|instance, init| {
        instance.query_mut().set("$select", "Title");
        init.headers.set("X-Seen", "1");
        Ok(())
    }));

    let first = q.get().await.unwrap();
    let second = q.get().await.unwrap();
    assert_eq!(first["url"], second["url"]);
    assert_eq!(first["url"], "https://x.example/sites/dev/_api/web?%24select=Title");
    assert_eq!(first["call"], 1);
    assert_eq!(second["call"], 2);

    // init changes stay on the executing instance
    assert!(q.query().is_empty());
    assert!(transport.calls().iter().all(|(_, init)| init.headers.get("X-Seen") == Some("1")));
}

#[tokio::test]
async fn configuration_after_invoke_does_not_affect_the_execution() {
    let transport = ScriptedTransport::json(json!(1));
    let q = root(&transport);
    let execution = q.get();

    let mut changed = q.clone();
    changed.on_mut().post.append(Observer::post(|_, mut args| async move {
        args.result = json!("changed");
        Ok(args)
    }));

    assert_eq!(execution.await.unwrap(), json!(1));
    assert_eq!(changed.get().await.unwrap(), json!("changed"));
}

#[tokio::test]
async fn verb_helpers_force_the_method() {
    let transport = ScriptedTransport::json(json!(null));
    let q = root(&transport).child("_api/web/lists");

    q.post_json(&json!({ "Title": "Docs" })).await.unwrap();
    let init = transport.last_init().unwrap();
    assert_eq!(init.method, HttpMethod::Post);
    assert_eq!(init.body.as_deref(), Some(r#"{"Title":"Docs"}"#));

    q.delete(RequestInit::get()).await.unwrap();
    assert_eq!(transport.last_init().unwrap().method, HttpMethod::Delete);

    q.patch(RequestInit::default().body("{}")).await.unwrap();
    assert_eq!(transport.last_init().unwrap().method, HttpMethod::Patch);
}

#[tokio::test]
async fn log_moment_reaches_subscribers() {
    let transport = ScriptedTransport::json(json!({}));
    let recorder = LogRecorder::default();
    let q = recorder.attach(root(&transport));

    q.get().await.unwrap();
    q.log("manual entry", LogLevel::Info);

    assert!(recorder.contains("Beginning GET request (https://x.example/sites/dev/)"));
    assert!(recorder.contains("manual entry"));
}

#[tokio::test]
async fn http_failures_surface_unchanged() {
    let transport = ScriptedTransport::new(|_, _, _| {
        Ok(querykit_domain::RawResponse::new(404, "{}").with_status_text("Not Found"))
    });
    let error = root(&transport).get().await.unwrap_err();
    assert_eq!(error.status(), Some(404));
    assert!(error.to_string().contains("[404] Not Found"));
}

#[tokio::test]
async fn json_helper_deserializes_results() {
    #[derive(serde::Deserialize)]
    struct Web {
        title: String,
    }

    let transport = ScriptedTransport::json(json!({ "d": { "title": "Dev" } }));
    let web: Web = root(&transport).get().json().await.unwrap();
    assert_eq!(web.title, "Dev");
}
