//! End-to-end tests: http requests in, responses out, over the in-memory
//! namespace.
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};

use dav_engine::body::Body;
use dav_engine::memns::MemNs;
use dav_engine::{Credentials, DavHandler};

fn setup() -> (DavHandler, MemNs, Credentials) {
    let _ = env_logger::builder().is_test(true).try_init();
    let ns = MemNs::new();
    let alice = ns.add_user("alice");
    let handler = DavHandler::builder()
        .namespace(Box::new(ns.clone()))
        .build_handler();
    (handler, ns, Credentials::user(alice))
}

async fn request(
    handler: &DavHandler,
    creds: &Credentials,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let req = builder
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap();
    handler.handle_auth(req, creds.clone()).await
}

async fn text(resp: Response<Body>) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

#[tokio::test]
async fn options_advertises_extensions() {
    let (h, _, creds) = setup();
    let resp = request(&h, &creds, "OPTIONS", "/", &[], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let dav = resp.headers().get("dav").unwrap().to_str().unwrap();
    assert!(dav.contains("access-control"));
    assert!(dav.contains("sync-collection"));
    assert!(!dav.contains("2"));
    let allow = resp.headers().get("allow").unwrap().to_str().unwrap();
    assert!(allow.contains("PROPFIND"));
    assert!(allow.contains("REPORT"));
}

#[tokio::test]
async fn mkcol_put_propfind_depth() {
    let (h, _, creds) = setup();

    let resp = request(&h, &creds, "MKCOL", "/col/", &[], "").await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // Again: already exists.
    let resp = request(&h, &creds, "MKCOL", "/col/", &[], "").await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    // Missing intermediate collection.
    let resp = request(&h, &creds, "MKCOL", "/no/such/deep/", &[], "").await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // A request body is not understood.
    let resp = request(&h, &creds, "MKCOL", "/other/", &[], "<x/>").await;
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let resp = request(&h, &creds, "PUT", "/col/a.txt", &[], "hello").await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert!(resp.headers().get("etag").is_some());

    let resp = request(&h, &creds, "PROPFIND", "/col/", &[("depth", "0")], "").await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    let body = text(resp).await;
    assert_eq!(count(&body, "<D:response>"), 1);
    assert!(body.contains("<D:collection"));

    let resp = request(&h, &creds, "PROPFIND", "/col/", &[("depth", "1")], "").await;
    let body = text(resp).await;
    assert_eq!(count(&body, "<D:response>"), 2);
    assert!(body.contains("/col/a.txt"));
}

#[tokio::test]
async fn propfind_depth_defaults_to_infinity() {
    let (h, _, creds) = setup();
    request(&h, &creds, "MKCOL", "/a/", &[], "").await;
    request(&h, &creds, "MKCOL", "/a/b/", &[], "").await;
    request(&h, &creds, "PUT", "/a/b/c", &[], "x").await;

    let resp = request(&h, &creds, "PROPFIND", "/a/", &[], "").await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    let body = text(resp).await;
    assert_eq!(count(&body, "<D:response>"), 3);
    assert!(body.contains("/a/b/c"));
}

#[tokio::test]
async fn propfind_named_and_unknown() {
    let (h, _, creds) = setup();
    request(&h, &creds, "PUT", "/f.txt", &[], "hi").await;

    let body = r#"<D:propfind xmlns:D="DAV:"><D:prop>
        <D:getcontentlength/><D:nosuchprop/>
    </D:prop></D:propfind>"#;
    let resp = request(&h, &creds, "PROPFIND", "/f.txt", &[("depth", "0")], body).await;
    let out = text(resp).await;
    assert!(out.contains("<D:getcontentlength>2</D:getcontentlength>"));
    assert!(out.contains("404"));

    // return-minimal suppresses the not-found propstat.
    let resp = request(
        &h,
        &creds,
        "PROPFIND",
        "/f.txt",
        &[("depth", "0"), ("prefer", "return-minimal")],
        body,
    )
    .await;
    let out = text(resp).await;
    assert!(!out.contains("404"));
}

#[tokio::test]
async fn get_head_and_conditionals() {
    let (h, _, creds) = setup();
    request(
        &h,
        &creds,
        "PUT",
        "/doc",
        &[("content-type", "text/plain")],
        "payload",
    )
    .await;

    let resp = request(&h, &creds, "GET", "/doc", &[], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let etag = resp
        .headers()
        .get("etag")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/plain"
    );
    assert_eq!(text(resp).await, "payload");

    let resp = request(&h, &creds, "HEAD", "/doc", &[], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-length").unwrap(), "7");
    assert!(text(resp).await.is_empty());

    // If-None-Match with the current etag: not modified.
    let resp = request(&h, &creds, "GET", "/doc", &[("if-none-match", &etag)], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);

    // If-Match with a stale etag refuses the write.
    let resp = request(
        &h,
        &creds,
        "PUT",
        "/doc",
        &[("if-match", "\"bogus\"")],
        "nope",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);

    let resp = request(&h, &creds, "GET", "/nosuch", &[], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_if_none_match_star() {
    let (h, _, creds) = setup();
    let resp = request(&h, &creds, "PUT", "/new", &[("if-none-match", "*")], "a").await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // Existing target: the star precondition fails.
    let resp = request(&h, &creds, "PUT", "/new", &[("if-none-match", "*")], "b").await;
    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);

    let resp = request(&h, &creds, "GET", "/new", &[], "").await;
    assert_eq!(text(resp).await, "a");
}

#[tokio::test]
async fn copy_move_semantics() {
    let (h, _, creds) = setup();
    request(&h, &creds, "MKCOL", "/c/", &[], "").await;
    request(&h, &creds, "PUT", "/c/x", &[], "data").await;

    // Onto itself: never.
    let resp = request(&h, &creds, "COPY", "/c/x", &[("destination", "/c/x")], "").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = request(&h, &creds, "GET", "/c/x", &[], "").await;
    assert_eq!(text(resp).await, "data");

    // Missing Destination header.
    let resp = request(&h, &creds, "COPY", "/c/x", &[], "").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Destination parent absent.
    let resp = request(&h, &creds, "COPY", "/c/x", &[("destination", "/no/y")], "").await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = request(&h, &creds, "COPY", "/c/x", &[("destination", "/c/y")], "").await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // Overwrite: F on an existing destination.
    let resp = request(
        &h,
        &creds,
        "COPY",
        "/c/x",
        &[("destination", "/c/y"), ("overwrite", "F")],
        "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);

    // Overwrite defaults to true; replacing an existing node is 204.
    let resp = request(&h, &creds, "MOVE", "/c/x", &[("destination", "/c/y")], "").await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = request(&h, &creds, "GET", "/c/x", &[], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = request(&h, &creds, "GET", "/c/y", &[], "").await;
    assert_eq!(text(resp).await, "data");
}

#[tokio::test]
async fn delete_collection_recursively() {
    let (h, _, creds) = setup();
    request(&h, &creds, "MKCOL", "/d/", &[], "").await;
    request(&h, &creds, "PUT", "/d/one", &[], "1").await;
    request(&h, &creds, "PUT", "/d/two", &[], "2").await;

    // DELETE only accepts Depth: infinity.
    let resp = request(&h, &creds, "DELETE", "/d/", &[("depth", "0")], "").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(&h, &creds, "DELETE", "/d/", &[], "").await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = request(&h, &creds, "GET", "/d/one", &[], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = request(&h, &creds, "DELETE", "/d/", &[], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn proppatch_dead_properties() {
    let (h, _, creds) = setup();
    request(&h, &creds, "PUT", "/p", &[], "x").await;

    let body = r#"<D:propertyupdate xmlns:D="DAV:" xmlns:Z="urn:example:z">
        <D:set><D:prop><Z:color>blue</Z:color></D:prop></D:set>
    </D:propertyupdate>"#;
    let resp = request(&h, &creds, "PROPPATCH", "/p", &[], body).await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    assert!(text(resp).await.contains("200"));

    let body = r#"<D:propfind xmlns:D="DAV:" xmlns:Z="urn:example:z">
        <D:prop><Z:color/></D:prop></D:propfind>"#;
    let resp = request(&h, &creds, "PROPFIND", "/p", &[("depth", "0")], body).await;
    let out = text(resp).await;
    assert!(out.contains("blue"));

    let body = r#"<D:propertyupdate xmlns:D="DAV:" xmlns:Z="urn:example:z">
        <D:remove><D:prop><Z:color/></D:prop></D:remove>
    </D:propertyupdate>"#;
    let resp = request(&h, &creds, "PROPPATCH", "/p", &[], body).await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
}

#[tokio::test]
async fn proppatch_partial_failure_is_424() {
    let (h, _, creds) = setup();
    request(&h, &creds, "PUT", "/p", &[], "x").await;

    // One settable dead property, one protected live property.
    let body = r#"<D:propertyupdate xmlns:D="DAV:" xmlns:Z="urn:example:z">
        <D:set><D:prop><Z:color>red</Z:color></D:prop></D:set>
        <D:set><D:prop><D:getetag>fake</D:getetag></D:prop></D:set>
    </D:propertyupdate>"#;
    let resp = request(&h, &creds, "PROPPATCH", "/p", &[], body).await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    let out = text(resp).await;
    assert!(out.contains("424"));
    assert!(out.contains("403"));
    assert!(!out.contains("HTTP/1.1 200"));
}

#[tokio::test]
async fn proppatch_remove_requires_empty_elements() {
    let (h, _, creds) = setup();
    request(&h, &creds, "PUT", "/p", &[], "x").await;

    let body = r#"<D:propertyupdate xmlns:D="DAV:" xmlns:Z="urn:z">
        <D:remove><D:prop><Z:color><Z:hue/></Z:color></D:prop></D:remove>
    </D:propertyupdate>"#;
    let resp = request(&h, &creds, "PROPPATCH", "/p", &[], body).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bad_depth_literal_is_rejected() {
    let (h, _, creds) = setup();
    request(&h, &creds, "MKCOL", "/a/", &[], "").await;
    request(&h, &creds, "PUT", "/a/f", &[], "x").await;

    // Anything but 0/1/infinity is a client error, not "absent".
    let resp = request(&h, &creds, "PROPFIND", "/a/", &[("depth", "2")], "").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(&h, &creds, "DELETE", "/a/", &[("depth", "yes")], "").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(
        &h,
        &creds,
        "COPY",
        "/a/",
        &[("destination", "/b/"), ("depth", "2")],
        "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sync_collection_report() {
    let (h, _, creds) = setup();
    request(&h, &creds, "MKCOL", "/s/", &[], "").await;

    let report = r#"<D:sync-collection xmlns:D="DAV:">
        <D:sync-token/><D:sync-level>1</D:sync-level>
        <D:prop><D:getetag/></D:prop>
    </D:sync-collection>"#;
    let resp = request(&h, &creds, "REPORT", "/s/", &[], report).await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    let out = text(resp).await;
    let token = out
        .split("<D:sync-token>")
        .nth(1)
        .and_then(|s| s.split("</D:sync-token>").next())
        .unwrap()
        .to_string();
    assert_eq!(count(&out, "<D:response>"), 0);

    request(&h, &creds, "PUT", "/s/item", &[], "v1").await;

    let report = format!(
        r#"<D:sync-collection xmlns:D="DAV:">
        <D:sync-token>{}</D:sync-token><D:sync-level>1</D:sync-level>
        <D:prop><D:getetag/></D:prop>
    </D:sync-collection>"#,
        token
    );
    let resp = request(&h, &creds, "REPORT", "/s/", &[], &report).await;
    let out = text(resp).await;
    assert_eq!(count(&out, "<D:response>"), 1);
    assert!(out.contains("/s/item"));
    let token2 = out
        .split("<D:sync-token>")
        .nth(1)
        .and_then(|s| s.split("</D:sync-token>").next())
        .unwrap()
        .to_string();
    assert_ne!(token, token2);

    // Unchanged collection: empty report, same token again.
    let report = format!(
        r#"<D:sync-collection xmlns:D="DAV:">
        <D:sync-token>{}</D:sync-token><D:sync-level>1</D:sync-level>
    </D:sync-collection>"#,
        token2
    );
    let resp = request(&h, &creds, "REPORT", "/s/", &[], &report).await;
    let out = text(resp).await;
    assert_eq!(count(&out, "<D:response>"), 0);
    assert!(out.contains(&token2));

    // Deletions show up as 404 entries.
    request(&h, &creds, "DELETE", "/s/item", &[], "").await;
    let report = format!(
        r#"<D:sync-collection xmlns:D="DAV:">
        <D:sync-token>{}</D:sync-token><D:sync-level>1</D:sync-level>
    </D:sync-collection>"#,
        token2
    );
    let resp = request(&h, &creds, "REPORT", "/s/", &[], &report).await;
    let out = text(resp).await;
    assert!(out.contains("/s/item"));
    assert!(out.contains("404"));
}

#[tokio::test]
async fn sync_report_bad_token_vs_missing_collection() {
    let (h, _, creds) = setup();
    request(&h, &creds, "MKCOL", "/s/", &[], "").await;

    let report = r#"<D:sync-collection xmlns:D="DAV:">
        <D:sync-token>sync:99999999</D:sync-token><D:sync-level>1</D:sync-level>
    </D:sync-collection>"#;
    let resp = request(&h, &creds, "REPORT", "/s/", &[], report).await;
    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);
    assert!(text(resp).await.contains("valid-sync-token"));

    // A missing target is a plain 404, not a token problem.
    let resp = request(&h, &creds, "REPORT", "/gone/", &[], report).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sync_report_limit_truncates_with_507() {
    let (h, _, creds) = setup();
    request(&h, &creds, "MKCOL", "/s/", &[], "").await;
    request(&h, &creds, "PUT", "/s/a", &[], "1").await;
    request(&h, &creds, "PUT", "/s/b", &[], "2").await;
    request(&h, &creds, "PUT", "/s/c", &[], "3").await;

    let report = r#"<D:sync-collection xmlns:D="DAV:">
        <D:sync-token/><D:sync-level>1</D:sync-level>
        <D:limit><D:nresults>2</D:nresults></D:limit>
        <D:prop><D:getetag/></D:prop>
    </D:sync-collection>"#;
    let resp = request(&h, &creds, "REPORT", "/s/", &[], report).await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    let out = text(resp).await;
    // Two members fit the limit; the third becomes the 507 entry for
    // the collection itself, and the continuation token still follows.
    assert_eq!(count(&out, "<D:response>"), 3);
    assert!(out.contains("HTTP/1.1 507"));
    assert!(out.contains("<D:sync-token>"));
}

#[tokio::test]
async fn acl_set_and_read_back() {
    let (h, _, creds) = setup();
    request(&h, &creds, "MKCOL", "/shared/", &[], "").await;

    let acl = r#"<D:acl xmlns:D="DAV:">
        <D:ace><D:principal><D:href>/principals/alice</D:href></D:principal>
            <D:grant><D:privilege><D:all/></D:privilege></D:grant></D:ace>
        <D:ace><D:principal><D:all/></D:principal>
            <D:grant><D:privilege><D:read/></D:privilege></D:grant></D:ace>
    </D:acl>"#;
    let resp = request(&h, &creds, "ACL", "/shared/", &[], acl).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = r#"<D:propfind xmlns:D="DAV:"><D:prop><D:acl/><D:owner/></D:prop></D:propfind>"#;
    let resp = request(&h, &creds, "PROPFIND", "/shared/", &[("depth", "0")], body).await;
    let out = text(resp).await;
    assert!(out.contains("<D:acl>"));
    assert!(out.contains("/principals/alice"));
    assert!(out.contains("<D:read"));
}

#[tokio::test]
async fn acl_unknown_principal_refused() {
    let (h, _, creds) = setup();
    request(&h, &creds, "MKCOL", "/shared/", &[], "").await;

    let acl = r#"<D:acl xmlns:D="DAV:">
        <D:ace><D:principal><D:href>/principals/nobody</D:href></D:principal>
            <D:grant><D:privilege><D:read/></D:privilege></D:grant></D:ace>
    </D:acl>"#;
    let resp = request(&h, &creds, "ACL", "/shared/", &[], acl).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(text(resp).await.contains("recognized-principal"));
}

#[tokio::test]
async fn home_collections_are_private() {
    let (h, ns, alice) = setup();
    let bob = Credentials::user(ns.add_user("bob"));

    let resp = request(&h, &bob, "PROPFIND", "/user/alice/", &[("depth", "0")], "").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = request(&h, &alice, "PROPFIND", "/user/alice/", &[("depth", "0")], "").await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);

    // Even the owner may not change the access list on the home itself.
    let acl = r#"<D:acl xmlns:D="DAV:">
        <D:ace><D:principal><D:all/></D:principal>
            <D:grant><D:privilege><D:read/></D:privilege></D:grant></D:ace>
    </D:acl>"#;
    let resp = request(&h, &alice, "ACL", "/user/alice/", &[], acl).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // The home root lists nobody's homes.
    let resp = request(&h, &alice, "PROPFIND", "/user/", &[("depth", "1")], "").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn anonymous_writes_refused() {
    let (h, _, _) = setup();
    let anon = Credentials::anonymous();

    let resp = request(&h, &anon, "PUT", "/f", &[], "x").await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    // Root grants read to everyone.
    let resp = request(&h, &anon, "PROPFIND", "/", &[("depth", "0")], "").await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
}

#[tokio::test]
async fn current_user_principal_and_privileges() {
    let (h, _, creds) = setup();
    request(&h, &creds, "MKCOL", "/c/", &[], "").await;

    let body = r#"<D:propfind xmlns:D="DAV:"><D:prop>
        <D:current-user-principal/><D:current-user-privilege-set/>
    </D:prop></D:propfind>"#;
    let resp = request(&h, &creds, "PROPFIND", "/c/", &[("depth", "0")], body).await;
    let out = text(resp).await;
    assert!(out.contains("/principals/alice"));
    assert!(out.contains("<D:privilege>"));
}

#[tokio::test]
async fn principal_property_search() {
    let (h, _, creds) = setup();

    let report = r#"<D:principal-property-search xmlns:D="DAV:">
        <D:property-search>
            <D:prop><D:displayname/></D:prop>
            <D:match>alice</D:match>
        </D:property-search>
        <D:prop><D:displayname/></D:prop>
    </D:principal-property-search>"#;
    let resp = request(&h, &creds, "REPORT", "/principals/", &[], report).await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    let out = text(resp).await;
    assert!(out.contains("/principals/alice"));
    assert!(!out.contains("/principals/bob"));
}

#[tokio::test]
async fn principal_match_self() {
    let (h, ns, creds) = setup();
    ns.add_user("bob");

    let report = r#"<D:principal-match xmlns:D="DAV:"><D:self/></D:principal-match>"#;
    let resp = request(&h, &creds, "REPORT", "/principals/", &[], report).await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    let out = text(resp).await;
    assert!(out.contains("/principals/alice"));
    assert!(!out.contains("/principals/bob"));
}

#[tokio::test]
async fn method_not_in_allow_set() {
    let ns = MemNs::new();
    let alice = ns.add_user("alice");
    let handler = DavHandler::builder()
        .namespace(Box::new(ns))
        .methods(dav_engine::DavMethodSet::from_vec(vec!["webdav-ro"]).unwrap())
        .build_handler();
    let creds = Credentials::user(alice);

    let resp = request(&handler, &creds, "PUT", "/f", &[], "x").await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    let resp = request(&handler, &creds, "PROPFIND", "/", &[("depth", "0")], "").await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
}
