use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use davsession::accounts::keys;
use davsession::test_utils::{InMemoryAccountStore, StaticCredentialsProvider};
use davsession::{
    AccountId, Connection, ConnectionManager, CreateFolderOperation, Credentials,
    DynamicSessionManager, RemoteOperation, RemoteOperationResult, RequestTimeouts, ResultCode,
    ServerVersion,
};

async fn authenticated_connection(server: &MockServer, version: ServerVersion) -> Connection {
    let connection = Connection::new(
        &server.uri(),
        "/remote.php/dav",
        version,
        Duration::from_secs(5),
    )
    .unwrap();
    Credentials::basic("testuser", "testpass", false)
        .apply_to(&connection)
        .await;
    connection
}

fn mkcol() -> wiremock::matchers::MethodExactMatcher {
    method("MKCOL")
}

#[tokio::test]
async fn creating_a_folder_succeeds_with_a_single_request() {
    let server = MockServer::start().await;
    Mock::given(mkcol())
        .and(path("/remote.php/dav/photos"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let connection = authenticated_connection(&server, ServerVersion::new(10, 0, 0)).await;
    let result = CreateFolderOperation::new("/photos", false)
        .run(&connection)
        .await;

    assert!(result.is_success());
    assert_eq!(result.code(), ResultCode::Ok);
}

#[tokio::test]
async fn missing_ancestors_are_created_then_the_primary_is_retried_once() {
    let server = MockServer::start().await;

    // First MKCOL on each level conflicts while its parent is missing;
    // earlier-mounted mocks win, and the one-shot conflicts expire.
    Mock::given(mkcol())
        .and(path("/remote.php/dav/a/b/c"))
        .respond_with(ResponseTemplate::new(409))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(mkcol())
        .and(path("/remote.php/dav/a/b"))
        .respond_with(ResponseTemplate::new(409))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(mkcol())
        .and(path("/remote.php/dav/a"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(mkcol())
        .and(path("/remote.php/dav/a/b"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(mkcol())
        .and(path("/remote.php/dav/a/b/c"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let connection = authenticated_connection(&server, ServerVersion::new(10, 0, 0)).await;
    let result = CreateFolderOperation::new("/a/b/c", true)
        .run(&connection)
        .await;

    assert!(result.is_success());
    // Five MKCOLs total: three conflicting-or-final primaries plus the two
    // ancestor creations. The mock expectations verify the exact counts.
    assert_eq!(server.received_requests().await.unwrap().len(), 5);
}

#[tokio::test]
async fn conflicts_are_terminal_without_ancestor_creation_opt_in() {
    let server = MockServer::start().await;
    Mock::given(mkcol())
        .and(path("/remote.php/dav/a/b"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;

    let connection = authenticated_connection(&server, ServerVersion::new(10, 0, 0)).await;
    let result = CreateFolderOperation::new("/a/b", false)
        .run(&connection)
        .await;

    assert_eq!(result.code(), ResultCode::Conflict);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn a_failing_retry_surfaces_its_result_verbatim() {
    let server = MockServer::start().await;

    Mock::given(mkcol())
        .and(path("/remote.php/dav/x/y"))
        .respond_with(ResponseTemplate::new(409))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(mkcol())
        .and(path("/remote.php/dav/x"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    // The retried primary fails differently; that failure must come back
    // unchanged with no third attempt.
    Mock::given(mkcol())
        .and(path("/remote.php/dav/x/y"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let connection = authenticated_connection(&server, ServerVersion::new(10, 0, 0)).await;
    let result = CreateFolderOperation::new("/x/y", true)
        .run(&connection)
        .await;

    assert_eq!(result.code(), ResultCode::Forbidden);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn unauthorized_is_terminal_even_with_ancestor_creation_enabled() {
    let server = MockServer::start().await;
    Mock::given(mkcol())
        .and(path("/remote.php/dav/a/b/c"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let connection = authenticated_connection(&server, ServerVersion::new(10, 0, 0)).await;
    let result = CreateFolderOperation::new("/a/b/c", true)
        .run(&connection)
        .await;

    assert_eq!(result.code(), ResultCode::Unauthorized);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn forbidden_characters_short_circuit_with_zero_requests() {
    let server = MockServer::start().await;

    // 8.0 servers still enforce the reserved character set.
    let connection = authenticated_connection(&server, ServerVersion::new(8, 0, 0)).await;
    let result = CreateFolderOperation::new("/new:folder", true)
        .run(&connection)
        .await;

    assert_eq!(result.code(), ResultCode::InvalidCharacterInName);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn relaxed_servers_accept_names_with_reserved_characters() {
    let server = MockServer::start().await;
    Mock::given(mkcol())
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let connection = authenticated_connection(&server, ServerVersion::new(10, 0, 0)).await;
    let result = CreateFolderOperation::new("/new:folder", true)
        .run(&connection)
        .await;

    assert!(result.is_success());
}

#[tokio::test]
async fn creating_an_existing_folder_is_terminal_without_recursion() {
    let server = MockServer::start().await;
    // An existing collection answers MKCOL with 405, and so would every
    // ancestor of it; the operation must stop at the first answer.
    Mock::given(mkcol())
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&server)
        .await;

    let connection = authenticated_connection(&server, ServerVersion::new(10, 0, 0)).await;
    let result = CreateFolderOperation::new("/photos", true)
        .run(&connection)
        .await;

    assert_eq!(result.code(), ResultCode::MethodNotAllowed);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn a_conflict_at_the_root_stops_instead_of_recursing() {
    let server = MockServer::start().await;
    Mock::given(mkcol())
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let connection = authenticated_connection(&server, ServerVersion::new(10, 0, 0)).await;
    let result = CreateFolderOperation::new("/top", true)
        .run(&connection)
        .await;

    assert_eq!(result.code(), ResultCode::Conflict);
    // The primary plus one attempt at the root, which is its own parent
    // and therefore the end of the line.
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn connection_refused_is_wrapped_into_a_result() {
    // Bind to grab a free port, then drop the listener so nothing answers.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let connection = Connection::new(
        &format!("http://127.0.0.1:{port}"),
        "/remote.php/dav",
        ServerVersion::new(10, 0, 0),
        Duration::from_secs(5),
    )
    .unwrap();
    Credentials::basic("testuser", "testpass", false)
        .apply_to(&connection)
        .await;

    let result = CreateFolderOperation::new("/photos", true)
        .run(&connection)
        .await;

    assert_eq!(result.code(), ResultCode::UnknownError);
    assert!(result.cause().is_some());
}

#[tokio::test]
async fn slow_responses_surface_as_timeouts() {
    let server = MockServer::start().await;
    Mock::given(mkcol())
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let connection = authenticated_connection(&server, ServerVersion::new(10, 0, 0)).await;
    let error = connection
        .execute(
            Method::from_bytes(b"MKCOL").unwrap(),
            &format!("{}/remote.php/dav/slow", server.uri()),
            None,
            &[],
            RequestTimeouts::new(Duration::from_millis(200), Duration::from_secs(5)),
        )
        .await
        .unwrap_err();

    assert!(error.is_timeout());
    let result = RemoteOperationResult::from_transport_error(error);
    assert_eq!(result.code(), ResultCode::Timeout);
    assert!(result.cause().is_some());
}

#[tokio::test]
async fn folder_creation_works_through_the_session_manager() {
    let server = MockServer::start().await;
    Mock::given(mkcol())
        .and(path("/remote.php/dav/shared"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryAccountStore::new());
    let id = AccountId::new("testuser@cloud.example.com", "cloud");
    store.add_account_with_fields(
        &id,
        [
            (keys::BASE_URL, server.uri().as_str()),
            (keys::SERVER_VERSION, "10.0.2"),
        ],
    );

    let manager =
        DynamicSessionManager::new(store, Arc::new(StaticCredentialsProvider::new("testpass")));
    let connection = manager.get_connection_for(&id).await.unwrap();

    let result = CreateFolderOperation::new("/shared", false)
        .run(&connection)
        .await;
    assert!(result.is_success());

    // The request carried the account's basic-auth header.
    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.contains_key("authorization"));
}
