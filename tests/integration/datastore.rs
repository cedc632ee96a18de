//! `runQuery` round trips: request bodies built from the query types, mock
//! responses decoded into result batches.

use std::time::Duration;

use gcloud_rest::auth::{HttpRequest, ReqwestTransport, RequestMethod, Token, Transport};
use gcloud_rest::datastore::{
    AnyQuery, Filter, GqlQuery, MoreResultsType, PropertyFilterOperator, PropertyOrder, Query,
    QueryResultBatch, Repr, ResultType, TypedValue, Value,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::common::{fast_retry, init_tracing, token_response};

fn run_query_request(server: &MockServer, bearer: &str, query: &AnyQuery) -> HttpRequest {
    HttpRequest {
        method: RequestMethod::Post,
        url: format!("{}/v1/projects/test-project:runQuery", server.uri()),
        headers: vec![
            ("Authorization".to_string(), format!("Bearer {}", bearer)),
            ("Content-Type".to_string(), "application/json".to_string()),
        ],
        body: Some(query.to_request().to_string()),
        timeout: Duration::from_secs(10),
    }
}

fn batch_response() -> serde_json::Value {
    serde_json::json!({
        "batch": {
            "entityResultType": "FULL",
            "entityResults": [
                {
                    "entity": {
                        "key": {
                            "partitionId": {"projectId": "test-project"},
                            "path": [{"kind": "Task", "id": "5629499534213120"}]
                        },
                        "properties": {
                            "done": {"booleanValue": false},
                            "priority": {"integerValue": "4"},
                            "description": {
                                "stringValue": "Learn Cloud Datastore",
                                "excludeFromIndexes": true
                            }
                        }
                    },
                    "version": "1700000000000000",
                    "cursor": "CjgSMmoO"
                }
            ],
            "endCursor": "CjgSMmoOZX5wcm9q",
            "moreResults": "MORE_RESULTS_AFTER_LIMIT",
            "snapshotVersion": "1700000000000001"
        }
    })
}

#[tokio::test]
async fn test_run_structured_query() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(
            "/computeMetadata/v1/instance/service-accounts/default/token",
        ))
        .respond_with(token_response("ya29.datastore", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let query = Query::new("Task")
        .with_filter(Filter::and(vec![
            Filter::property("done", PropertyFilterOperator::Equal, Value::new(false)),
            Filter::property(
                "priority",
                PropertyFilterOperator::GreaterThanOrEqual,
                Value::new(4_i64),
            ),
        ]))
        .with_order(PropertyOrder::descending("priority"))
        .with_limit(1);
    let request_body = AnyQuery::from(query.clone()).to_request();

    Mock::given(method("POST"))
        .and(path("/v1/projects/test-project:runQuery"))
        .and(header("authorization", "Bearer ya29.datastore"))
        .and(body_json(&request_body))
        .respond_with(ResponseTemplate::new(200).set_body_json(batch_response()))
        .expect(1)
        .mount(&server)
        .await;

    let config = Token::builder()
        .with_metadata_base(format!("{}/computeMetadata/v1", server.uri()))
        .with_retry(fast_retry())
        .config()
        .clone();
    let token = Token::for_gce_metadata(config).unwrap();
    let bearer = token.get().await.unwrap();

    let transport = ReqwestTransport::new().unwrap();
    let response = transport
        .execute(run_query_request(&server, &bearer, &AnyQuery::from(query)))
        .await
        .unwrap()
        .error_for_status()
        .unwrap();

    let body: serde_json::Value = response.json().unwrap();
    let batch = QueryResultBatch::from_repr(&body["batch"]).unwrap();

    assert_eq!(batch.entity_result_type, ResultType::Full);
    assert_eq!(batch.more_results, MoreResultsType::MoreResultsAfterLimit);
    assert_eq!(batch.end_cursor, "CjgSMmoOZX5wcm9q");
    assert_eq!(batch.snapshot_version, "1700000000000001");
    assert!(batch.is_finished());

    let result = &batch.entity_results[0];
    assert_eq!(result.cursor, "CjgSMmoO");
    let entity = &result.entity;
    assert_eq!(entity.key.as_ref().unwrap().kind(), Some("Task"));
    assert_eq!(
        entity.property("priority").unwrap().value,
        TypedValue::Integer(4)
    );
    assert!(entity.property("description").unwrap().exclude_from_indexes);

    // Re-encoding keeps the wire shape the server sent.
    let reencoded = batch.to_repr();
    let priority = &reencoded["entityResults"][0]["entity"]["properties"]["priority"];
    assert_eq!(priority["integerValue"], "4");
    assert_eq!(QueryResultBatch::from_repr(&reencoded).unwrap(), batch);
}

#[tokio::test]
async fn test_run_gql_query() {
    init_tracing();
    let server = MockServer::start().await;

    let gql = GqlQuery::new("SELECT * FROM Task WHERE priority >= @min AND done = @1")
        .with_allow_literals(false)
        .bind("min", 4_i64)
        .bind_positional(false);
    let request_body = AnyQuery::from(gql.clone()).to_request();

    assert_eq!(
        request_body["gqlQuery"]["namedBindings"]["min"]["value"]["integerValue"],
        "4"
    );
    assert_eq!(
        request_body["gqlQuery"]["positionalBindings"][0]["value"]["booleanValue"],
        false
    );

    Mock::given(method("POST"))
        .and(path("/v1/projects/test-project:runQuery"))
        .and(body_json(&request_body))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "batch": {
                "entityResultType": "FULL",
                "endCursor": "",
                "moreResults": "NO_MORE_RESULTS",
                "skippedResults": 0
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new().unwrap();
    let response = transport
        .execute(run_query_request(&server, "unused", &AnyQuery::from(gql.clone())))
        .await
        .unwrap();
    assert!(response.is_success());

    let body: serde_json::Value = response.json().unwrap();
    let batch = QueryResultBatch::from_repr(&body["batch"]).unwrap();
    assert!(batch.entity_results.is_empty());
    assert_eq!(batch.more_results, MoreResultsType::NoMoreResults);

    // The server side of the exchange decodes the same query we sent.
    assert_eq!(AnyQuery::from_request(&request_body).unwrap(), AnyQuery::Gql(gql));
}
