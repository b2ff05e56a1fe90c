//! gRPC adapter against a fake native client.

mod common;

use a2a_gateway::grpc::GrpcProxy;
use a2a_gateway::types::*;
use a2a_gateway::{A2AService, CallContext, Code};
use common::{event_text, header_bundle, user_message, FakeConnector};
use futures::future::join_all;
use futures::StreamExt;

fn get(name: &str) -> GetTaskRequest {
    GetTaskRequest {
        name: name.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn connects_lazily_on_first_call() {
    let connector = FakeConnector::new();
    let proxy = GrpcProxy::new(connector.clone());
    assert_eq!(connector.attempts(), 0);

    proxy.get_task(&CallContext::new(), get("tasks/t1")).await.unwrap();
    assert_eq!(connector.attempts(), 1);

    proxy.get_task(&CallContext::new(), get("tasks/t2")).await.unwrap();
    assert_eq!(connector.attempts(), 1, "connection was not reused");
}

#[tokio::test]
async fn concurrent_first_calls_share_one_attempt() {
    let connector = FakeConnector::new();
    let proxy = GrpcProxy::new(connector.clone());
    let ctx = CallContext::new();

    let calls = (0..8).map(|i| proxy.get_task(&ctx, get(&format!("tasks/t{i}"))));
    let results = join_all(calls).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test]
async fn concurrent_callers_share_a_failure_and_later_calls_retry() {
    let connector = FakeConnector::failing();
    let proxy = GrpcProxy::new(connector.clone());
    let ctx = CallContext::new();

    let calls = (0..4).map(|_| proxy.get_task(&ctx, get("tasks/t1")));
    let results = join_all(calls).await;
    for result in &results {
        let err = result.as_ref().unwrap_err();
        assert_eq!(err.code, Code::Unavailable);
        assert!(err.message.contains("connection refused"));
    }
    assert_eq!(connector.attempts(), 1);

    connector.set_failing(false);
    proxy.get_task(&ctx, get("tasks/t1")).await.unwrap();
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test]
async fn requests_and_responses_pass_through_unchanged() {
    let connector = FakeConnector::new();
    let proxy = GrpcProxy::new(connector.clone());

    let request = user_message("ping");
    let response = proxy
        .send_message(&CallContext::new(), request.clone())
        .await
        .unwrap();
    match response {
        SendMessageResponse::Message(message) => {
            assert_eq!(message.message_id, "reply-1");
            assert_eq!(message.context_id, "ctx-1");
        }
        other => panic!("expected a message, got {other:?}"),
    }
    let forwarded = connector.log.requests().pop().unwrap();
    assert_eq!(forwarded, serde_json::to_value(&request).unwrap());

    let listed = proxy
        .list_tasks(&CallContext::new(), ListTasksRequest::default())
        .await
        .unwrap();
    assert_eq!(listed.tasks.len(), 2);
    assert_eq!(listed.next_page_token, "next");
}

#[tokio::test]
async fn every_operation_reaches_the_agent() {
    let connector = FakeConnector::new();
    let proxy = GrpcProxy::new(connector.clone());
    let ctx = CallContext::new();

    let cancelled = proxy
        .cancel_task(&ctx, CancelTaskRequest { name: "tasks/t1".into() })
        .await
        .unwrap();
    assert_eq!(cancelled.status.unwrap().state, TaskState::Cancelled);

    let created = proxy
        .create_task_push_notification_config(
            &ctx,
            CreateTaskPushNotificationConfigRequest {
                parent: "tasks/t1".into(),
                config_id: "cfg-1".into(),
                config: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(created.name, "tasks/t1/pushNotificationConfigs/cfg-1");

    let fetched = proxy
        .get_task_push_notification_config(
            &ctx,
            GetTaskPushNotificationConfigRequest {
                name: created.name.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!(fetched.name, created.name);

    proxy
        .list_task_push_notification_config(
            &ctx,
            ListTaskPushNotificationConfigRequest {
                parent: "tasks/t1".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let deleted = proxy
        .delete_task_push_notification_config(
            &ctx,
            DeleteTaskPushNotificationConfigRequest { name: created.name },
        )
        .await
        .unwrap();
    assert_eq!(deleted, Empty {});

    let card = proxy
        .get_agent_card(&ctx, GetAgentCardRequest {})
        .await
        .unwrap();
    assert_eq!(card.name, "Native Agent");

    assert_eq!(connector.log.requests().len(), 6);
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test]
async fn agent_status_codes_pass_through() {
    let proxy = GrpcProxy::new(FakeConnector::new());

    let err = proxy
        .get_task(&CallContext::new(), get("tasks/missing"))
        .await
        .unwrap_err();
    assert_eq!(err.code, Code::NotFound);
    assert_eq!(err.message, "tasks/missing does not exist");
}

#[tokio::test]
async fn agent_headers_become_metadata() {
    let connector = FakeConnector::new();
    let proxy = GrpcProxy::new(connector.clone());

    let ctx = CallContext::new().with_agent_headers(Some(header_bundle(&[
        ("tenant", "acme"),
        ("X-Trace", "abc"),
    ])));
    proxy.get_task(&ctx, get("tasks/t1")).await.unwrap();

    let metadata = connector.log.metadata().pop().unwrap();
    assert_eq!(metadata.get("tenant").unwrap(), "acme");
    assert_eq!(metadata.get("x-trace").unwrap(), "abc");
}

#[tokio::test]
async fn no_bundle_means_no_metadata() {
    let connector = FakeConnector::new();
    let proxy = GrpcProxy::new(connector.clone());

    proxy.get_task(&CallContext::new(), get("tasks/t1")).await.unwrap();
    assert!(connector.log.metadata().pop().unwrap().is_empty());
}

#[tokio::test]
async fn streaming_relays_events_in_order() {
    let connector = FakeConnector::new();
    let proxy = GrpcProxy::new(connector.clone());

    let events: Vec<_> = proxy
        .send_streaming_message(&CallContext::new(), user_message("go"))
        .await
        .unwrap()
        .collect()
        .await;
    let texts: Vec<_> = events
        .iter()
        .map(|event| event_text(event.as_ref().unwrap()))
        .collect();
    assert_eq!(texts, vec!["e1", "e2", "e3"]);
}

#[tokio::test]
async fn stream_failure_is_surfaced_once_and_ends_the_stream() {
    let proxy = GrpcProxy::new(FakeConnector::new());

    let req = TaskSubscriptionRequest {
        name: "tasks/broken".into(),
    };
    let events: Vec<_> = proxy
        .task_subscription(&CallContext::new(), req)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert_eq!(event_text(events[0].as_ref().unwrap()), "e1");
    let err = events[1].as_ref().unwrap_err();
    assert_eq!(err.code, Code::Internal);
    assert_eq!(err.message, "agent crashed");
}

#[tokio::test]
async fn stream_open_failure_is_returned_directly() {
    let proxy = GrpcProxy::new(FakeConnector::new());

    let req = TaskSubscriptionRequest {
        name: "tasks/missing".into(),
    };
    match proxy.task_subscription(&CallContext::new(), req).await {
        Err(err) => assert_eq!(err.code, Code::NotFound),
        Ok(_) => panic!("expected not_found"),
    }
}
