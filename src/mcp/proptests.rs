//! Property-Based Tests for the MCP Client
//!
//! Invariants checked over random inputs:
//!
//! - **Correlation**: over any sequence of serial calls, the n-th response
//!   id equals the n-th request id, and ids strictly increase from 1
//! - **Argument fidelity**: tool arguments appear on the wire unchanged
//!   after a JSON round-trip
//! - **Shape**: exactly one of `result` / `error` is accepted
//!
//! ```bash
//! cargo test --lib mcp::proptests
//! ```

use proptest::prelude::*;
use serde_json::{json, Value};
use std::time::Duration;

use crate::mcp::client::{ClientOptions, McpClient};
use crate::mcp::mock::{well_behaved_reply, MockTransport};
use crate::mcp::protocol::{McpError, McpResponse};

// Helper: Generate arbitrary JSON values (nested up to a small depth)
fn arb_json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-zA-Z_]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_arguments() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-zA-Z]{1,10}", arb_json_value(), 0..5)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

#[derive(Debug, Clone)]
enum Op {
    List,
    Call(String, Value),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::List),
        ("[a-z_]{1,16}", arb_arguments()).prop_map(|(name, args)| Op::Call(name, args)),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn client() -> (McpClient<MockTransport>, std::sync::Arc<std::sync::Mutex<Vec<String>>>) {
    let transport = MockTransport::new(well_behaved_reply);
    let written = transport.written();
    let options = ClientOptions {
        request_timeout: Duration::from_millis(200),
        ..ClientOptions::default()
    };
    (McpClient::new(transport, options), written)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Serial calls are answered strictly in order with matching ids
    #[test]
    fn prop_serial_calls_correlate(ops in prop::collection::vec(arb_op(), 1..20)) {
        let rt = runtime();
        let (client, written) = client();

        let response_ids: Vec<u64> = rt.block_on(async {
            client.initialize().await.unwrap();
            let mut ids = Vec::new();
            for op in &ops {
                match op {
                    Op::List => {
                        client.list_tools().await.unwrap();
                        ids.push(client.last_request_id().await);
                    }
                    Op::Call(name, args) => {
                        let response = client.call_tool(name, args.clone()).await.unwrap();
                        ids.push(response.id);
                    }
                }
            }
            ids
        });

        let request_ids: Vec<u64> = written
            .lock()
            .unwrap()
            .iter()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|v| v.get("id").and_then(Value::as_u64))
            .skip(1) // initialize
            .collect();

        prop_assert_eq!(&request_ids, &response_ids);
        let expected: Vec<u64> = (2..2 + ops.len() as u64).collect();
        prop_assert_eq!(request_ids, expected);
    }

    /// Tool arguments reach the wire byte-for-byte after a JSON round-trip
    #[test]
    fn prop_arguments_round_trip_onto_wire(name in "[a-z_]{1,16}", args in arb_arguments()) {
        let rt = runtime();
        let (client, written) = client();

        rt.block_on(async {
            client.initialize().await.unwrap();
            client.call_tool(&name, args.clone()).await.unwrap();
        });

        let last = written.lock().unwrap().last().cloned().unwrap();
        let sent: Value = serde_json::from_str(&last).unwrap();
        prop_assert_eq!(&sent["params"]["name"], &json!(name));
        prop_assert_eq!(
            serde_json::to_string(&sent["params"]["arguments"]).unwrap(),
            serde_json::to_string(&args).unwrap()
        );
    }

    /// Responses with exactly one of result / error pass the shape check
    #[test]
    fn prop_response_shape(id in 1u64..10_000, result in arb_json_value(), code in -33000i64..-32000) {
        let ok = McpResponse::ok(id, result);
        let ok_json = serde_json::to_string(&ok).unwrap();
        let parsed: McpResponse = serde_json::from_str(&ok_json).unwrap();
        // Includes `"result":null`, which is still a result
        prop_assert!(parsed.check_shape().is_ok());
        prop_assert_eq!(&parsed.result, &ok.result);

        let err = McpResponse::err(id, McpError::new(code, "failure"));
        let err_json = serde_json::to_string(&err).unwrap();
        let parsed: McpResponse = serde_json::from_str(&err_json).unwrap();
        prop_assert!(parsed.check_shape().is_ok());
        prop_assert_eq!(parsed.id, id);
    }
}
