// LibPolyCall
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

// Two bridges talking over the loopback transport, plus the
// always-answers guarantee for arbitrary request paths.

use polycall_common::{ErrorKind, Reportable};
use polycall_core::bridge::{BridgeConfig, BridgeError, ProtocolBridge};
use polycall_core::ffi::{FfiContext, FfiType, FfiValue, FunctionSignature, NativeBridge};
use polycall_core::protocol::{LoopbackTransport, MessageHandler, ProtocolMessage, keys};
use polycall_core::security::{AclEntry, AuditLog, IsolationLevel, PermissionSet, SecurityContext};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn server_bridge() -> Arc<ProtocolBridge> {
    let python = NativeBridge::new("python");
    python
        .register("word_count", "(string) -> i64", |args| {
            let text = args[0].as_str().ok_or("expected string")?;
            Ok(FfiValue::I64(text.split_whitespace().count() as i64))
        })
        .unwrap();
    python
        .register("nap", "(i64) -> void", |args| {
            let ms = args[0].as_i64().unwrap_or(0);
            thread::sleep(Duration::from_millis(ms as u64));
            Ok(FfiValue::Void)
        })
        .unwrap();
    python.register("secret", "() -> void", |_| Ok(FfiValue::Void)).unwrap();

    let ffi = Arc::new(FfiContext::new());
    ffi.register_bridge(Arc::new(python)).unwrap();

    let security = Arc::new(SecurityContext::with_isolation(IsolationLevel::Function, Arc::new(AuditLog::default())));
    security
        .acl()
        .add_entry(AclEntry::new("word_count", "c", "*", PermissionSet::EXECUTE))
        .unwrap();
    security.acl().add_entry(AclEntry::new("nap", "c", "*", PermissionSet::EXECUTE)).unwrap();

    Arc::new(ProtocolBridge::new(BridgeConfig::default(), ffi, security).unwrap())
}

fn client_bridge(transport: Arc<LoopbackTransport>, timeout_ms: u64) -> ProtocolBridge {
    let security = Arc::new(SecurityContext::with_isolation(IsolationLevel::Function, Arc::new(AuditLog::default())));
    let config = BridgeConfig {
        timeout_ms,
        ..BridgeConfig::default()
    };
    ProtocolBridge::new(config, Arc::new(FfiContext::new()), security)
        .unwrap()
        .with_transport(transport)
}

#[test]
fn test_remote_call_over_loopback() {
    let server = server_bridge();
    let transport = Arc::new(LoopbackTransport::new());
    transport.connect("analytics", Arc::clone(&server) as Arc<dyn MessageHandler>);

    let client = client_bridge(Arc::clone(&transport), 1000);
    client
        .register_remote_function("word_count", "python", FunctionSignature::new(vec![FfiType::String], FfiType::I64))
        .unwrap();

    let value = client
        .call_remote_function("word_count", &[FfiValue::String("the quick brown fox".into())], "analytics")
        .unwrap();
    assert_eq!(value, FfiValue::I64(4));

    let audit = server.security().audit_log().entries();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, "access_check");
    assert!(!audit[0].is_denied());
}

#[test]
fn test_server_denial_travels_back() {
    let server = server_bridge();
    let transport = Arc::new(LoopbackTransport::new());
    transport.connect("analytics", Arc::clone(&server) as Arc<dyn MessageHandler>);
    let client = client_bridge(Arc::clone(&transport), 1000);
    client.register_remote_function("secret", "python", FunctionSignature::untyped(0)).unwrap();

    match client.call_remote_function("secret", &[], "analytics").unwrap_err() {
        BridgeError::Remote { kind, .. } => assert_eq!(kind, ErrorKind::PermissionDenied),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_slow_handler_times_out() {
    let server = server_bridge();
    let transport = Arc::new(LoopbackTransport::new());
    transport.connect("analytics", Arc::clone(&server) as Arc<dyn MessageHandler>);

    let client = client_bridge(Arc::clone(&transport), 20);
    client
        .register_remote_function("nap", "python", FunctionSignature::new(vec![FfiType::I64], FfiType::Void))
        .unwrap();

    let err = client.call_remote_function("nap", &[FfiValue::I64(100)], "analytics").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[test]
fn test_unknown_endpoint() {
    let transport = Arc::new(LoopbackTransport::new());
    let client = client_bridge(transport, 1000);
    client.register_remote_function("anything", "go", FunctionSignature::untyped(0)).unwrap();

    let err = client.call_remote_function("anything", &[], "nowhere").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_duplicate_remote_function_keeps_count() {
    let client = client_bridge(Arc::new(LoopbackTransport::new()), 1000);
    client.register_remote_function("f", "go", FunctionSignature::untyped(1)).unwrap();

    let err = client.register_remote_function("f", "go", FunctionSignature::untyped(2)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(client.remote_function_count(), 1);
}

#[test]
fn test_higher_priority_route_wins() {
    let client = client_bridge(Arc::new(LoopbackTransport::new()), 1000);
    client.add_routing_rule("/a", "ep1", 10).unwrap();
    client.add_routing_rule("/a", "ep2", 20).unwrap();

    assert_eq!(client.route_message(&ProtocolMessage::request("/a/x")).as_deref(), Some("ep2"));
    let priorities: Vec<i32> = client.routing_rules().iter().map(|r| r.priority).collect();
    assert_eq!(priorities, vec![20, 10]);
}

proptest! {
    #[test]
    fn prop_bridge_always_answers(path in ".{0,64}", language in proptest::option::of("[a-z]{0,8}"), payload in proptest::collection::vec(any::<u8>(), 0..64)) {
        let server = server_bridge();
        let mut request = ProtocolMessage::request(path);
        request.set_data(payload, polycall_core::protocol::PayloadFormat::Binary);
        if let Some(language) = language {
            request.set_metadata(keys::LANGUAGE, language);
        }

        let response = server.handle_message(&request);
        let tag = response.metadata(keys::ERROR);
        prop_assert!(tag == Some("true") || tag == Some("false"));
        prop_assert_eq!(response.in_reply_to(), Some(request.id()));
        prop_assert_eq!(response.is_error(), tag == Some("true"));
    }
}
