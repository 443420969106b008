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

//! Protocol Bridge
//!
//! Ties protocol messages to FFI calls: routing rules, payload converters,
//! the remote-function registry, and the request/response lifecycle that
//! passes every call through the security context.

use metrics::counter;
use parking_lot::Mutex;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::BridgeConfig;
use super::converter::{ConversionResult, MessageConverter};
use super::error::{BridgeError, BridgeResult};
use super::remote::RemoteFunction;
use super::routing::{RoutingRule, RoutingTable};
use crate::dop::DopRegistry;
use crate::ffi::{ArgumentEnvelope, FfiContext, FfiValue, FunctionSignature, decode_value, encode_value};
use crate::memory::{RegionAccess, RegionId};
use crate::protocol::{MessageHandler, MessageTransport, MessageType, PayloadFormat, ProtocolMessage, keys};
use crate::security::SecurityContext;
use polycall_common::{ErrorKind, Reportable};

const FUNCTION_PREFIX: &str = "/function/";
const SYSTEM_PREFIX: &str = "/system/";

#[derive(Default)]
struct BridgeState {
    converters: Vec<MessageConverter>,
    remote_functions: Vec<RemoteFunction>,
    shut_down: bool,
}

/// Argument bytes staged in a component region; freed on drop
struct StagedArguments<'a> {
    registry: &'a DopRegistry,
    component: &'a str,
    region: RegionId,
}

impl Drop for StagedArguments<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.registry.memory_free(self.component, self.region) {
            warn!(component = self.component, region = %self.region, error = %e, "failed to release staged arguments");
        }
    }
}

pub struct ProtocolBridge {
    config: BridgeConfig,
    ffi: Arc<FfiContext>,
    security: Arc<SecurityContext>,
    registry: Option<Arc<DopRegistry>>,
    transport: Option<Arc<dyn MessageTransport>>,
    routing: RoutingTable,
    state: Mutex<BridgeState>,
}

impl ProtocolBridge {
    pub fn new(config: BridgeConfig, ffi: Arc<FfiContext>, security: Arc<SecurityContext>) -> BridgeResult<Self> {
        if config.timeout_ms == 0 {
            return Err(BridgeError::InvalidParameter("timeout_ms must be positive".into()).report());
        }
        if config.max_pattern_length == 0 || config.max_endpoint_length == 0 {
            return Err(BridgeError::InvalidParameter("routing length limits must be positive".into()).report());
        }
        info!(timeout_ms = config.timeout_ms, "protocol bridge initialised");

        Ok(Self {
            routing: RoutingTable::new(config.max_pattern_length, config.max_endpoint_length),
            config,
            ffi,
            security,
            registry: None,
            transport: None,
            state: Mutex::new(BridgeState::default()),
        })
    }

    /// Stage arguments of component-tagged calls in the component's memory
    pub fn with_registry(mut self, registry: Arc<DopRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn MessageTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn security(&self) -> &Arc<SecurityContext> {
        &self.security
    }

    pub fn ffi(&self) -> &Arc<FfiContext> {
        &self.ffi
    }

    /// Run the function named by a request through the security gate and
    /// into the target language.
    ///
    /// Arguments are a binary [`ArgumentEnvelope`]; other payload formats go
    /// through a registered converter first. When the message names a
    /// `component` and a registry is attached, the arguments are staged in
    /// that component's memory for the duration of the call.
    pub fn route_to_ffi(&self, message: &ProtocolMessage, target_language: &str, function_name: &str) -> BridgeResult<FfiValue> {
        self.ensure_running()?;
        if target_language.is_empty() || function_name.is_empty() {
            return Err(BridgeError::InvalidParameter("target language and function name are required".into()).report());
        }

        let source_language = message.metadata(keys::SOURCE_LANGUAGE).unwrap_or(&self.config.default_source_language);
        let verdict = self.security.verify_access(function_name, source_language, message.metadata(keys::CONTEXT));
        if !verdict.allowed {
            return Err(BridgeError::AccessDenied {
                function: function_name.to_string(),
                reason: verdict.error_message.unwrap_or_else(|| "denied by security policy".into()),
            }
            .report());
        }

        let payload: Cow<'_, [u8]> = match message.format() {
            PayloadFormat::Binary => Cow::Borrowed(message.data()),
            other => Cow::Owned(self.convert_message(other.name(), message.data(), PayloadFormat::Binary.name())?),
        };

        let (bytes, _staged) = match (self.registry.as_deref(), message.metadata(keys::COMPONENT)) {
            (Some(registry), Some(component)) => {
                registry.security_validate(component, "invoke_remote")?;
                let region = registry.memory_allocate(component, payload.len().max(1), RegionAccess::READ | RegionAccess::WRITE)?;
                let staged = StagedArguments {
                    registry,
                    component,
                    region: region.id,
                };
                registry.write_region(component, region.id, 0, &payload)?;
                let bytes = registry.read_region(component, region.id, 0, payload.len())?;
                (Cow::Owned(bytes), Some(staged))
            }
            _ => (payload, None),
        };

        let args = decode_arguments(&bytes)?;
        debug!(function = function_name, language = target_language, args = args.len(), "routing call to ffi");
        Ok(self.ffi.ffi_call_function(target_language, function_name, &args)?)
    }

    /// Wrap an FFI value in a fresh binary response
    pub fn ffi_result_to_message(&self, result: &FfiValue) -> BridgeResult<ProtocolMessage> {
        let payload = encode_value(result)?;
        Ok(ProtocolMessage::new(MessageType::Response)
            .with_data(payload, PayloadFormat::Binary)
            .with_metadata(keys::ERROR, "false"))
    }

    /// Decode a response produced by [`handle_message`](Self::handle_message)
    pub fn message_to_ffi_result(&self, response: &ProtocolMessage) -> BridgeResult<FfiValue> {
        if response.is_error() {
            let kind = response
                .metadata(keys::ERROR_CODE)
                .and_then(|code| code.parse().ok())
                .and_then(ErrorKind::from_code)
                .unwrap_or(ErrorKind::Internal);
            let message = response.metadata(keys::ERROR_MESSAGE).unwrap_or("remote error without message").to_string();
            return Err(BridgeError::Remote { kind, message }.report());
        }
        if response.data().is_empty() {
            return Ok(FfiValue::Void);
        }
        if response.format() != PayloadFormat::Binary {
            return Err(BridgeError::ConversionFailed(format!("expected binary result, got {}", response.format().name())).report());
        }
        Ok(decode_value(response.data())?)
    }

    pub fn register_remote_function(&self, name: &str, language: &str, signature: FunctionSignature) -> BridgeResult<()> {
        if name.is_empty() || language.is_empty() {
            return Err(BridgeError::InvalidParameter("function name and language are required".into()).report());
        }

        let mut state = self.running_state()?;
        if state.remote_functions.iter().any(|f| f.name == name) {
            return Err(BridgeError::AlreadyRegistered(format!("remote function '{}'", name)).report());
        }
        debug!(function = name, language, %signature, "remote function registered");
        state.remote_functions.push(RemoteFunction {
            name: name.to_string(),
            language: language.to_string(),
            signature,
        });
        Ok(())
    }

    pub fn unregister_remote_function(&self, name: &str) -> BridgeResult<RemoteFunction> {
        let mut state = self.running_state()?;
        let index = state
            .remote_functions
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| BridgeError::NotFound(format!("remote function '{}'", name)).report())?;
        Ok(state.remote_functions.remove(index))
    }

    pub fn remote_functions(&self) -> Vec<RemoteFunction> {
        self.state.lock().remote_functions.clone()
    }

    pub fn remote_function_count(&self) -> usize {
        self.state.lock().remote_functions.len()
    }

    /// Call a registered remote function over the transport.
    ///
    /// The request goes to `/function/{name}` with the function's language
    /// in its metadata and waits at most the configured timeout. No retry.
    pub fn call_remote_function(&self, name: &str, args: &[FfiValue], target_endpoint: &str) -> BridgeResult<FfiValue> {
        let function = {
            let state = self.running_state()?;
            state
                .remote_functions
                .iter()
                .find(|f| f.name == name)
                .cloned()
                .ok_or_else(|| BridgeError::NotFound(format!("remote function '{}'", name)).report())?
        };
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| BridgeError::InvalidState("no transport attached".into()).report())?;

        let type_safety = self.security.policy().enforce_type_safety;
        if type_safety {
            function.signature.check_args(args)?;
        }

        let payload = ArgumentEnvelope::new(args.to_vec()).encode()?;
        let request = ProtocolMessage::request(function.path())
            .with_data(payload, PayloadFormat::Binary)
            .with_metadata(keys::LANGUAGE, function.language.clone())
            .with_metadata(keys::SOURCE_LANGUAGE, self.config.default_source_language.clone());

        debug!(function = name, endpoint = target_endpoint, "calling remote function");
        let response = transport.send_message(target_endpoint, request, self.config.timeout())?;
        let result = self.message_to_ffi_result(&response)?;

        if type_safety {
            function.signature.check_return(&result)?;
        }
        Ok(result)
    }

    /// Register the converter for one ordered type pair
    pub fn register_converter<F>(&self, source_type: &str, target_type: &str, converter: F) -> BridgeResult<()>
    where
        F: Fn(&[u8]) -> ConversionResult + Send + Sync + 'static,
    {
        if source_type.is_empty() || target_type.is_empty() {
            return Err(BridgeError::InvalidParameter("converter types are required".into()).report());
        }

        let mut state = self.running_state()?;
        if state.converters.iter().any(|c| c.handles(source_type, target_type)) {
            return Err(BridgeError::AlreadyRegistered(format!("converter {} -> {}", source_type, target_type)).report());
        }
        state.converters.push(MessageConverter {
            source_type: source_type.to_string(),
            target_type: target_type.to_string(),
            convert: Arc::new(converter),
        });
        Ok(())
    }

    /// Run the registered converter; it is invoked without the bridge lock
    pub fn convert_message(&self, source_type: &str, source: &[u8], target_type: &str) -> BridgeResult<Vec<u8>> {
        let convert = self
            .state
            .lock()
            .converters
            .iter()
            .find(|c| c.handles(source_type, target_type))
            .map(|c| Arc::clone(&c.convert))
            .ok_or_else(|| {
                BridgeError::NoConverter {
                    source_type: source_type.to_string(),
                    target_type: target_type.to_string(),
                }
                .report()
            })?;

        let result = convert(source);
        if !result.success {
            let reason = result.error_message.unwrap_or_else(|| format!("{} -> {} conversion failed", source_type, target_type));
            return Err(BridgeError::ConversionFailed(reason).report());
        }
        Ok(result.data)
    }

    pub fn converter_count(&self) -> usize {
        self.state.lock().converters.len()
    }

    pub fn add_routing_rule(&self, source_pattern: &str, target_endpoint: &str, priority: i32) -> BridgeResult<()> {
        let _state = self.running_state()?;
        self.routing.add_rule(source_pattern, target_endpoint, priority)
    }

    pub fn remove_routing_rule(&self, source_pattern: &str, target_endpoint: &str) -> BridgeResult<RoutingRule> {
        let _state = self.running_state()?;
        self.routing.remove_rule(source_pattern, target_endpoint)
    }

    /// Endpoint for the message's path, highest priority first
    pub fn route_message(&self, message: &ProtocolMessage) -> Option<String> {
        self.routing.route(message.path())
    }

    pub fn routing_rules(&self) -> Vec<RoutingRule> {
        self.routing.rules()
    }

    /// Answer a request. Every message gets a response, tagged `error=true`
    /// or `error=false`.
    pub fn handle_message(&self, message: &ProtocolMessage) -> ProtocolMessage {
        counter!("polycall_bridge_messages_total", 1);

        if self.state.lock().shut_down {
            return self.error_response(message, &BridgeError::InvalidState("bridge has been shut down".into()).report());
        }

        let path = message.path();
        if let Some(function_name) = path.strip_prefix(FUNCTION_PREFIX) {
            let Some(language) = message.metadata(keys::LANGUAGE) else {
                return self.error_response(message, &BridgeError::InvalidParameter("missing 'language' metadata".into()).report());
            };
            return match self.route_to_ffi(message, language, function_name).and_then(|value| encode_value(&value).map_err(BridgeError::from)) {
                Ok(payload) => ProtocolMessage::response_to(message)
                    .with_data(payload, PayloadFormat::Binary)
                    .with_metadata(keys::ERROR, "false"),
                Err(e) => self.error_response(message, &e),
            };
        }

        if let Some(command) = path.strip_prefix(SYSTEM_PREFIX) {
            return self.error_response(message, &BridgeError::NotFound(format!("system command '{}'", command)).report());
        }

        self.error_response(message, &BridgeError::NotFound(format!("path '{}'", path)).report())
    }

    /// Clear every table. Later mutations fail; messages still get answers.
    pub fn shutdown(&self) -> BridgeResult<()> {
        let mut state = self.running_state()?;
        state.converters.clear();
        state.remote_functions.clear();
        state.shut_down = true;
        self.routing.clear();
        info!("protocol bridge shut down");
        Ok(())
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }

    // Private helper methods
    fn running_state(&self) -> BridgeResult<parking_lot::MutexGuard<'_, BridgeState>> {
        let state = self.state.lock();
        if state.shut_down {
            return Err(BridgeError::InvalidState("bridge has been shut down".into()).report());
        }
        Ok(state)
    }

    fn ensure_running(&self) -> BridgeResult<()> {
        self.running_state().map(drop)
    }

    fn error_response(&self, request: &ProtocolMessage, error: &BridgeError) -> ProtocolMessage {
        counter!("polycall_bridge_errors_total", 1);
        let mut response = ProtocolMessage::response_to(request);
        response.set_message_type(MessageType::Error);
        response.set_data(error.to_string().into_bytes(), PayloadFormat::Text);
        response
            .with_metadata(keys::ERROR, "true")
            .with_metadata(keys::ERROR_CODE, error.code().to_string())
            .with_metadata(keys::ERROR_KIND, error.kind().name())
            .with_metadata(keys::ERROR_MESSAGE, error.to_string())
    }
}

impl MessageHandler for ProtocolBridge {
    fn handle_message(&self, message: &ProtocolMessage) -> ProtocolMessage {
        ProtocolBridge::handle_message(self, message)
    }
}

impl fmt::Debug for ProtocolBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ProtocolBridge")
            .field("config", &self.config)
            .field("routes", &self.routing.len())
            .field("converters", &state.converters.len())
            .field("remote_functions", &state.remote_functions.len())
            .field("shut_down", &state.shut_down)
            .finish()
    }
}

fn decode_arguments(bytes: &[u8]) -> BridgeResult<Vec<FfiValue>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    Ok(ArgumentEnvelope::decode(bytes)?.into_values())
}
