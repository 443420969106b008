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

//! Security Context
//!
//! Per-call gatekeeper combining the ACL, the function and principal
//! permission registries, the active isolation policy and the audit log.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::acl::AccessControlList;
use super::audit::{AuditEvent, AuditLog, SecurityResult};
use super::error::{SecurityError, SecurityOutcome};
use super::permissions::{PermissionBitmap, PermissionSet};
use polycall_common::Reportable;

/// Capacity of each principal's permission bitmap
pub const PRINCIPAL_PERMISSION_CAPACITY: usize = 64;

/// How strongly calls are isolated from each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum IsolationLevel {
    None,
    Shared,
    #[default]
    Function,
    Module,
    Process,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SecurityLevel {
    None,
    Low,
    Medium,
    High,
    Maximum,
}

impl IsolationLevel {
    pub fn security_level(self) -> SecurityLevel {
        match self {
            IsolationLevel::None => SecurityLevel::None,
            IsolationLevel::Shared => SecurityLevel::Low,
            IsolationLevel::Function => SecurityLevel::Medium,
            IsolationLevel::Module => SecurityLevel::High,
            IsolationLevel::Process => SecurityLevel::Maximum,
        }
    }
}

/// Enforcement switches derived from an isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub isolation_level: IsolationLevel,
    pub security_level: SecurityLevel,
    pub enforce_call_validation: bool,
    pub enforce_type_safety: bool,
    pub enforce_memory_isolation: bool,
    /// Whether unknown functions may be registered after [`SecurityContext::seal`]
    pub allow_dynamic_registration: bool,
}

impl SecurityPolicy {
    pub fn for_isolation(level: IsolationLevel) -> Self {
        let (validation, type_safety, memory_isolation, dynamic) = match level {
            IsolationLevel::None => (false, false, false, true),
            IsolationLevel::Shared => (true, false, false, true),
            IsolationLevel::Function => (true, true, false, true),
            IsolationLevel::Module => (true, true, true, false),
            IsolationLevel::Process => (true, true, true, false),
        };
        Self {
            isolation_level: level,
            security_level: level.security_level(),
            enforce_call_validation: validation,
            enforce_type_safety: type_safety,
            enforce_memory_isolation: memory_isolation,
            allow_dynamic_registration: dynamic,
        }
    }
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self::for_isolation(IsolationLevel::default())
    }
}

#[derive(Debug, Clone)]
struct FunctionRecord {
    language: String,
    permissions: PermissionSet,
}

#[derive(Debug, Default)]
struct RegistryState {
    functions: HashMap<String, FunctionRecord>,
    principals: HashMap<String, PermissionBitmap>,
    sealed: bool,
}

#[derive(Debug)]
pub struct SecurityContext {
    policy: RwLock<SecurityPolicy>,
    acl: AccessControlList,
    audit: Arc<AuditLog>,
    registry: Mutex<RegistryState>,
}

impl SecurityContext {
    /// Build a context. The ACL starts empty with `default_deny` enabled
    /// whenever the policy validates calls.
    pub fn new(policy: SecurityPolicy, audit: Arc<AuditLog>) -> Self {
        Self {
            acl: AccessControlList::new(policy.enforce_call_validation),
            policy: RwLock::new(policy),
            audit,
            registry: Mutex::new(RegistryState::default()),
        }
    }

    pub fn with_isolation(level: IsolationLevel, audit: Arc<AuditLog>) -> Self {
        Self::new(SecurityPolicy::for_isolation(level), audit)
    }

    pub fn acl(&self) -> &AccessControlList {
        &self.acl
    }

    pub fn audit_log(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn policy(&self) -> SecurityPolicy {
        *self.policy.read()
    }

    pub fn set_policy(&self, policy: SecurityPolicy) {
        info!(isolation = ?policy.isolation_level, "security policy replaced");
        *self.policy.write() = policy;
    }

    /// Check one call. Every check is audited as `access_check`.
    pub fn verify_access(&self, function_name: &str, source_language: &str, source_context: Option<&str>) -> SecurityResult {
        let policy = self.policy();

        let result = if function_name.is_empty() {
            SecurityResult::deny(PermissionSet::empty(), "function name cannot be empty")
        } else if !policy.enforce_call_validation {
            SecurityResult::allow(PermissionSet::empty())
        } else {
            let decision = self.acl.check_function_access(function_name, source_language, source_context);
            if decision.allowed {
                SecurityResult::allow(decision.required_permissions)
            } else {
                SecurityResult::deny(
                    decision.required_permissions,
                    decision.message.unwrap_or_else(|| format!("access to '{}' denied", function_name)),
                )
            }
        };

        let target_language = self
            .registry
            .lock()
            .functions
            .get(function_name)
            .map(|f| f.language.clone())
            .unwrap_or_default();

        let mut event = AuditEvent::new("access_check", function_name, result.clone()).with_languages(source_language, target_language);
        if let Some(context) = source_context {
            event = event.with_details(format!("context={}", context));
        }
        self.audit.log_event(event);

        debug!(function = function_name, language = source_language, allowed = result.allowed, "access verified");
        result
    }

    /// Register or update a callable function.
    ///
    /// After [`seal`](Self::seal), an unknown name is rejected unless the
    /// policy allows dynamic registration.
    pub fn register_function(&self, name: &str, language: &str, permissions: PermissionSet) -> SecurityOutcome<()> {
        if name.is_empty() || language.is_empty() {
            return Err(SecurityError::InvalidParameter("function name and language are required".into()).report());
        }

        let allow_dynamic = self.policy().allow_dynamic_registration;
        let mut registry = self.registry.lock();

        if registry.sealed && !allow_dynamic && !registry.functions.contains_key(name) {
            drop(registry);
            let reason = "dynamic registration disabled by security policy".to_string();
            self.audit.log_event(
                AuditEvent::new("register_function", name, SecurityResult::deny(permissions, reason.clone())).with_languages("", language),
            );
            return Err(SecurityError::PermissionDenied {
                subject: name.to_string(),
                reason,
            }
            .report());
        }

        registry.functions.insert(
            name.to_string(),
            FunctionRecord {
                language: language.to_string(),
                permissions,
            },
        );
        debug!(function = name, language, %permissions, "function registered");
        Ok(())
    }

    /// End the startup phase
    pub fn seal(&self) {
        self.registry.lock().sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.registry.lock().sealed
    }

    pub fn is_function_registered(&self, name: &str) -> bool {
        self.registry.lock().functions.contains_key(name)
    }

    pub fn function_permissions(&self, name: &str) -> Option<PermissionSet> {
        self.registry.lock().functions.get(name).map(|f| f.permissions)
    }

    /// Grant permission bit `permission_id` to `principal`
    pub fn grant_permission(&self, principal: &str, permission_id: usize) -> SecurityOutcome<()> {
        if principal.is_empty() {
            return Err(SecurityError::InvalidParameter("principal cannot be empty".into()).report());
        }
        let mut registry = self.registry.lock();
        let bitmap = registry
            .principals
            .entry(principal.to_string())
            .or_insert_with(|| PermissionBitmap::new(PRINCIPAL_PERMISSION_CAPACITY));
        bitmap.grant(permission_id)?;
        Ok(())
    }

    pub fn revoke_permission(&self, principal: &str, permission_id: usize) -> SecurityOutcome<()> {
        let mut registry = self.registry.lock();
        let bitmap = registry
            .principals
            .get_mut(principal)
            .ok_or_else(|| SecurityError::NotFound(format!("principal '{}'", principal)).report())?;
        bitmap.revoke(permission_id)?;
        Ok(())
    }

    pub fn has_permission(&self, principal: &str, permission_id: usize) -> bool {
        self.registry
            .lock()
            .principals
            .get(principal)
            .and_then(|bitmap| bitmap.check(permission_id).ok())
            .unwrap_or(false)
    }

    /// Named permissions held by `principal`
    pub fn principal_permissions(&self, principal: &str) -> PermissionSet {
        self.registry.lock().principals.get(principal).map(PermissionBitmap::to_set).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::acl::AclEntry;
    use crate::security::audit::AuditConfig;

    fn audit() -> Arc<AuditLog> {
        Arc::new(
            AuditLog::new(AuditConfig {
                log_to_console: false,
                ..AuditConfig::default()
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_policy_table() {
        let none = SecurityPolicy::for_isolation(IsolationLevel::None);
        assert!(!none.enforce_call_validation && none.allow_dynamic_registration);

        let function = SecurityPolicy::for_isolation(IsolationLevel::Function);
        assert!(function.enforce_type_safety && !function.enforce_memory_isolation);

        let process = SecurityPolicy::for_isolation(IsolationLevel::Process);
        assert_eq!(process.security_level, SecurityLevel::Maximum);
        assert!(process.enforce_memory_isolation && !process.allow_dynamic_registration);

        assert!(IsolationLevel::Shared < IsolationLevel::Module);
    }

    #[test]
    fn test_validation_disabled_short_circuits() {
        let context = SecurityContext::with_isolation(IsolationLevel::None, audit());
        let result = context.verify_access("anything", "js", None);
        assert!(result.allowed);
        assert_eq!(context.audit_log().len(), 1);
    }

    #[test]
    fn test_every_check_is_audited() {
        let context = SecurityContext::with_isolation(IsolationLevel::Function, audit());
        context.acl().add_entry(AclEntry::new("echo", "*", "*", PermissionSet::EXECUTE)).unwrap();
        context.register_function("echo", "c", PermissionSet::EXECUTE).unwrap();

        assert!(context.verify_access("echo", "js", None).allowed);
        let denied = context.verify_access("drop_tables", "js", Some("web"));
        assert!(!denied.allowed);
        assert!(denied.error_message.is_some());

        let entries = context.audit_log().entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.action == "access_check"));
        assert_eq!(entries[0].target_language, "c");
        assert!(entries[1].is_denied());
        assert_eq!(entries[1].details.as_deref(), Some("context=web"));
    }

    #[test]
    fn test_sealed_context_rejects_unknown_functions() {
        let context = SecurityContext::with_isolation(IsolationLevel::Module, audit());
        context.register_function("balance", "c", PermissionSet::READ).unwrap();
        context.seal();

        let err = context.register_function("exfiltrate", "js", PermissionSet::NETWORK).unwrap_err();
        assert!(matches!(err, SecurityError::PermissionDenied { .. }));
        assert!(!context.is_function_registered("exfiltrate"));

        // Known functions may still be updated
        context.register_function("balance", "c", PermissionSet::READ | PermissionSet::MEMORY_READ).unwrap();
        assert_eq!(context.function_permissions("balance"), Some(PermissionSet::READ | PermissionSet::MEMORY_READ));

        let denial = context.audit_log().entries().pop().unwrap();
        assert_eq!(denial.action, "register_function");
        assert!(denial.is_denied());
    }

    #[test]
    fn test_dynamic_registration_after_policy_swap() {
        let context = SecurityContext::with_isolation(IsolationLevel::Process, audit());
        context.seal();
        assert!(context.register_function("late", "python", PermissionSet::EXECUTE).is_err());

        context.set_policy(SecurityPolicy::for_isolation(IsolationLevel::Shared));
        context.register_function("late", "python", PermissionSet::EXECUTE).unwrap();
        assert!(context.is_function_registered("late"));
    }

    #[test]
    fn test_principal_permissions() {
        let context = SecurityContext::with_isolation(IsolationLevel::Function, audit());
        context.grant_permission("ads_service", 0).unwrap();
        context.grant_permission("ads_service", 8).unwrap();
        assert!(context.has_permission("ads_service", 8));
        assert_eq!(context.principal_permissions("ads_service"), PermissionSet::READ | PermissionSet::INVOKE_REMOTE);

        context.revoke_permission("ads_service", 8).unwrap();
        assert!(!context.has_permission("ads_service", 8));
        assert!(context.grant_permission("ads_service", PRINCIPAL_PERMISSION_CAPACITY).is_err());
        assert!(matches!(context.revoke_permission("nobody", 0), Err(SecurityError::NotFound(_))));
    }
}
