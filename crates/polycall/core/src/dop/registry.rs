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

//! DOP Component Registry
//!
//! Registers isolated components and enforces their capability masks,
//! memory ceilings and execution-time limits. All component memory comes
//! from one shared pool guarded by the registry's mutex.

use metrics::counter;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::component::{ComponentBehavior, ComponentConfig, ComponentInfo, ComponentState};
use super::error::{DopError, DopResult};
use super::policy::{DopIsolationLevel, permission_for_operation};
use crate::ffi::FfiValue;
use crate::memory::{AllocFlags, MemoryPool, MemoryRegion, PoolStats, RegionAccess, RegionFlags, RegionId};
use crate::security::{AuditEvent, AuditLog, PermissionSet, SecurityResult};
use polycall_common::Reportable;
use polycall_common::config::env_override;

pub const DEFAULT_POOL_SIZE: usize = 16 * 1024 * 1024;
pub const DEFAULT_MAX_COMPONENTS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Bytes in the pool shared by all components
    pub pool_size: usize,
    pub max_components: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            max_components: DEFAULT_MAX_COMPONENTS,
        }
    }
}

impl RegistryConfig {
    /// Defaults overridden by `POLYCALL_DOP_POOL_SIZE` and `POLYCALL_DOP_MAX_COMPONENTS`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        env_override("POLYCALL_DOP_POOL_SIZE", &mut config.pool_size);
        env_override("POLYCALL_DOP_MAX_COMPONENTS", &mut config.max_components);
        config
    }
}

struct Component {
    config: ComponentConfig,
    state: ComponentState,
    total_memory_allocated: usize,
    regions: BTreeSet<RegionId>,
    behavior: Option<Arc<dyn ComponentBehavior>>,
}

impl Component {
    fn info(&self) -> ComponentInfo {
        ComponentInfo {
            component_id: self.config.component_id.clone(),
            display_name: self.config.display_name.clone(),
            language: self.config.language.clone(),
            version: self.config.version.clone(),
            policy: self.config.policy.clone(),
            state: self.state,
            total_memory_allocated: self.total_memory_allocated,
            region_count: self.regions.len(),
            has_behavior: self.behavior.is_some(),
        }
    }

    fn ensure_active(&self) -> DopResult<()> {
        match self.state {
            ComponentState::Ready | ComponentState::Running => Ok(()),
            state => Err(DopError::InvalidState(format!("component '{}' is {}", self.config.component_id, state)).report()),
        }
    }

    /// Audit record for a rejected operation, if the component is audited
    fn violation(&self, action: &str, operation: &str, required: PermissionSet, message: &str) -> Option<AuditEvent> {
        if !self.config.policy.audit_enabled {
            return None;
        }
        Some(
            AuditEvent::new(action, operation, SecurityResult::deny(required, message))
                .with_languages(self.config.language.clone(), "dop")
                .with_details(format!("component={}", self.config.component_id)),
        )
    }
}

struct RegistryState {
    components: BTreeMap<String, Component>,
    regions: HashMap<RegionId, MemoryRegion>,
    pool: MemoryPool,
    next_region_id: u64,
    destroyed: bool,
}

impl RegistryState {
    fn component(&self, id: &str) -> DopResult<&Component> {
        self.components.get(id).ok_or_else(|| DopError::ComponentNotFound(id.to_string()).report())
    }

    fn component_mut(&mut self, id: &str) -> DopResult<&mut Component> {
        self.components.get_mut(id).ok_or_else(|| DopError::ComponentNotFound(id.to_string()).report())
    }

    fn region(&self, id: RegionId) -> DopResult<&MemoryRegion> {
        self.regions.get(&id).ok_or_else(|| DopError::RegionNotFound(id.0).report())
    }

    /// Free every region owned by `component_id` and revoke loans to it
    fn release_component_memory(&mut self, component_id: &str, owned: &BTreeSet<RegionId>) {
        for region_id in owned {
            if let Some(region) = self.regions.remove(region_id) {
                if let Err(e) = self.pool.free(region.ptr) {
                    warn!(component = component_id, region = %region_id, error = %e, "failed to release region");
                }
            }
        }
        for region in self.regions.values_mut() {
            if region.shared_with.as_deref() == Some(component_id) {
                region.shared_with = None;
                region.flags.remove(RegionFlags::SHARED);
            }
        }
    }

    fn release_all(&mut self) {
        let components = std::mem::take(&mut self.components);
        for (id, component) in components {
            self.release_component_memory(&id, &component.regions);
        }
    }
}

pub struct DopRegistry {
    config: RegistryConfig,
    audit: Option<Arc<AuditLog>>,
    state: Mutex<RegistryState>,
}

impl DopRegistry {
    pub fn new(config: RegistryConfig) -> DopResult<Self> {
        if config.max_components == 0 {
            return Err(DopError::InvalidParameter("max_components cannot be zero".into()).report());
        }
        let pool = MemoryPool::new(config.pool_size)?;
        info!(pool_size = config.pool_size, max_components = config.max_components, "DOP registry created");

        Ok(Self {
            config,
            audit: None,
            state: Mutex::new(RegistryState {
                components: BTreeMap::new(),
                regions: HashMap::new(),
                pool,
                next_region_id: 1,
                destroyed: false,
            }),
        })
    }

    /// Attach an audit log for breach and denial events
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn audit_log(&self) -> Option<&Arc<AuditLog>> {
        self.audit.as_ref()
    }

    pub fn component_register(&self, config: ComponentConfig) -> DopResult<ComponentInfo> {
        self.register_component(config, None)
    }

    /// Register a component together with its behaviour model
    pub fn component_register_with_behavior(&self, config: ComponentConfig, behavior: Arc<dyn ComponentBehavior>) -> DopResult<ComponentInfo> {
        self.register_component(config, Some(behavior))
    }

    fn register_component(&self, mut config: ComponentConfig, behavior: Option<Arc<dyn ComponentBehavior>>) -> DopResult<ComponentInfo> {
        if config.component_id.trim().is_empty() {
            return Err(DopError::InvalidParameter("component id cannot be empty".into()).report());
        }
        if config.language.trim().is_empty() {
            return Err(DopError::InvalidParameter(format!("component '{}' has no language", config.component_id)).report());
        }
        if config.display_name.is_empty() {
            config.display_name = config.component_id.clone();
        }
        config.policy = config.policy.normalized();

        let mut state = self.live_state()?;
        if state.components.contains_key(&config.component_id) {
            return Err(DopError::DuplicateComponent(config.component_id).report());
        }
        if state.components.len() >= self.config.max_components {
            return Err(DopError::InvalidState(format!("registry holds the maximum of {} components", self.config.max_components)).report());
        }

        info!(
            component = %config.component_id,
            language = %config.language,
            isolation = ?config.policy.isolation_level,
            max_memory = config.policy.max_memory_usage,
            "component registered"
        );
        let component = Component {
            config,
            state: ComponentState::Ready,
            total_memory_allocated: 0,
            regions: BTreeSet::new(),
            behavior,
        };
        let info = component.info();
        state.components.insert(info.component_id.clone(), component);
        Ok(info)
    }

    /// Remove a component and release every region it owns
    pub fn component_unregister(&self, component_id: &str) -> DopResult<()> {
        let mut state = self.live_state()?;
        let mut component = state
            .components
            .remove(component_id)
            .ok_or_else(|| DopError::ComponentNotFound(component_id.to_string()).report())?;
        state.release_component_memory(component_id, &component.regions);
        component.state = ComponentState::Destroyed;
        info!(component = component_id, regions = component.regions.len(), "component unregistered");
        Ok(())
    }

    pub fn component_find(&self, component_id: &str) -> Option<ComponentInfo> {
        self.state.lock().components.get(component_id).map(Component::info)
    }

    pub fn component_find_by_name(&self, display_name: &str) -> Option<ComponentInfo> {
        self.state
            .lock()
            .components
            .values()
            .find(|c| c.config.display_name == display_name)
            .map(Component::info)
    }

    pub fn component_ids(&self) -> Vec<String> {
        self.state.lock().components.keys().cloned().collect()
    }

    pub fn component_count(&self) -> usize {
        self.state.lock().components.len()
    }

    pub fn component_suspend(&self, component_id: &str) -> DopResult<()> {
        let mut state = self.live_state()?;
        let component = state.component_mut(component_id)?;
        if component.state != ComponentState::Ready {
            return Err(DopError::InvalidState(format!("cannot suspend '{}' while {}", component_id, component.state)).report());
        }
        component.state = ComponentState::Suspended;
        debug!(component = component_id, "component suspended");
        Ok(())
    }

    /// Return a suspended or failed component to `Ready`
    pub fn component_resume(&self, component_id: &str) -> DopResult<()> {
        let mut state = self.live_state()?;
        let component = state.component_mut(component_id)?;
        match component.state {
            ComponentState::Suspended | ComponentState::Error => {
                component.state = ComponentState::Ready;
                debug!(component = component_id, "component resumed");
                Ok(())
            }
            other => Err(DopError::InvalidState(format!("cannot resume '{}' while {}", component_id, other)).report()),
        }
    }

    /// Allocate a region charged to the component's memory budget.
    ///
    /// A request that would take the component past `max_memory_usage` is
    /// an isolation breach and leaves its usage unchanged.
    pub fn memory_allocate(&self, component_id: &str, size: usize, permissions: RegionAccess) -> DopResult<MemoryRegion> {
        if size == 0 {
            return Err(DopError::InvalidParameter("allocation size cannot be zero".into()).report());
        }

        let mut guard = self.live_state()?;
        let state = &mut *guard;
        let component = state
            .components
            .get_mut(component_id)
            .ok_or_else(|| DopError::ComponentNotFound(component_id.to_string()).report())?;
        component.ensure_active()?;

        if !component.config.policy.permits(PermissionSet::ALLOCATE) {
            let notice = component.violation("permission_denied", "memory_allocate", PermissionSet::ALLOCATE, "allocate not permitted");
            return self.reject(
                guard,
                notice,
                DopError::PermissionDenied {
                    component: component_id.to_string(),
                    operation: "allocate memory".into(),
                },
            );
        }

        let allocated = component.total_memory_allocated;
        let limit = component.config.policy.max_memory_usage;
        if allocated.checked_add(size).is_none_or(|total| total > limit) {
            counter!("polycall_dop_isolation_breaches_total", 1);
            let message = format!("memory ceiling {} exceeded by request of {} bytes", limit, size);
            let notice = component.violation("isolation_breach", "memory_allocate", PermissionSet::ALLOCATE, &message);
            return self.reject(
                guard,
                notice,
                DopError::MemoryCeiling {
                    component: component_id.to_string(),
                    requested: size,
                    allocated,
                    limit,
                },
            );
        }

        let level = component.config.policy.isolation_level;
        let mut flags = RegionFlags::empty();
        let mut alloc_flags = AllocFlags::ZERO_INIT;
        if level >= DopIsolationLevel::Standard {
            flags |= RegionFlags::ISOLATED;
        }
        if level >= DopIsolationLevel::Strict {
            flags |= RegionFlags::SECURE;
            alloc_flags |= AllocFlags::SECURE;
        }

        let ptr = state.pool.alloc(size, alloc_flags)?;
        let region_id = RegionId(state.next_region_id);
        state.next_region_id += 1;

        let region = MemoryRegion::new(region_id, format!("{}:{}", component_id, region_id.0), component_id, ptr, size, permissions, flags);
        component.total_memory_allocated += size;
        component.regions.insert(region_id);
        state.regions.insert(region_id, region.clone());

        debug!(component = component_id, region = %region_id, size, total = component.total_memory_allocated, "region allocated");
        Ok(region)
    }

    /// Release a region owned by the component
    pub fn memory_free(&self, component_id: &str, region_id: RegionId) -> DopResult<()> {
        let mut guard = self.live_state()?;
        let state = &mut *guard;
        let component = state.components.get(component_id).ok_or_else(|| DopError::ComponentNotFound(component_id.to_string()).report())?;
        let region = state.regions.get(&region_id).ok_or_else(|| DopError::RegionNotFound(region_id.0).report())?;

        if region.owner != component_id {
            let notice = component.violation("isolation_breach", "memory_free", PermissionSet::MEMORY_WRITE, "region owned by another component");
            return self.reject(
                guard,
                notice,
                DopError::PermissionDenied {
                    component: component_id.to_string(),
                    operation: format!("free {}", region_id),
                },
            );
        }

        let (ptr, size) = (region.ptr, region.size);
        state.pool.free(ptr)?;
        state.regions.remove(&region_id);
        if let Some(component) = state.components.get_mut(component_id) {
            component.total_memory_allocated -= size;
            component.regions.remove(&region_id);
        }
        debug!(component = component_id, region = %region_id, size, "region freed");
        Ok(())
    }

    pub fn memory_usage(&self, component_id: &str) -> DopResult<usize> {
        let state = self.state.lock();
        Ok(state.component(component_id)?.total_memory_allocated)
    }

    pub fn region(&self, region_id: RegionId) -> Option<MemoryRegion> {
        self.state.lock().regions.get(&region_id).cloned()
    }

    /// Regions owned by a component, in allocation order
    pub fn component_regions(&self, component_id: &str) -> Vec<MemoryRegion> {
        let state = self.state.lock();
        let Some(component) = state.components.get(component_id) else {
            return Vec::new();
        };
        component.regions.iter().filter_map(|id| state.regions.get(id).cloned()).collect()
    }

    /// Lend a region to `target`. The owner needs `SHARE`.
    pub fn share_region(&self, owner_id: &str, region_id: RegionId, target_id: &str) -> DopResult<()> {
        let mut guard = self.live_state()?;
        let state = &mut *guard;
        state.component(target_id)?;
        let owner = state.component(owner_id)?;
        owner.ensure_active()?;

        let region = state.region(region_id)?;
        if region.owner != owner_id || !owner.config.policy.permits(PermissionSet::SHARE) {
            let notice = owner.violation("permission_denied", "memory_share", PermissionSet::SHARE, "share not permitted");
            return self.reject(
                guard,
                notice,
                DopError::PermissionDenied {
                    component: owner_id.to_string(),
                    operation: format!("share {}", region_id),
                },
            );
        }

        if let Some(region) = state.regions.get_mut(&region_id) {
            region.share_with(target_id)?;
        }
        debug!(owner = owner_id, region = %region_id, target = target_id, "region shared");
        Ok(())
    }

    pub fn unshare_region(&self, owner_id: &str, region_id: RegionId, target_id: &str) -> DopResult<()> {
        let mut guard = self.live_state()?;
        let state = &mut *guard;
        if let Some((notice, error)) = self.owner_check(state, owner_id, region_id, "memory_unshare", PermissionSet::SHARE)? {
            return self.reject(guard, notice, error);
        }

        if let Some(region) = state.regions.get_mut(&region_id) {
            region.unshare(target_id)?;
        }
        debug!(owner = owner_id, region = %region_id, target = target_id, "region unshared");
        Ok(())
    }

    /// Freeze a region's contents; later writes are rejected
    pub fn lock_region(&self, owner_id: &str, region_id: RegionId) -> DopResult<()> {
        let mut guard = self.live_state()?;
        let state = &mut *guard;
        if let Some((notice, error)) = self.owner_check(state, owner_id, region_id, "memory_lock", PermissionSet::MEMORY_WRITE)? {
            return self.reject(guard, notice, error);
        }

        if let Some(region) = state.regions.get_mut(&region_id) {
            region.flags.insert(RegionFlags::LOCKED);
        }
        debug!(owner = owner_id, region = %region_id, "region locked");
        Ok(())
    }

    pub fn read_region(&self, component_id: &str, region_id: RegionId, offset: usize, len: usize) -> DopResult<Vec<u8>> {
        let guard = self.live_state()?;
        let ptr = match self.check_region_access(&guard, component_id, region_id, offset, len, RegionAccess::READ) {
            Ok(ptr) => ptr,
            Err((notice, error)) => return self.reject(guard, notice, error),
        };
        let payload = guard.pool.slice(ptr)?;
        Ok(payload[offset..offset + len].to_vec())
    }

    pub fn write_region(&self, component_id: &str, region_id: RegionId, offset: usize, data: &[u8]) -> DopResult<()> {
        let mut guard = self.live_state()?;
        let ptr = match self.check_region_access(&guard, component_id, region_id, offset, data.len(), RegionAccess::WRITE) {
            Ok(ptr) => ptr,
            Err((notice, error)) => return self.reject(guard, notice, error),
        };
        let payload = guard.pool.slice_mut(ptr)?;
        payload[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Check that `operation` is permitted for the component.
    ///
    /// Denied permissions win over allowed ones; unknown operation names
    /// are rejected as invalid.
    pub fn security_validate(&self, component_id: &str, operation: &str) -> DopResult<()> {
        let required =
            permission_for_operation(operation).ok_or_else(|| DopError::InvalidParameter(format!("unknown operation '{}'", operation)).report())?;

        let state = self.live_state()?;
        let component = state.component(component_id)?;
        if component.config.policy.permits(required) {
            return Ok(());
        }

        let notice = component.violation("permission_denied", operation, required, "operation not permitted by component policy");
        self.reject(
            state,
            notice,
            DopError::PermissionDenied {
                component: component_id.to_string(),
                operation: operation.to_string(),
            },
        )
    }

    /// Run a method of the component's behaviour model.
    ///
    /// Requires `INVOKE_LOCAL` and a `Ready` component. A call that outlives
    /// `max_execution_time_ms` is a breach and leaves the component in `Error`.
    pub fn component_invoke(&self, component_id: &str, method: &str, args: &[FfiValue]) -> DopResult<FfiValue> {
        let (behavior, limit_ms) = {
            let mut state = self.live_state()?;
            let component = state.component_mut(component_id)?;
            if component.state != ComponentState::Ready {
                return Err(DopError::InvalidState(format!("cannot invoke '{}' while {}", component_id, component.state)).report());
            }
            if !component.config.policy.permits(PermissionSet::INVOKE_LOCAL) {
                let notice = component.violation("permission_denied", method, PermissionSet::INVOKE_LOCAL, "invoke not permitted");
                return self.reject(
                    state,
                    notice,
                    DopError::PermissionDenied {
                        component: component_id.to_string(),
                        operation: format!("invoke {}", method),
                    },
                );
            }
            let Some(behavior) = component.behavior.clone() else {
                return Err(DopError::InvalidState(format!("component '{}' has no behaviour", component_id)).report());
            };
            component.state = ComponentState::Running;
            (behavior, component.config.policy.max_execution_time_ms)
        };

        if let Err(reason) = behavior.validate(method, args) {
            self.set_state_if_present(component_id, ComponentState::Ready);
            return Err(DopError::InvalidParameter(format!("'{}' rejected arguments for {}: {}", component_id, method, reason)).report());
        }

        let started = Instant::now();
        let outcome = behavior.invoke(method, args);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let mut state = self.live_state()?;
        let component = state.component_mut(component_id)?;

        if limit_ms > 0 && elapsed_ms > limit_ms {
            component.state = ComponentState::Error;
            counter!("polycall_dop_isolation_breaches_total", 1);
            let message = format!("execution took {} ms, limit {} ms", elapsed_ms, limit_ms);
            let notice = component.violation("isolation_breach", method, PermissionSet::INVOKE_LOCAL, &message);
            return self.reject(
                state,
                notice,
                DopError::ExecutionTime {
                    component: component_id.to_string(),
                    elapsed_ms,
                    limit_ms,
                },
            );
        }

        component.state = ComponentState::Ready;
        outcome.map_err(|reason| {
            DopError::Behavior {
                component: component_id.to_string(),
                method: method.to_string(),
                reason,
            }
            .report()
        })
    }

    /// Release every component and region. Later mutations fail with `InvalidState`.
    pub fn destroy(&self) -> DopResult<()> {
        let mut state = self.live_state()?;
        state.release_all();
        state.destroyed = true;
        info!("DOP registry destroyed");
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.state.lock().pool.stats()
    }

    // Private helper methods
    fn live_state(&self) -> DopResult<MutexGuard<'_, RegistryState>> {
        let state = self.state.lock();
        if state.destroyed {
            return Err(DopError::InvalidState("registry has been destroyed".into()).report());
        }
        Ok(state)
    }

    fn set_state_if_present(&self, component_id: &str, new_state: ComponentState) {
        if let Some(component) = self.state.lock().components.get_mut(component_id) {
            component.state = new_state;
        }
    }

    /// Release the lock, then audit and report the rejection
    fn reject<T>(&self, state: MutexGuard<'_, RegistryState>, notice: Option<AuditEvent>, error: DopError) -> DopResult<T> {
        drop(state);
        if let (Some(audit), Some(event)) = (&self.audit, notice) {
            audit.log_event(event);
        }
        Err(error.report())
    }

    /// Rejection for a caller that does not own the region, if any
    fn owner_check(
        &self,
        state: &RegistryState,
        component_id: &str,
        region_id: RegionId,
        operation: &str,
        required: PermissionSet,
    ) -> DopResult<Option<(Option<AuditEvent>, DopError)>> {
        let component = state.component(component_id)?;
        let region = state.region(region_id)?;
        if region.owner == component_id {
            return Ok(None);
        }

        let message = format!("{} owned by '{}'", region_id, region.owner);
        let notice = component.violation("permission_denied", operation, required, &message);
        Ok(Some((
            notice,
            DopError::PermissionDenied {
                component: component_id.to_string(),
                operation: format!("{} {}", operation, region_id),
            },
        )))
    }

    fn check_region_access(
        &self,
        state: &RegistryState,
        component_id: &str,
        region_id: RegionId,
        offset: usize,
        len: usize,
        access: RegionAccess,
    ) -> Result<crate::memory::PoolPtr, (Option<AuditEvent>, DopError)> {
        let component = state.components.get(component_id).ok_or((None, DopError::ComponentNotFound(component_id.to_string())))?;
        component.ensure_active().map_err(|e| (None, e))?;
        let region = state.regions.get(&region_id).ok_or((None, DopError::RegionNotFound(region_id.0)))?;

        let (permission, verb) = if access.contains(RegionAccess::WRITE) {
            (PermissionSet::MEMORY_WRITE, "write")
        } else {
            (PermissionSet::MEMORY_READ, "read")
        };

        if !component.config.policy.permits(permission) || !region.verify_permissions(component_id, access) {
            if !region.is_accessible_by(component_id) {
                counter!("polycall_dop_isolation_breaches_total", 1);
            }
            let message = format!("{} access to {} owned by '{}' refused", verb, region_id, region.owner);
            let notice = component.violation("isolation_breach", verb, permission, &message);
            return Err((
                notice,
                DopError::PermissionDenied {
                    component: component_id.to_string(),
                    operation: format!("{} {}", verb, region_id),
                },
            ));
        }

        region.check_bounds(offset, len).map_err(|e| (None, DopError::from(e)))?;
        Ok(region.ptr)
    }
}

impl std::fmt::Debug for DopRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DopRegistry")
            .field("config", &self.config)
            .field("components", &self.component_count())
            .finish()
    }
}

impl Drop for DopRegistry {
    fn drop(&mut self) {
        self.state.get_mut().release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dop::policy::DopSecurityPolicy;
    use crate::security::AuditConfig;
    use polycall_common::ErrorKind;
    use std::time::Duration;

    const KB: usize = 1024;

    fn registry() -> DopRegistry {
        DopRegistry::new(RegistryConfig {
            pool_size: 1024 * KB,
            max_components: 8,
        })
        .expect("Failed to create registry")
    }

    fn audited_registry() -> (DopRegistry, Arc<AuditLog>) {
        let audit = Arc::new(
            AuditLog::new(AuditConfig {
                log_to_console: false,
                ..AuditConfig::default()
            })
            .unwrap(),
        );
        (registry().with_audit(Arc::clone(&audit)), audit)
    }

    fn component(id: &str, policy: DopSecurityPolicy) -> ComponentConfig {
        ComponentConfig::new(id, format!("{} display", id), "python").with_policy(policy)
    }

    struct Echo;

    impl ComponentBehavior for Echo {
        fn validate(&self, method: &str, _args: &[FfiValue]) -> Result<(), String> {
            if method == "forbidden" { Err("method not exposed".into()) } else { Ok(()) }
        }

        fn invoke(&self, method: &str, args: &[FfiValue]) -> Result<FfiValue, String> {
            match method {
                "echo" => Ok(args.first().cloned().unwrap_or_default()),
                "slow" => {
                    std::thread::sleep(Duration::from_millis(30));
                    Ok(FfiValue::Void)
                }
                other => Err(format!("no method '{}'", other)),
            }
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn test_register_and_lookup() {
            let registry = registry();
            let info = registry.component_register(component("payment_service", DopSecurityPolicy::default())).unwrap();
            assert_eq!(info.state, ComponentState::Ready);
            assert_eq!(info.total_memory_allocated, 0);

            assert!(registry.component_find("payment_service").is_some());
            assert_eq!(registry.component_find_by_name("payment_service display").unwrap().component_id, "payment_service");
            assert_eq!(registry.component_ids(), vec!["payment_service".to_string()]);
            assert_eq!(registry.component_count(), 1);
        }

        #[test]
        fn test_duplicate_id_rejected() {
            let registry = registry();
            registry.component_register(component("ads", DopSecurityPolicy::default())).unwrap();
            let err = registry.component_register(component("ads", DopSecurityPolicy::default())).unwrap_err();
            assert!(matches!(err, DopError::DuplicateComponent(_)));
            assert_eq!(err.kind(), ErrorKind::InvalidParameter);
            assert_eq!(registry.component_count(), 1);
        }

        #[test]
        fn test_component_limit() {
            let registry = DopRegistry::new(RegistryConfig {
                pool_size: 64 * KB,
                max_components: 1,
            })
            .unwrap();
            registry.component_register(component("a", DopSecurityPolicy::default())).unwrap();
            assert!(matches!(
                registry.component_register(component("b", DopSecurityPolicy::default())),
                Err(DopError::InvalidState(_))
            ));
        }

        #[test]
        fn test_suspend_and_resume() {
            let registry = registry();
            registry.component_register(component("ads", DopSecurityPolicy::default())).unwrap();
            registry.component_suspend("ads").unwrap();
            assert!(registry.memory_allocate("ads", 64, RegionAccess::READ).is_err());
            assert!(registry.component_suspend("ads").is_err());

            registry.component_resume("ads").unwrap();
            assert!(registry.memory_allocate("ads", 64, RegionAccess::READ).is_ok());
            assert!(registry.component_resume("ads").is_err());
        }

        #[test]
        fn test_unregister_releases_memory() {
            let registry = registry();
            registry.component_register(component("owner", DopSecurityPolicy::default())).unwrap();
            registry.component_register(component("borrower", DopSecurityPolicy::default())).unwrap();
            let kept = registry.memory_allocate("borrower", 128, RegionAccess::READ).unwrap();
            let lent = registry.memory_allocate("owner", 256, RegionAccess::READ).unwrap();
            registry.memory_allocate("owner", 512, RegionAccess::READ).unwrap();
            registry.share_region("owner", lent.id, "borrower").unwrap();
            registry.share_region("borrower", kept.id, "owner").unwrap();

            registry.component_unregister("owner").unwrap();
            assert!(registry.component_find("owner").is_none());
            assert!(registry.region(lent.id).is_none());
            assert_eq!(registry.region(kept.id).unwrap().shared_with, None);
            assert_eq!(registry.pool_stats().used_blocks, 1);
            assert!(matches!(registry.component_unregister("owner"), Err(DopError::ComponentNotFound(_))));
        }

        #[test]
        fn test_destroy_blocks_further_mutation() {
            let registry = registry();
            registry.component_register(component("ads", DopSecurityPolicy::default())).unwrap();
            registry.memory_allocate("ads", 64, RegionAccess::READ).unwrap();

            registry.destroy().unwrap();
            assert!(registry.is_destroyed());
            assert_eq!(registry.component_count(), 0);
            assert_eq!(registry.pool_stats().current, 0);
            assert!(matches!(
                registry.component_register(component("late", DopSecurityPolicy::default())),
                Err(DopError::InvalidState(_))
            ));
            assert!(matches!(registry.destroy(), Err(DopError::InvalidState(_))));
        }
    }

    mod memory_tests {
        use super::*;

        #[test]
        fn test_ceiling_is_an_isolation_breach() {
            let (registry, audit) = audited_registry();
            registry
                .component_register(component("ads", DopSecurityPolicy::default().with_memory_limit(4 * KB)))
                .unwrap();

            registry.memory_allocate("ads", 3 * KB, RegionAccess::READ).unwrap();
            let err = registry.memory_allocate("ads", 2 * KB, RegionAccess::READ).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::IsolationBreach);
            assert_eq!(registry.memory_usage("ads").unwrap(), 3 * KB);

            registry.memory_allocate("ads", KB, RegionAccess::READ).unwrap();
            assert_eq!(registry.memory_usage("ads").unwrap(), 4 * KB);

            let breach = audit.entries().pop().unwrap();
            assert_eq!(breach.action, "isolation_breach");
            assert_eq!(breach.details.as_deref(), Some("component=ads"));
        }

        #[test]
        fn test_free_returns_budget() {
            let registry = registry();
            registry.component_register(component("ads", DopSecurityPolicy::default().with_memory_limit(KB))).unwrap();
            let region = registry.memory_allocate("ads", KB, RegionAccess::READ).unwrap();
            registry.memory_free("ads", region.id).unwrap();
            assert_eq!(registry.memory_usage("ads").unwrap(), 0);
            assert!(matches!(registry.memory_free("ads", region.id), Err(DopError::RegionNotFound(_))));
            registry.memory_allocate("ads", KB, RegionAccess::READ).unwrap();
        }

        #[test]
        fn test_pool_exhaustion_surfaces_as_memory_error() {
            let registry = DopRegistry::new(RegistryConfig {
                pool_size: 4 * KB,
                max_components: 4,
            })
            .unwrap();
            registry.component_register(component("ads", DopSecurityPolicy::default())).unwrap();
            let err = registry.memory_allocate("ads", 8 * KB, RegionAccess::READ).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::OutOfMemory);
            assert_eq!(registry.memory_usage("ads").unwrap(), 0);
        }

        #[test]
        fn test_other_components_cannot_touch_region() {
            let (registry, audit) = audited_registry();
            registry.component_register(component("payment", DopSecurityPolicy::default())).unwrap();
            registry.component_register(component("ads", DopSecurityPolicy::default())).unwrap();
            let region = registry.memory_allocate("payment", 64, RegionAccess::READ | RegionAccess::WRITE).unwrap();
            registry.write_region("payment", region.id, 0, b"card-1234").unwrap();

            assert!(matches!(registry.read_region("ads", region.id, 0, 9), Err(DopError::PermissionDenied { .. })));
            assert!(registry.write_region("ads", region.id, 0, b"x").is_err());
            assert!(registry.memory_free("ads", region.id).is_err());
            assert!(audit.entries().iter().all(|e| e.is_denied()));

            assert_eq!(registry.read_region("payment", region.id, 0, 9).unwrap(), b"card-1234");
        }

        #[test]
        fn test_shared_region_is_readable_by_borrower() {
            let registry = registry();
            registry.component_register(component("payment", DopSecurityPolicy::default())).unwrap();
            registry.component_register(component("audit", DopSecurityPolicy::default())).unwrap();
            registry.component_register(component("ads", DopSecurityPolicy::default())).unwrap();
            let region = registry.memory_allocate("payment", 16, RegionAccess::READ | RegionAccess::WRITE).unwrap();
            registry.write_region("payment", region.id, 0, &[9; 16]).unwrap();

            registry.share_region("payment", region.id, "audit").unwrap();
            assert_eq!(registry.read_region("audit", region.id, 0, 16).unwrap(), vec![9; 16]);

            let err = registry.share_region("payment", region.id, "ads").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidState);

            registry.unshare_region("payment", region.id, "audit").unwrap();
            assert!(registry.read_region("audit", region.id, 0, 1).is_err());
        }

        #[test]
        fn test_non_owner_unshare_and_lock_are_audited() {
            let (registry, audit) = audited_registry();
            registry.component_register(component("payment", DopSecurityPolicy::default())).unwrap();
            registry.component_register(component("audit", DopSecurityPolicy::default())).unwrap();
            registry.component_register(component("ads", DopSecurityPolicy::default())).unwrap();
            let region = registry.memory_allocate("payment", 16, RegionAccess::READ | RegionAccess::WRITE).unwrap();
            registry.share_region("payment", region.id, "audit").unwrap();

            assert!(matches!(registry.unshare_region("ads", region.id, "audit"), Err(DopError::PermissionDenied { .. })));
            assert!(matches!(registry.lock_region("ads", region.id), Err(DopError::PermissionDenied { .. })));

            let denials = audit.entries();
            assert_eq!(denials.len(), 2);
            assert!(denials.iter().all(|e| e.is_denied() && e.action == "permission_denied"));
            assert_eq!(denials[0].function_name, "memory_unshare");
            assert_eq!(denials[1].function_name, "memory_lock");

            assert_eq!(registry.region(region.id).unwrap().shared_with.as_deref(), Some("audit"));
            registry.write_region("payment", region.id, 0, &[1]).unwrap();
        }

        #[test]
        fn test_locked_region_and_bounds() {
            let registry = registry();
            registry.component_register(component("payment", DopSecurityPolicy::default())).unwrap();
            let region = registry.memory_allocate("payment", 32, RegionAccess::READ | RegionAccess::WRITE).unwrap();

            assert!(matches!(
                registry.write_region("payment", region.id, 30, &[1, 2, 3]),
                Err(DopError::Memory(crate::memory::MemoryError::OutOfBounds { .. }))
            ));

            registry.lock_region("payment", region.id).unwrap();
            assert!(registry.write_region("payment", region.id, 0, &[1]).is_err());
            assert_eq!(registry.read_region("payment", region.id, 0, 4).unwrap(), vec![0; 4]);
        }

        #[test]
        fn test_strict_regions_are_secure() {
            let registry = registry();
            registry
                .component_register(component("vault", DopSecurityPolicy::for_level(DopIsolationLevel::Strict)))
                .unwrap();
            let region = registry.memory_allocate("vault", 32, RegionAccess::READ).unwrap();
            assert!(region.flags.contains(RegionFlags::SECURE | RegionFlags::ISOLATED));
        }
    }

    mod policy_tests {
        use super::*;

        #[test]
        fn test_security_validate() {
            let registry = registry();
            let policy = DopSecurityPolicy::for_level(DopIsolationLevel::Standard).deny(PermissionSet::INVOKE_REMOTE);
            registry.component_register(component("ads", policy)).unwrap();

            registry.security_validate("ads", "read").unwrap();
            assert!(matches!(registry.security_validate("ads", "invoke_remote"), Err(DopError::PermissionDenied { .. })));
            assert!(matches!(registry.security_validate("ads", "privileged"), Err(DopError::PermissionDenied { .. })));
            assert!(matches!(registry.security_validate("ads", "teleport"), Err(DopError::InvalidParameter(_))));
            assert!(matches!(registry.security_validate("nobody", "read"), Err(DopError::ComponentNotFound(_))));
        }

        #[test]
        fn test_paranoid_component_is_inert() {
            let registry = registry();
            let policy = DopSecurityPolicy::for_level(DopIsolationLevel::Paranoid).allow(PermissionSet::all());
            let info = registry.component_register(component("sandbox", policy)).unwrap();
            assert!(info.policy.allowed_permissions.is_empty());

            assert!(registry.security_validate("sandbox", "read").is_err());
            assert!(matches!(
                registry.memory_allocate("sandbox", 16, RegionAccess::READ),
                Err(DopError::PermissionDenied { .. })
            ));
        }
    }

    mod invoke_tests {
        use super::*;

        #[test]
        fn test_invoke_behavior() {
            let registry = registry();
            registry
                .component_register_with_behavior(component("echo", DopSecurityPolicy::default()), Arc::new(Echo))
                .unwrap();

            let result = registry.component_invoke("echo", "echo", &[FfiValue::from("ping")]).unwrap();
            assert_eq!(result, FfiValue::from("ping"));
            assert!(matches!(registry.component_invoke("echo", "missing", &[]), Err(DopError::Behavior { .. })));
            assert!(matches!(registry.component_invoke("echo", "forbidden", &[]), Err(DopError::InvalidParameter(_))));
            assert_eq!(registry.component_find("echo").unwrap().state, ComponentState::Ready);
        }

        #[test]
        fn test_invoke_without_behavior_or_permission() {
            let registry = registry();
            registry.component_register(component("plain", DopSecurityPolicy::default())).unwrap();
            assert!(matches!(registry.component_invoke("plain", "echo", &[]), Err(DopError::InvalidState(_))));

            let policy = DopSecurityPolicy::default().deny(PermissionSet::INVOKE_LOCAL);
            registry.component_register_with_behavior(component("locked", policy), Arc::new(Echo)).unwrap();
            assert!(matches!(registry.component_invoke("locked", "echo", &[]), Err(DopError::PermissionDenied { .. })));
        }

        #[test]
        fn test_execution_overrun_moves_component_to_error() {
            let (registry, audit) = audited_registry();
            let policy = DopSecurityPolicy::default().with_execution_limit(1);
            registry.component_register_with_behavior(component("slowpoke", policy), Arc::new(Echo)).unwrap();

            let err = registry.component_invoke("slowpoke", "slow", &[]).unwrap_err();
            assert!(matches!(err, DopError::ExecutionTime { limit_ms: 1, .. }));
            assert_eq!(err.kind(), ErrorKind::IsolationBreach);
            assert_eq!(registry.component_find("slowpoke").unwrap().state, ComponentState::Error);
            assert!(registry.component_invoke("slowpoke", "echo", &[]).is_err());
            assert_eq!(audit.entries().pop().unwrap().action, "isolation_breach");

            registry.component_resume("slowpoke").unwrap();
            assert!(registry.component_invoke("slowpoke", "echo", &[]).is_ok());
        }
    }
}
