//! Final per-service status/action classification.
//!
//! `status` and `action` are independently meaningful fields but must
//! always agree (overloaded implies slowdown, underutilized implies
//! speedup). One function sets both together from the same snapshot of
//! overload/underutilization, so they can never disagree.

use crate::pipeline::Pipeline;
use crate::service::{ServiceAction, ServiceStatus};

impl Pipeline {
    /// Sets `status` and `action` for one service from its current
    /// flow/capacity state. Overload takes priority over underutilization
    /// when (due to floating point slack) both could technically hold.
    pub fn assess_service_status(&mut self, name: &str) {
        let service = self.service_mut(name).expect("caller passes a known service name");
        if service.is_overloaded() {
            service.status = ServiceStatus::Overloaded;
            service.action = ServiceAction::Slowdown;
        } else if service.is_underutilized() {
            service.status = ServiceStatus::Underutilized;
            service.action = ServiceAction::Speedup;
        } else {
            service.status = ServiceStatus::Normal;
            service.action = ServiceAction::NoAction;
        }
    }

    /// Runs `assess_service_status` over every service, in the
    /// deterministic service order.
    pub fn assess_all_service_statuses(&mut self) {
        for name in self.service_order().to_vec() {
            self.assess_service_status(&name);
        }
    }
}
