//! Service node and its per-schema capacity allocator.
//!
//! A `Service` holds per-schema incoming/outgoing flow, a capacity band,
//! current capacity, allocated capacity, and the per-cycle backpressure
//! bookkeeping (`visited`, `reduction_factor`). The allocator and
//! `apply_backpressure` are methods here because they only ever touch
//! one service's own state.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Normal,
    Overloaded,
    Underutilized,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Normal => "NORMAL",
            ServiceStatus::Overloaded => "OVERLOADED",
            ServiceStatus::Underutilized => "UNDERUTILIZED",
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    NoAction,
    Speedup,
    Slowdown,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::NoAction => "NO ACTION",
            ServiceAction::Speedup => "SPEEDUP",
            ServiceAction::Slowdown => "SLOWDOWN",
        }
    }
}

impl std::fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityBand {
    pub min: f64,
    pub max: f64,
}

impl CapacityBand {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

#[derive(Debug, Clone)]
pub struct Service {
    name: String,
    /// Insertion order from configuration; every per-schema map below is
    /// keyed by entries from this list and iterated through it, never
    /// through hashmap iteration order, so results stay deterministic.
    supported_schemas: Vec<String>,
    /// Explicit admission-point flag; never inferred from `name`.
    pub is_admission_point: bool,

    capacity_band: HashMap<String, CapacityBand>,
    current_capacity: HashMap<String, f64>,
    incoming_flow: HashMap<String, f64>,
    outgoing_flow: HashMap<String, f64>,
    allocated_capacity: HashMap<String, f64>,
    visited: HashMap<String, bool>,
    reduction_factor: HashMap<String, f64>,

    pub status: ServiceStatus,
    pub action: ServiceAction,
}

impl Service {
    pub fn new(
        name: impl Into<String>,
        schemas: impl IntoIterator<Item = (String, CapacityBand)>,
        is_admission_point: bool,
    ) -> Self {
        let mut supported_schemas = Vec::new();
        let mut capacity_band = HashMap::new();
        let mut current_capacity = HashMap::new();
        let mut incoming_flow = HashMap::new();
        let mut outgoing_flow = HashMap::new();
        let mut visited = HashMap::new();
        let mut reduction_factor = HashMap::new();

        for (schema, band) in schemas {
            current_capacity.insert(schema.clone(), band.max);
            capacity_band.insert(schema.clone(), band);
            incoming_flow.insert(schema.clone(), 0.0);
            outgoing_flow.insert(schema.clone(), 0.0);
            visited.insert(schema.clone(), false);
            reduction_factor.insert(schema.clone(), 0.0);
            supported_schemas.push(schema);
        }

        let mut service = Self {
            name: name.into(),
            supported_schemas,
            is_admission_point,
            capacity_band,
            current_capacity,
            incoming_flow,
            outgoing_flow,
            allocated_capacity: HashMap::new(),
            visited,
            reduction_factor,
            status: ServiceStatus::Normal,
            action: ServiceAction::NoAction,
        };
        service.allocated_capacity = service.allocate_capacity();
        service
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supported_schemas(&self) -> &[String] {
        &self.supported_schemas
    }

    pub fn supports(&self, schema: &str) -> bool {
        self.capacity_band.contains_key(schema)
    }

    pub fn capacity_band(&self, schema: &str) -> CapacityBand {
        self.capacity_band[schema]
    }

    pub fn current_capacity(&self, schema: &str) -> f64 {
        self.current_capacity[schema]
    }

    pub fn incoming_flow(&self, schema: &str) -> f64 {
        self.incoming_flow[schema]
    }

    pub fn outgoing_flow(&self, schema: &str) -> f64 {
        self.outgoing_flow[schema]
    }

    pub fn allocated_capacity(&self, schema: &str) -> f64 {
        self.allocated_capacity[schema]
    }

    /// Installs the provided incoming/outgoing rates for a cycle. The
    /// schema must already be supported; this is a programmer error
    /// otherwise, since configuration is validated once at construction.
    pub fn install_flow(&mut self, schema: &str, incoming: f64, outgoing: f64) {
        debug_assert!(self.supports(schema), "unsupported schema '{schema}' installed on '{}'", self.name);
        self.incoming_flow.insert(schema.to_string(), incoming);
        self.outgoing_flow.insert(schema.to_string(), outgoing);
    }

    /// Adds `delta` to a schema's incoming flow, used by the flow
    /// propagator when pushing a downstream share.
    pub fn add_incoming(&mut self, schema: &str, delta: f64) {
        debug_assert!(self.supports(schema));
        *self.incoming_flow.get_mut(schema).unwrap() += delta;
    }

    /// Partitions current capacity across schemas so demand is met
    /// where possible, with leftover shared proportionally to unmet
    /// demand. Pure: does not mutate `self.allocated_capacity`.
    pub fn allocate_capacity(&self) -> HashMap<String, f64> {
        let mut allocated = HashMap::with_capacity(self.supported_schemas.len());
        let total_cap: f64 = self
            .supported_schemas
            .iter()
            .map(|s| self.current_capacity[s])
            .sum();
        let mut remaining = total_cap;

        for s in &self.supported_schemas {
            let needed = self.incoming_flow[s].min(self.current_capacity[s]);
            allocated.insert(s.clone(), needed);
            remaining -= needed;
        }

        if remaining > 0.0 {
            let total_unfulfilled: f64 = self
                .supported_schemas
                .iter()
                .map(|s| (self.incoming_flow[s] - allocated[s]).max(0.0))
                .sum();
            if total_unfulfilled > 0.0 {
                for s in &self.supported_schemas {
                    let unfulfilled = (self.incoming_flow[s] - allocated[s]).max(0.0);
                    // Integer-truncation-equivalent: floor(), intentional
                    // and deterministic.
                    let share = (remaining * (unfulfilled / total_unfulfilled)).floor();
                    *allocated.get_mut(s).unwrap() += share;
                    remaining -= share;
                }
            }
        }

        allocated
    }

    /// Resets the allocation baseline, then if overall demand exceeds
    /// overall allocation, shifts spare capacity from underused schemas
    /// to overloaded ones, highest-demand schema first (ties broken by
    /// schema name).
    pub fn reallocate_capacity_across_schemas(&mut self) {
        self.allocated_capacity = self.allocate_capacity();

        let total_incoming: f64 = self
            .supported_schemas
            .iter()
            .map(|s| self.incoming_flow[s])
            .sum();
        let total_allocated: f64 = self
            .supported_schemas
            .iter()
            .map(|s| self.allocated_capacity[s])
            .sum();
        if total_incoming <= total_allocated {
            return;
        }

        let mut sorted = self.supported_schemas.clone();
        sorted.sort_by(|a, b| {
            self.incoming_flow[b]
                .partial_cmp(&self.incoming_flow[a])
                .expect("flow rates must not be NaN")
                .then_with(|| a.cmp(b))
        });

        let mut total_excess: f64 = self
            .supported_schemas
            .iter()
            .map(|s| (self.allocated_capacity[s] - self.incoming_flow[s]).max(0.0))
            .sum();

        for s in &sorted {
            if self.incoming_flow[s] > self.allocated_capacity[s] {
                let needed = self.incoming_flow[s] - self.allocated_capacity[s];
                let reallocated = needed.min(total_excess);
                *self.allocated_capacity.get_mut(s).unwrap() += reallocated;
                total_excess -= reallocated;
            }
        }

        if total_excess > 0.0 {
            let total_deficit: f64 = self
                .supported_schemas
                .iter()
                .map(|s| (self.incoming_flow[s] - self.allocated_capacity[s]).max(0.0))
                .sum();
            for s in &sorted {
                if self.incoming_flow[s] > self.allocated_capacity[s] {
                    let deficit = self.incoming_flow[s] - self.allocated_capacity[s];
                    let share = if total_deficit > 0.0 {
                        deficit / total_deficit
                    } else {
                        0.0
                    };
                    let headroom = self.current_capacity[s] - self.allocated_capacity[s];
                    let additional = (total_excess * share).floor().min(headroom);
                    *self.allocated_capacity.get_mut(s).unwrap() += additional;
                }
            }
        }
    }

    /// "max-seen-wins" backpressure application. Returns the
    /// actual reduction ratio applied, or 0 if this call was rejected
    /// because a larger (or equal) reduction was already recorded this
    /// iteration.
    pub fn apply_backpressure(&mut self, schema: &str, reduction_percentage: f64) -> f64 {
        let already_visited = self.visited[schema];
        let stored_factor = self.reduction_factor[schema];
        if already_visited && reduction_percentage <= stored_factor {
            return 0.0;
        }

        self.visited.insert(schema.to_string(), true);
        self.reduction_factor
            .insert(schema.to_string(), crate::util::snap_ratio(reduction_percentage));

        let original = self.incoming_flow[schema];
        let new_flow = (original * (1.0 - reduction_percentage)).max(0.0);
        let actual = if original > 0.0 {
            (original - new_flow) / original
        } else {
            0.0
        };
        self.incoming_flow.insert(schema.to_string(), new_flow);
        actual
    }

    pub fn reset_backpressure_state(&mut self) {
        for s in &self.supported_schemas {
            self.visited.insert(s.clone(), false);
            self.reduction_factor.insert(s.clone(), 0.0);
        }
    }

    /// Recomputes allocation then pushes `outgoing := min(incoming, allocated)`
    /// for every supported schema.
    pub fn process_flow(&mut self) {
        self.reallocate_capacity_across_schemas();
        for s in self.supported_schemas.clone() {
            let incoming = self.incoming_flow[&s];
            let allocated = self.allocated_capacity[&s];
            self.outgoing_flow.insert(s, incoming.min(allocated));
        }
    }

    /// `is_overloaded` — any schema's incoming flow exceeds its
    /// current capacity. A schema pinned at zero capacity counts as
    /// overloaded outright: backpressure can drive its incoming flow to
    /// zero too, at which point `incoming > capacity` no longer holds,
    /// but a capacity of zero is still unallocatable traffic-wise, so
    /// the node stays flagged rather than flipping back to NORMAL.
    pub fn is_overloaded(&self) -> bool {
        self.supported_schemas
            .iter()
            .any(|s| self.current_capacity[s] <= 0.0 || self.incoming_flow[s] > self.current_capacity[s])
    }

    /// `is_underutilized` — every schema's incoming flow is below
    /// half its current capacity.
    pub fn is_underutilized(&self) -> bool {
        self.supported_schemas
            .iter()
            .all(|s| self.incoming_flow[s] < 0.5 * self.current_capacity[s])
    }

    /// Internal invariants that must hold after any pass touching this
    /// service. A violation is treated as a
    /// bug, not a reportable condition, so it aborts the process in all
    /// profiles rather than being folded into `Warning`.
    pub fn assert_invariants(&self) {
        for s in &self.supported_schemas {
            let allocated = self.allocated_capacity[s];
            let current = self.current_capacity[s];
            assert!(
                allocated >= -crate::util::FLOW_EPSILON && allocated <= current + crate::util::FLOW_EPSILON,
                "invariant violated: {}::{s} allocated={allocated} current_capacity={current}",
                self.name
            );
            let outgoing = self.outgoing_flow[s];
            let incoming = self.incoming_flow[s];
            let bound = incoming.min(allocated);
            assert!(
                outgoing <= bound + crate::util::FLOW_EPSILON,
                "invariant violated: {}::{s} outgoing={outgoing} exceeds min(incoming={incoming}, allocated={allocated})",
                self.name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_with(schemas: &[(&str, f64, f64, f64)]) -> Service {
        // (name, min, max, incoming)
        let mut svc = Service::new(
            "svc",
            schemas
                .iter()
                .map(|(n, min, max, _)| ((*n).to_string(), CapacityBand::new(*min, *max))),
            false,
        );
        for (n, _, _, incoming) in schemas {
            svc.install_flow(n, *incoming, 0.0);
        }
        svc
    }

    #[test]
    fn allocate_capacity_meets_demand_when_possible() {
        let svc = service_with(&[("S1", 60.0, 80.0, 50.0)]);
        let allocated = svc.allocate_capacity();
        assert_eq!(allocated["S1"], 50.0);
    }

    #[test]
    fn allocate_capacity_distributes_leftover_proportionally() {
        // Two schemas, one over-demanding, one under: leftover from S2
        // should flow to S1's unmet demand.
        let svc = service_with(&[("S1", 0.0, 50.0, 80.0), ("S2", 0.0, 50.0, 10.0)]);
        let allocated = svc.allocate_capacity();
        // needed: S1=50 (capped), S2=10; remaining = 100-60=40
        // total_unfulfilled = (80-50)+(10-10)=30 -> all goes to S1
        assert_eq!(allocated["S1"], 50.0 + 40.0);
        assert_eq!(allocated["S2"], 10.0);
    }

    #[test]
    fn allocate_capacity_truncates_remainder() {
        // remaining=1, split 1/3 vs 2/3 -> floor(0.333)=0, floor(0.666)=0
        // so 1 unit of capacity is permanently unallocated.
        let svc = service_with(&[("S1", 0.0, 10.0, 11.0), ("S2", 0.0, 1.0, 2.0)]);
        let allocated = svc.allocate_capacity();
        let total: f64 = allocated.values().sum();
        assert!(total < 11.0); // capacity is 11 total but truncation loses some
    }

    #[test]
    fn apply_backpressure_max_seen_wins() {
        let mut svc = service_with(&[("S1", 0.0, 100.0, 100.0)]);
        let a1 = svc.apply_backpressure("S1", 0.2);
        assert!((a1 - 0.2).abs() < 1e-9);
        assert_eq!(svc.incoming_flow("S1"), 80.0);

        // Smaller reduction than already recorded: rejected.
        let a2 = svc.apply_backpressure("S1", 0.1);
        assert_eq!(a2, 0.0);
        assert_eq!(svc.incoming_flow("S1"), 80.0);

        // Larger reduction: accepted, applied against the already-reduced flow.
        let a3 = svc.apply_backpressure("S1", 0.5);
        assert!((a3 - 0.5).abs() < 1e-9);
        assert_eq!(svc.incoming_flow("S1"), 40.0);
    }

    #[test]
    fn apply_backpressure_zero_original_flow_returns_zero() {
        let mut svc = service_with(&[("S1", 0.0, 100.0, 0.0)]);
        let actual = svc.apply_backpressure("S1", 0.5);
        assert_eq!(actual, 0.0);
        assert_eq!(svc.incoming_flow("S1"), 0.0);
    }

    #[test]
    fn is_overloaded_and_underutilized() {
        let svc = service_with(&[("S1", 0.0, 100.0, 120.0)]);
        assert!(svc.is_overloaded());
        assert!(!svc.is_underutilized());

        let svc2 = service_with(&[("S1", 0.0, 100.0, 10.0)]);
        assert!(!svc2.is_overloaded());
        assert!(svc2.is_underutilized());
    }
}
