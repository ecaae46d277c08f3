//! Approval route templates and the catalog that matches them to documents
use crate::error::ApprovalError;
use crate::types::{AmountRange, Role};
use crate::utils;

/// A named, reusable approval chain template. Routes are configured by an
/// administrator and never mutated by workflow execution; retiring one is
/// done by clearing `is_active`.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Route {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    /// None means the route applies to requesters of any role.
    #[n(2)]
    pub requester_role: Option<Role>,
    #[n(3)]
    pub range: AmountRange,
    #[n(4)]
    pub is_active: bool,
    /// Owned by the route, stored with it, deleted with it.
    #[n(5)]
    pub steps: Vec<RouteStep>,
}

/// One ordered approver-role slot within a route's chain.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct RouteStep {
    #[n(0)]
    pub step_order: u32,
    #[n(1)]
    pub approver_role: Role,
    #[n(2)]
    pub notes: Option<String>,
}

impl Route {
    pub fn new(
        name: impl Into<String>,
        requester_role: Option<Role>,
        range: AmountRange,
    ) -> Result<Self, ApprovalError> {
        Ok(Self {
            id: utils::mint_id(utils::ROUTE_HRP)?,
            name: name.into(),
            requester_role,
            range,
            is_active: true,
            steps: vec![],
        })
    }

    /// Append a step to the chain. Orders are assigned in call order,
    /// keeping the contiguous-from-1 invariant by construction.
    pub fn with_step(mut self, approver_role: Role, notes: Option<&str>) -> Self {
        let step_order = self.steps.len() as u32 + 1;
        self.steps.push(RouteStep {
            step_order,
            approver_role,
            notes: notes.map(str::to_string),
        });
        self
    }

    /// Whether this route's condition admits the given request.
    pub fn admits(&self, role: Role, amount: u64) -> bool {
        self.requester_role.is_none_or(|r| r == role) && self.range.contains(amount)
    }

    /// Whether some (role, amount) pair could match both routes. Two active
    /// routes that intersect make the catalog ambiguous.
    pub fn scope_intersects(&self, other: &Route) -> bool {
        let roles_meet = match (self.requester_role, other.requester_role) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        roles_meet && self.range.overlaps(&other.range)
    }

    pub fn first_step(&self) -> Option<&RouteStep> {
        self.steps.first()
    }

    /// Content hash of the template, recorded on each instance at submit
    /// time so an audit can tell whether the template changed while an
    /// approval was in flight.
    pub fn fingerprint(&self) -> Result<String, ApprovalError> {
        Ok(sha256::digest(utils::to_cbor(self)?))
    }

    fn steps_contiguous(&self) -> bool {
        self.steps
            .iter()
            .enumerate()
            .all(|(i, s)| s.step_order == i as u32 + 1)
    }
}

/// Deterministic route selection: active routes sorted ascending by their
/// lower bound (null as 0), first admitting route wins. The sort is stable,
/// which makes the lowest-`min` rule the documented tie-break; the matcher
/// does not itself enforce uniqueness, the catalog's insert path does.
pub fn select_route(mut routes: Vec<Route>, role: Role, amount: u64) -> Option<Route> {
    routes.retain(|r| r.is_active);
    routes.sort_by_key(|r| r.range.floor());
    routes.into_iter().find(|r| r.admits(role, amount))
}

/// Read-side accessor over configured routes, plus the admin-facing seeding
/// path. Route administration proper (rename, reorder, retire) lives in the
/// external CRUD layer; the catalog only guards what would break execution.
pub struct RouteCatalog {
    tree: sled::Tree,
}

impl RouteCatalog {
    pub fn open(db: &sled::Db) -> Result<Self, ApprovalError> {
        Ok(Self {
            tree: db.open_tree("routes")?,
        })
    }

    /// Store a route, refusing configurations the executor cannot run:
    /// an empty chain, a gapped chain, or an active route whose scope
    /// intersects another active route's.
    pub fn insert(&self, route: &Route) -> Result<(), ApprovalError> {
        if route.steps.is_empty() {
            return Err(ApprovalError::MisconfiguredRoute(route.id.clone()));
        }
        if !route.steps_contiguous() {
            return Err(ApprovalError::Config(format!(
                "route {} step orders must be contiguous from 1",
                route.name
            )));
        }
        if route.is_active {
            for existing in self.list_active()? {
                if existing.id != route.id && route.scope_intersects(&existing) {
                    return Err(ApprovalError::RouteOverlap(format!(
                        "{} and {}",
                        route.name, existing.name
                    )));
                }
            }
        }
        self.tree
            .insert(route.id.as_bytes(), utils::to_cbor(route)?)?;
        Ok(())
    }

    pub fn get(&self, route_id: &str) -> Result<Option<Route>, ApprovalError> {
        match self.tree.get(route_id.as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All active routes with their ordered steps attached.
    pub fn list_active(&self) -> Result<Vec<Route>, ApprovalError> {
        let mut routes = Vec::new();
        for entry in self.tree.iter() {
            let (_, value) = entry?;
            let route: Route = minicbor::decode(&value)?;
            if route.is_active {
                routes.push(route);
            }
        }
        Ok(routes)
    }

    /// Soft-disable or re-enable a route without touching its chain.
    pub fn set_active(&self, route_id: &str, is_active: bool) -> Result<(), ApprovalError> {
        let mut route = self
            .get(route_id)?
            .ok_or_else(|| ApprovalError::RouteNotFound(route_id.to_string()))?;
        route.is_active = is_active;
        self.tree
            .insert(route.id.as_bytes(), utils::to_cbor(&route)?)?;
        Ok(())
    }

    /// Pick exactly one route for the request, or report the misconfiguration.
    pub fn match_route(&self, role: Role, amount: u64) -> Result<Route, ApprovalError> {
        select_route(self.list_active()?, role, amount).ok_or(ApprovalError::NoMatchingRoute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catch_all_route_admits_any_amount() {
        let route = Route::new("catch-all", None, AmountRange::default())
            .unwrap()
            .with_step(Role::Manager, None);

        assert!(route.admits(Role::Sales, 0));
        assert!(route.admits(Role::Director, u64::MAX));
    }

    #[test]
    fn role_scoped_route_refuses_other_roles() {
        let route = Route::new("sales-only", Some(Role::Sales), AmountRange::default())
            .unwrap()
            .with_step(Role::Manager, None);

        assert!(route.admits(Role::Sales, 100));
        assert!(!route.admits(Role::BackOffice, 100));
    }

    #[test]
    fn step_orders_are_contiguous_by_construction() {
        let route = Route::new("chain", None, AmountRange::default())
            .unwrap()
            .with_step(Role::Manager, None)
            .with_step(Role::Director, Some("large deals"))
            .with_step(Role::Executive, None);

        let orders: Vec<u32> = route.steps.iter().map(|s| s.step_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[test]
    fn fingerprint_changes_with_the_chain() {
        let base = Route::new("r", None, AmountRange::default())
            .unwrap()
            .with_step(Role::Manager, None);
        let mut extended = base.clone();
        extended = extended.with_step(Role::Director, None);

        assert_ne!(
            base.fingerprint().unwrap(),
            extended.fingerprint().unwrap()
        );
    }
}
