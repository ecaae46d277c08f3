//! Route definitions from TOML.
//!
//! Administrators describe approval chains in a config file; loading goes
//! through the catalog's validating insert, so a file with an empty chain
//! or overlapping active routes fails to load instead of producing a
//! catalog the matcher would resolve arbitrarily.
//!
//! ```toml
//! [[route]]
//! name = "standard"
//! max_amount = 500000
//!
//! [[route.step]]
//! approver_role = "manager"
//! ```
//!
//! Step order is the order of appearance in the file.
use serde::Deserialize;

use crate::error::ApprovalError;
use crate::route::{Route, RouteCatalog};
use crate::types::{AmountRange, Role};

#[derive(Deserialize, Debug)]
pub struct RouteFile {
    #[serde(default, rename = "route")]
    pub routes: Vec<RouteDef>,
}

#[derive(Deserialize, Debug)]
pub struct RouteDef {
    pub name: String,
    #[serde(default)]
    pub requester_role: Option<Role>,
    #[serde(default)]
    pub min_amount: Option<u64>,
    #[serde(default)]
    pub max_amount: Option<u64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(rename = "step")]
    pub steps: Vec<StepDef>,
}

#[derive(Deserialize, Debug)]
pub struct StepDef {
    pub approver_role: Role,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_active() -> bool {
    true
}

impl RouteFile {
    pub fn parse(text: &str) -> Result<Self, ApprovalError> {
        toml::from_str(text).map_err(|e| ApprovalError::Config(e.to_string()))
    }
}

impl RouteDef {
    fn into_route(self) -> Result<Route, ApprovalError> {
        let mut route = Route::new(
            self.name,
            self.requester_role,
            AmountRange::new(self.min_amount, self.max_amount),
        )?;
        route.is_active = self.is_active;
        for step in self.steps {
            route = route.with_step(step.approver_role, step.notes.as_deref());
        }
        Ok(route)
    }
}

/// Parse `text` and seed every defined route into the catalog. Returns the
/// stored routes in file order. Any validation failure aborts the load.
pub fn seed_catalog(catalog: &RouteCatalog, text: &str) -> Result<Vec<Route>, ApprovalError> {
    let file = RouteFile::parse(text)?;
    let mut routes = Vec::with_capacity(file.routes.len());
    for def in file.routes {
        let route = def.into_route()?;
        catalog.insert(&route)?;
        routes.push(route);
    }
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_roles_and_bounds() {
        let file = RouteFile::parse(
            r#"
            [[route]]
            name = "standard"
            max_amount = 500000

            [[route.step]]
            approver_role = "manager"

            [[route]]
            name = "large-deal"
            min_amount = 500001
            requester_role = "sales"

            [[route.step]]
            approver_role = "manager"

            [[route.step]]
            approver_role = "director"
            notes = "board visibility"
            "#,
        )
        .unwrap();

        assert_eq!(file.routes.len(), 2);
        assert_eq!(file.routes[0].max_amount, Some(500_000));
        assert_eq!(file.routes[1].requester_role, Some(Role::Sales));
        assert_eq!(file.routes[1].steps[1].approver_role, Role::Director);
    }

    #[test]
    fn missing_steps_fail_to_parse() {
        assert!(RouteFile::parse("[[route]]\nname = \"empty\"\n").is_err());
    }
}
