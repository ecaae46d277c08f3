//! End-to-end walk-through: seed routes and users, draft a quote, then
//! drive it through a two-step approval chain.
//!
//! Run with `cargo run --example quickstart`.
use std::sync::Arc;

use approval_flow::config;
use approval_flow::directory::UserRecord;
use approval_flow::document::Document;
use approval_flow::notify::LogNotifier;
use approval_flow::service::ApprovalService;
use approval_flow::types::{DocumentKind, Role};

const ROUTES: &str = r#"
[[route]]
name = "standard"
max_amount = 500000

[[route.step]]
approver_role = "manager"

[[route]]
name = "large-deal"
min_amount = 500001

[[route.step]]
approver_role = "manager"

[[route.step]]
approver_role = "director"
notes = "board visibility above the standard band"
"#;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let dir = tempfile::tempdir()?;
    let db = Arc::new(sled::open(dir.path().join("quickstart.db"))?);
    let service = ApprovalService::new(db)?.with_notifier(Arc::new(LogNotifier));

    config::seed_catalog(service.routes(), ROUTES)?;

    let sales = UserRecord::new("Sato", Role::Sales)?;
    let manager = UserRecord::new("Tanaka", Role::Manager)?;
    let director = UserRecord::new("Suzuki", Role::Director)?;
    service.users().insert(&sales)?;
    service.users().insert(&manager)?;
    service.users().insert(&director)?;

    let quote = Document::draft(DocumentKind::Quote, 1_000_000, &sales.id)?;
    service.documents().insert(&quote)?;

    let instance = service.submit(&quote.id, &sales.id)?;
    println!("submitted: {} steps on route {}", instance.steps.len(), instance.route_id);

    let decision = service.approve(&quote.id, &manager.id)?;
    println!("manager approved, next up: {:?}", decision.next_approver_role);

    let decision = service.approve(&quote.id, &director.id)?;
    println!("director approved, next up: {:?}", decision.next_approver_role);

    let doc = service.documents().require(&quote.id)?;
    println!("final document status: {:?}", doc.approval_status);

    Ok(())
}
