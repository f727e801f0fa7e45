use chrono::Duration;
use clap::Args;
use std::sync::Arc;

use listing_portal::access::RequestAccessPayload;
use listing_portal::auth::{CredentialVerifier, PasswordHasher, Provisioning};
use listing_portal::domain::{ActionKind, Identity, PropertyId, RequestStatus, Role};
use listing_portal::error::{AppError, ServiceError};
use listing_portal::portal::Portal;
use listing_portal::properties::PropertyPayload;
use listing_portal::store::{InMemoryStore, PortalStore};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Reject the agent's request instead of approving it.
    #[arg(long)]
    pub(crate) reject: bool,
    /// Number of audit entries to print at the end.
    #[arg(long, default_value_t = 10)]
    pub(crate) audit_entries: usize,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            reject: false,
            audit_entries: 10,
        }
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let portal = Portal::new(
        Arc::new(InMemoryStore::new()),
        CredentialVerifier::new("listing-portal-demo", Duration::hours(1)),
        PasswordHasher::new(4),
    );
    let transcript = walkthrough(&portal, &args).await?;
    for line in transcript {
        println!("{line}");
    }
    Ok(())
}

/// Runs the access request workflow and returns a printable transcript.
pub(crate) async fn walkthrough<S>(
    portal: &Portal<S>,
    args: &DemoArgs,
) -> Result<Vec<String>, ServiceError>
where
    S: PortalStore + 'static,
{
    let mut out = vec!["Listing portal access workflow demo".to_string()];

    let admin = provision(portal, "Portal Admin", "admin@demo.test", Role::Admin).await?;
    let agent = provision(portal, "Yasmine", "yasmine@demo.test", Role::Agent).await?;
    out.push(format!("Provisioned admin #{} and agent #{}", admin.id, agent.id));

    let listing = portal
        .properties()
        .create(&admin, demo_listing("Harbour view apartment", None))
        .await?;
    out.push(format!("Admin listed property #{} ({})", listing.id, listing.title));

    match portal
        .properties()
        .update(&agent, listing.id, demo_listing("Harbour view, new photos", None))
        .await
    {
        Err(ServiceError::Forbidden(reason)) => {
            out.push(format!("Agent edit before approval: denied ({reason})"))
        }
        Ok(_) => out.push("Agent edit before approval: unexpectedly allowed".to_string()),
        Err(other) => return Err(other),
    }

    let request = portal
        .requests()
        .create(
            &agent,
            RequestAccessPayload {
                action: Some(ActionKind::Edit.as_str().to_string()),
                property_id: Some(listing.id.0),
                justification: Some("Owner sent a new photo set".to_string()),
            },
        )
        .await?;
    out.push(format!(
        "Agent filed request #{}: {} on property #{} ({})",
        request.id,
        request.action,
        listing.id,
        request.status.as_str()
    ));

    let decision = if args.reject {
        RequestStatus::Rejected
    } else {
        RequestStatus::Approved
    };
    let resolved = portal.requests().resolve(&admin, request.id, decision).await?;
    out.push(format!(
        "Admin resolved request #{} as {}",
        resolved.id,
        resolved.status.as_str()
    ));

    let evaluator = portal.properties().permissions();
    for (label, target) in [
        ("this property", Some(listing.id)),
        ("another property", Some(PropertyId(listing.id.0 + 1))),
    ] {
        let allowed = evaluator
            .can_perform(Some(&agent), ActionKind::Edit, target)
            .await;
        out.push(format!(
            "  can edit {label}: {}",
            if allowed { "yes" } else { "no" }
        ));
    }

    match portal
        .properties()
        .update(
            &agent,
            listing.id,
            demo_listing(
                "Harbour view, new photos",
                Some(vec![
                    "https://images.demo.test/harbour/terrace.jpg".to_string(),
                    "https://images.demo.test/harbour/living.jpg".to_string(),
                ]),
            ),
        )
        .await
    {
        Ok(updated) => out.push(format!(
            "Agent updated property #{}: {}",
            updated.id, updated.title
        )),
        Err(ServiceError::Forbidden(reason)) => {
            out.push(format!("Agent edit after decision: denied ({reason})"))
        }
        Err(other) => return Err(other),
    }

    let entries = portal.auth().list_audit(&admin, args.audit_entries).await?;
    out.push("Audit trail (newest first):".to_string());
    for entry in entries {
        out.push(format!(
            "  #{} actor={} {} {} {}",
            entry.id,
            entry.actor_id,
            entry.verb,
            entry.entity_kind,
            entry
                .entity_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string())
        ));
    }

    Ok(out)
}

async fn provision<S>(
    portal: &Portal<S>,
    name: &str,
    email: &str,
    role: Role,
) -> Result<Identity, ServiceError>
where
    S: PortalStore + 'static,
{
    portal
        .auth()
        .provision(Provisioning {
            name: name.to_string(),
            email: email.to_string(),
            password: "demo-password".to_string(),
            role,
        })
        .await
}

fn demo_listing(title: &str, images: Option<Vec<String>>) -> PropertyPayload {
    PropertyPayload {
        title: Some(title.to_string()),
        description: Some("Three rooms facing the marina".to_string()),
        kind: Some("sale".to_string()),
        price: Some(410_000.0),
        surface: Some(124.0),
        address: Some("2 Quai du Port".to_string()),
        city: Some("Monastir".to_string()),
        status: None,
        agent_id: None,
        images: images.unwrap_or_default(),
    }
}
