//! # Identity Reconciliation
//!
//! Converges the application registration, its service principal and the role
//! grant to the requested state, creating only what is missing.
//!
//! ## State machine
//!
//! ```text
//! Absent --create--> PendingPropagation --readiness probe--> Ready
//! ```
//!
//! Objects found by lookup are `Ready` immediately. Freshly created objects are
//! only acted on once a read-after-create probe sees them, because the
//! directory replicates asynchronously and a principal that cannot be read yet
//! cannot be granted a role either.

use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::provider::{ApplicationIdentity, IdentityProvider, ProviderError, ServicePrincipal};
use crate::scope::AuthScope;
use std::fmt;
use std::future::Future;
use tracing::{debug, info, info_span, Instrument};

/// Whether an object was found or created by this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Existing,
    Created,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Existing => f.write_str("reused"),
            Provenance::Created => f.write_str("created"),
        }
    }
}

/// A reconciled object and how it came to exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled<T> {
    pub value: T,
    pub provenance: Provenance,
}

impl<T> Reconciled<T> {
    fn existing(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::Existing,
        }
    }

    fn created(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::Created,
        }
    }

    #[must_use]
    pub fn was_created(&self) -> bool {
        self.provenance == Provenance::Created
    }
}

/// Result of reconciling the role grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleOutcome {
    Created,
    AlreadyPresent,
}

impl fmt::Display for RoleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleOutcome::Created => f.write_str("created"),
            RoleOutcome::AlreadyPresent => f.write_str("already present"),
        }
    }
}

/// Wait until `probe` reports the object named `what` as readable
///
/// Sleeps the configured settle delay, then probes with Fibonacci backoff
/// between attempts. A not-found error from the probe counts as "not yet".
///
/// # Errors
/// Returns [`SetupError::NotReady`] when attempts are exhausted, or the first
/// probe error other than not-found
pub async fn await_readiness<F, Fut>(
    config: &SetupConfig,
    what: &str,
    mut probe: F,
) -> Result<(), SetupError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, ProviderError>>,
{
    let attempts = config.readiness_max_attempts.max(1);
    let mut backoff = config.readiness_backoff();

    let settle = config.settle_delay();
    if !settle.is_zero() {
        debug!("Waiting {:?} for {} to propagate", settle, what);
        tokio::time::sleep(settle).await;
    }

    for attempt in 1..=attempts {
        match probe().await {
            Ok(true) => {
                debug!("{} readable after {} attempt(s)", what, attempt);
                return Ok(());
            }
            Ok(false) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        if attempt < attempts {
            let delay = backoff.next_backoff();
            debug!(
                "{} not readable yet (attempt {}/{}), retrying in {:?}",
                what, attempt, attempts, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    Err(SetupError::NotReady {
        what: what.to_string(),
        attempts,
    })
}

/// Find the application named `display_name`, creating it when absent
///
/// # Errors
/// Returns [`SetupError::AmbiguousApplication`] when several applications share
/// the name, or any lookup/create failure
pub async fn ensure_application(
    identity: &dyn IdentityProvider,
    config: &SetupConfig,
    display_name: &str,
) -> Result<Reconciled<ApplicationIdentity>, SetupError> {
    let span = info_span!("identity.application", app.name = display_name);
    async move {
        let mut found = identity.find_applications(display_name).await?;
        match found.len() {
            0 => {
                let app = identity.create_application(display_name).await?;
                info!("Created application '{}' ({})", display_name, app.client_id);
                let client_id = app.client_id.as_str();
                await_readiness(config, &format!("application {client_id}"), move || {
                    identity.application_exists(client_id)
                })
                .await?;
                Ok(Reconciled::created(app))
            }
            1 => {
                let app = found.remove(0);
                info!("Reusing application '{}' ({})", display_name, app.client_id);
                Ok(Reconciled::existing(app))
            }
            count => Err(SetupError::AmbiguousApplication {
                name: display_name.to_string(),
                count,
            }),
        }
    }
    .instrument(span)
    .await
}

/// Find the service principal backing `app`, creating it when absent
///
/// # Errors
/// Returns any lookup/create failure, or [`SetupError::NotReady`]
pub async fn ensure_service_principal(
    identity: &dyn IdentityProvider,
    config: &SetupConfig,
    app: &ApplicationIdentity,
) -> Result<Reconciled<ServicePrincipal>, SetupError> {
    let client_id = app.client_id.as_str();
    let span = info_span!("identity.service_principal", app.client_id = client_id);
    async move {
        if let Some(principal) = identity.find_service_principal(client_id).await? {
            info!("Reusing service principal {}", principal.principal_id);
            return Ok(Reconciled::existing(principal));
        }

        let principal = identity.create_service_principal(client_id).await?;
        info!("Created service principal {}", principal.principal_id);
        await_readiness(
            config,
            &format!("service principal for {client_id}"),
            move || async move {
                identity
                    .find_service_principal(client_id)
                    .await
                    .map(|p| p.is_some())
            },
        )
        .await?;
        Ok(Reconciled::created(principal))
    }
    .instrument(span)
    .await
}

/// Grant `role` at `scope` to the principal unless it already holds it
///
/// A principal created by this run cannot hold any grant yet, so the create is
/// issued directly. For an existing principal the grants are listed first and
/// only an exact scope match (case-insensitive) counts. A conflict from the
/// create is success in both cases.
///
/// # Errors
/// Returns any list failure, or a create failure other than a conflict
pub async fn ensure_role_assignment(
    identity: &dyn IdentityProvider,
    principal: &Reconciled<ServicePrincipal>,
    role: &str,
    scope: &AuthScope,
) -> Result<RoleOutcome, SetupError> {
    let principal_id = principal.value.principal_id.as_str();

    if !principal.was_created() {
        let assignments = identity
            .list_role_assignments(principal_id, role, &scope.path)
            .await?;
        let matching = assignments
            .iter()
            .filter(|a| a.scope.eq_ignore_ascii_case(&scope.path))
            .count();
        if matching > 0 {
            info!("Role '{}' already assigned at {}", role, scope.path);
            return Ok(RoleOutcome::AlreadyPresent);
        }
    }

    match identity
        .create_role_assignment(principal_id, role, &scope.path)
        .await
    {
        Ok(_) => Ok(RoleOutcome::Created),
        Err(e) if e.is_conflict() => {
            debug!("Role assignment already exists: {}", e);
            Ok(RoleOutcome::AlreadyPresent)
        }
        Err(e) => Err(e.into()),
    }
}
