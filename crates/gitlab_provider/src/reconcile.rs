//! Create-or-update-or-noop reconciliation, shared by every mutable resource.
//!
//! A resource describes how to fetch, create, merge and update itself through
//! [`Reconcilable`]; [`reconcile`] runs the same decision procedure for all
//! of them:
//!
//! 1. fetch the current object by its natural key
//! 2. `NotFound` creates it; any other error is returned unchanged
//! 3. otherwise the desired object (the declared fields merged onto the
//!    actual object) is compared with the actual one by spec projection
//! 4. equal specs are a no-op; divergent specs run the resource's update path
//!
//! Callers sharing one wrapper between tasks must serialize `set` and
//! `reconcile` themselves; nothing here takes a lock.

use std::fmt::Display;
use std::future::Future;

use async_trait::async_trait;

use crate::errors::{Result, short_error_message};
use crate::projection::SpecProjection;

/// Outcome of a reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled<T> {
    /// The resource did not exist and was created.
    Created(T),
    /// The resource existed with a different spec and was updated or recreated.
    Updated(T),
    /// The resource already matched.
    Unchanged(T),
}

impl<T> Reconciled<T> {
    /// Whether any mutating call was made.
    pub fn action_taken(&self) -> bool {
        !matches!(self, Reconciled::Unchanged(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Reconciled::Created(t) | Reconciled::Updated(t) | Reconciled::Unchanged(t) => t,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Reconciled::Created(t) | Reconciled::Updated(t) | Reconciled::Unchanged(t) => t,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reconciled<U> {
        match self {
            Reconciled::Created(t) => Reconciled::Created(f(t)),
            Reconciled::Updated(t) => Reconciled::Updated(f(t)),
            Reconciled::Unchanged(t) => Reconciled::Unchanged(f(t)),
        }
    }

    pub fn try_map<U>(self, f: impl FnOnce(T) -> Result<U>) -> Result<Reconciled<U>> {
        Ok(match self {
            Reconciled::Created(t) => Reconciled::Created(f(t)?),
            Reconciled::Updated(t) => Reconciled::Updated(f(t)?),
            Reconciled::Unchanged(t) => Reconciled::Unchanged(f(t)?),
        })
    }
}

/// A resource whose remote state can be driven toward a declared state.
#[async_trait]
pub trait Reconcilable: Send + Sync {
    type Object: SpecProjection + Clone + Send + Sync;

    /// Human-readable identity for logs, e.g. `project acme/demo`.
    fn describe(&self) -> String;

    /// Fetch the current object by natural key.
    async fn fetch(&self) -> Result<Self::Object>;

    /// Create the object from the declared state.
    async fn create(&self) -> Result<Self::Object>;

    /// The actual object with the declared fields applied.
    fn desired(&self, actual: &Self::Object) -> Self::Object;

    /// Bring `actual` to `desired`, in place or by recreating it.
    async fn update(&self, actual: &Self::Object, desired: &Self::Object) -> Result<Self::Object>;
}

/// Run the reconcile decision procedure for `resource`.
///
/// On error no further mutating call is made and the error is returned
/// as-is. The only partial outcome is a recreate whose delete succeeded and
/// whose create failed (see [`recreate`]).
#[tracing::instrument(skip_all, fields(resource = %resource.describe()))]
pub async fn reconcile<R>(resource: &R) -> Result<Reconciled<R::Object>>
where
    R: Reconcilable + ?Sized,
{
    let what = resource.describe();

    let actual = match resource.fetch().await {
        Ok(actual) => actual,
        Err(e) if e.is_not_found() => {
            tracing::debug!(resource = %what, "Not found, creating");
            let created = resource.create().await?;
            tracing::info!(resource = %what, "Created");
            return Ok(Reconciled::Created(created));
        }
        Err(e) => return Err(e),
    };

    let desired = resource.desired(&actual);
    if actual.spec_eq(&desired) {
        tracing::debug!(resource = %what, "Up to date");
        return Ok(Reconciled::Unchanged(actual));
    }

    tracing::debug!(
        resource = %what,
        actual = ?actual.spec(),
        desired = ?desired.spec(),
        "Spec differs, updating"
    );
    let updated = resource.update(&actual, &desired).await?;
    tracing::info!(resource = %what, "Updated");
    Ok(Reconciled::Updated(updated))
}

/// Update path for objects the vendor cannot edit in place.
///
/// If `delete` succeeds and `create` fails, the object is left absent and the
/// create error is returned.
pub async fn recreate<T, D, C, DF, CF>(what: impl Display, delete: D, create: C) -> Result<T>
where
    D: FnOnce() -> DF,
    DF: Future<Output = Result<()>>,
    C: FnOnce() -> CF,
    CF: Future<Output = Result<T>>,
{
    delete().await?;
    match create().await {
        Ok(created) => Ok(created),
        Err(e) => {
            tracing::warn!(
                resource = %what,
                error = %short_error_message(&e),
                "Deleted for recreation but create failed; resource is now absent"
            );
            Err(e)
        }
    }
}
