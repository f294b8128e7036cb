use uuid::Uuid;

use crate::collaborators::WalkerDirectory;
use crate::models::{Booking, WalkerProfile};
use crate::{CoreError, CoreResult};

/// How an authenticated user relates to a booking.
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    Owner,
    Walker(WalkerProfile),
    Outsider,
}

impl Role {
    pub fn is_party(&self) -> bool {
        !matches!(self, Role::Outsider)
    }
}

pub async fn role_of(booking: &Booking, user_id: Uuid, walkers: &dyn WalkerDirectory) -> CoreResult<Role> {
    if booking.owner_id == user_id {
        return Ok(Role::Owner);
    }
    let Some(assigned) = booking.walker_id else {
        return Ok(Role::Outsider);
    };
    match walkers.find_by_user(user_id).await? {
        Some(walker) if walker.id == assigned => Ok(Role::Walker(walker)),
        _ => Ok(Role::Outsider),
    }
}

/// Fails with `Forbidden` unless `user_id` is the assigned walker.
pub async fn require_walker(
    booking: &Booking,
    user_id: Uuid,
    walkers: &dyn WalkerDirectory,
) -> CoreResult<WalkerProfile> {
    match role_of(booking, user_id, walkers).await? {
        Role::Walker(walker) => Ok(walker),
        _ => Err(CoreError::Forbidden(format!(
            "only the assigned walker may act on booking {}",
            booking.id
        ))),
    }
}

/// Fails with `Forbidden` unless `user_id` is the owner or the assigned walker.
pub async fn require_party(booking: &Booking, user_id: Uuid, walkers: &dyn WalkerDirectory) -> CoreResult<Role> {
    let role = role_of(booking, user_id, walkers).await?;
    if !role.is_party() {
        return Err(CoreError::Forbidden(format!("no access to booking {}", booking.id)));
    }
    Ok(role)
}
