//! Unchanged forwarding between roles

use rpb_core::{MessageData, ObjectId, ProtocolId, ProtocolRole};
use tracing::debug;

use super::{forward_all, DataHandlingStrategy, MessageRouter, RoleMembership, Roles};

/// Forward every message to all processors of the opposite role
pub struct Bypass {
    roles: Roles,
}

impl Bypass {
    pub fn new(membership: RoleMembership) -> Self {
        Self {
            roles: Roles::new(membership),
        }
    }
}

impl DataHandlingStrategy for Bypass {
    fn mode(&self) -> &'static str {
        "bypass"
    }

    fn set_membership(&self, membership: RoleMembership) {
        self.roles.set(membership);
    }

    fn on_message(
        &self,
        router: &dyn MessageRouter,
        source: ProtocolId,
        object: ObjectId,
        data: &MessageData,
    ) -> bool {
        bypass(&self.roles.read(), router, source, object, data)
    }
}

/// Opposite-role forwarding shared by the modes that fall back to it
pub(crate) fn bypass(
    membership: &RoleMembership,
    router: &dyn MessageRouter,
    source: ProtocolId,
    object: ObjectId,
    data: &MessageData,
) -> bool {
    match membership.role_of(source) {
        Some(role) => forward_all(router, membership.members(role.opposite()), object, data),
        None => {
            debug!("{} is not a member of this node, dropping {}", source, object);
            false
        }
    }
}

/// Forward only messages arriving on `from`; the other direction is dropped
pub struct Directional {
    from: ProtocolRole,
    roles: Roles,
}

impl Directional {
    pub fn new(from: ProtocolRole, membership: RoleMembership) -> Self {
        Self {
            from,
            roles: Roles::new(membership),
        }
    }
}

impl DataHandlingStrategy for Directional {
    fn mode(&self) -> &'static str {
        match self.from {
            ProtocolRole::A => "forward_a_only",
            ProtocolRole::B => "reverse_b_only",
        }
    }

    fn set_membership(&self, membership: RoleMembership) {
        self.roles.set(membership);
    }

    fn on_message(
        &self,
        router: &dyn MessageRouter,
        source: ProtocolId,
        object: ObjectId,
        data: &MessageData,
    ) -> bool {
        let roles = self.roles.read();
        match roles.role_of(source) {
            Some(role) if role == self.from => {
                forward_all(router, roles.members(role.opposite()), object, data)
            }
            // accepted, intentionally not forwarded
            Some(_) => true,
            None => false,
        }
    }
}
