// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

pub mod interaction;
pub mod messaging;
pub mod notification;
pub mod relationship;
pub mod unreads;

#[cfg(test)]
pub(crate) mod testutil;

pub use interaction::InteractionEngine;
pub use messaging::MessagingEngine;
pub use notification::NotificationEngine;
pub use relationship::RelationshipEngine;
pub use unreads::UnreadsEngine;
