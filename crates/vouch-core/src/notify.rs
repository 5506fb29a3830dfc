//! The `InviteNotifier` trait: how invitations reach referees.
//!
//! Delivery is best-effort from the caller's point of view: a failed send is
//! logged and the request it belongs to still stands.

use std::future::Future;

use crate::request::Invite;

pub trait InviteNotifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Deliver `invite` to `invite.referee_email`.
  fn send_invite<'a>(
    &'a self,
    invite: &'a Invite,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
