//! Session actor and its handle.
//!
//! The actor owns the [`DiscoverySession`] and applies every command and
//! collaborator event from one ordered queue, one at a time. Teardown uses
//! its own channel, polled first, so it is never stuck behind queued events.

use log::{debug, info};
use tokio::{
   select,
   sync::{mpsc, oneshot},
};

use super::{
   bridge::{EventBridge, Inbox, SessionEvent},
   device::Device,
   session::{DiscoverySession, SessionState},
};
use crate::error::{DiscoveryError, Result};

// === Commands ===

#[derive(Debug)]
pub enum Command {
   // Collaborator events
   Event(SessionEvent),

   // User commands
   Start(oneshot::Sender<Result<SessionState>>),
   Stop(oneshot::Sender<Result<SessionState>>),
   GetState(oneshot::Sender<SessionState>),
   GetDevices(oneshot::Sender<Vec<Device>>),
}

// === Handle ===

/// Cloneable handle to a running discovery session.
///
/// Dropping the last handle tears the session down.
#[derive(Clone)]
pub struct DiscoveryManager {
   inbox: EventBridge,
   teardown_tx: mpsc::Sender<oneshot::Sender<()>>,
}

impl DiscoveryManager {
   /// Spawns the session actor. `bridge` and `inbox` must be the two halves
   /// of the channel handed to the session's collaborators.
   pub fn spawn(session: DiscoverySession, bridge: EventBridge, inbox: Inbox) -> Self {
      let (teardown_tx, teardown_rx) = mpsc::channel(1);
      tokio::spawn(
         SessionActor {
            session,
            inbox,
            teardown_rx,
         }
         .run(),
      );
      Self {
         inbox: bridge,
         teardown_tx,
      }
   }

   async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
      let (tx, rx) = oneshot::channel();
      if !self.inbox.send(make(tx)) {
         return Err(DiscoveryError::ManagerShutdown);
      }
      rx.await.map_err(|_| DiscoveryError::ManagerShutdown)
   }

   /// Queues a start request; resolves to the state after it was applied.
   pub async fn request_start(&self) -> Result<SessionState> {
      self.call(Command::Start).await?
   }

   pub async fn request_stop(&self) -> Result<SessionState> {
      self.call(Command::Stop).await?
   }

   pub async fn state(&self) -> Result<SessionState> {
      self.call(Command::GetState).await
   }

   pub async fn devices(&self) -> Result<Vec<Device>> {
      self.call(Command::GetDevices).await
   }

   /// Tears the session down ahead of any queued events and waits until the
   /// discovery subscription has been released. Idempotent.
   pub async fn teardown(&self) -> Result<()> {
      let (tx, rx) = oneshot::channel();
      if self.teardown_tx.send(tx).await.is_err() {
         // Actor already gone, nothing left to release
         return Ok(());
      }
      let _ = rx.await;
      Ok(())
   }
}

// === Actor ===

struct SessionActor {
   session: DiscoverySession,
   inbox: Inbox,
   teardown_rx: mpsc::Receiver<oneshot::Sender<()>>,
}

impl SessionActor {
   async fn run(mut self) {
      info!("Discovery session starting up");

      loop {
         select! {
            biased;

            ack = self.teardown_rx.recv() => {
               debug!("Teardown requested");
               self.session.teardown();
               let Some(ack) = ack else {
                  // Every handle dropped
                  break;
               };
               let _ = ack.send(());
            }
            cmd = self.inbox.recv() => {
               let Some(cmd) = cmd else {
                  break;
               };
               self.handle_command(cmd);
            }
         }
      }

      self.session.teardown();
      info!("Discovery session shut down");
   }

   fn handle_command(&mut self, cmd: Command) {
      match cmd {
         Command::Event(event) => self.session.handle(event),
         Command::Start(reply) => {
            let result = self.session.request_start().map(|()| self.session.state());
            let _ = reply.send(result);
         },
         Command::Stop(reply) => {
            let result = self.session.request_stop().map(|()| self.session.state());
            let _ = reply.send(result);
         },
         Command::GetState(reply) => {
            let _ = reply.send(self.session.state());
         },
         Command::GetDevices(reply) => {
            let _ = reply.send(self.session.snapshot());
         },
      }
   }
}
