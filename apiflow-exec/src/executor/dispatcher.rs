//! Status fan-out.
//!
//! One task owns every subscriber queue. Publishing never blocks: a
//! subscriber whose bounded queue is full is dropped, and the run carries on.
//! A run topic closes after its `RunFinished` event is delivered.

use std::collections::BTreeMap;

use apiflow_core::Id;
use tokio::sync::{mpsc, oneshot};

use crate::executor::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Topic {
    Run(Id),
    User(Id),
}

enum Command {
    Subscribe(Topic, mpsc::Sender<Event>),
    Publish(Topic, Event),
    Count(Topic, oneshot::Sender<usize>),
}

pub struct StatusDispatcher {
    commands: mpsc::UnboundedSender<Command>,
    buffer: usize,
}

impl StatusDispatcher {
    /// Start the dispatcher task on the current runtime.
    pub fn spawn(buffer: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx));
        Self {
            commands: tx,
            buffer: buffer.max(1),
        }
    }

    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self, topic: Topic) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(self.buffer);
        if self.commands.send(Command::Subscribe(topic, tx)).is_err() {
            tracing::debug!(?topic, "status dispatcher stopped; subscription closed");
        }
        rx
    }

    pub fn publish(&self, topic: Topic, event: Event) {
        // A stopped dispatcher has no subscribers left to miss the event.
        let _ = self.commands.send(Command::Publish(topic, event));
    }

    /// Live subscribers on `topic`. Subscribers whose receiver was dropped
    /// are not counted.
    pub async fn subscriber_count(&self, topic: Topic) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Count(topic, tx)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

fn prune(subscribers: &mut BTreeMap<Topic, Vec<mpsc::Sender<Event>>>) {
    subscribers.retain(|_, subs| {
        subs.retain(|s| !s.is_closed());
        !subs.is_empty()
    });
}

async fn run(mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut subscribers: BTreeMap<Topic, Vec<mpsc::Sender<Event>>> = BTreeMap::new();
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Subscribe(topic, tx) => {
                prune(&mut subscribers);
                subscribers.entry(topic).or_default().push(tx);
            }
            Command::Count(topic, reply) => {
                prune(&mut subscribers);
                let _ = reply.send(subscribers.get(&topic).map_or(0, Vec::len));
            }
            Command::Publish(topic, event) => {
                let closes = matches!((topic, &event), (Topic::Run(_), Event::RunFinished { .. }));
                let Some(subs) = subscribers.get_mut(&topic) else {
                    continue;
                };
                subs.retain(|s| match s.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::debug!(?topic, "status subscriber too slow, dropped");
                        false
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                });
                if closes || subs.is_empty() {
                    subscribers.remove(&topic);
                }
            }
        }
    }
}
