use crossbeam::channel::unbounded;
use std::sync::Arc;

mod auth;
mod bands;
mod db;
mod events;
mod repertoire;
mod setlist;
mod util;

pub use auth::*;
pub use bands::*;
pub use db::*;
pub use events::*;
pub use repertoire::*;
pub use setlist::*;

/// The backline system, facilitating bands, their repertoire, and rehearsal planning.
pub struct Backline<Db> {
    database: Arc<Db>,
    event_receiver: EventReceiver,

    pub auth: Auth<Db>,
    pub bands: BandManager<Db>,
    pub repertoire: RepertoireManager<Db>,
    pub setlists: SetlistManager<Db>,
}

/// A type passed to various components of the backline system, to access state and emit events.
pub struct CoreContext<Db> {
    pub database: Arc<Db>,

    event_sender: EventSender,
}

impl<Db> Backline<Db>
where
    Db: Database,
{
    pub fn new(database: Db) -> Self {
        let database = Arc::new(database);
        let (event_sender, event_receiver) = unbounded();

        let context = CoreContext {
            database: database.clone(),
            event_sender,
        };

        Self {
            auth: Auth::new(&database),
            bands: BandManager::new(&context),
            repertoire: RepertoireManager::new(&context),
            setlists: SetlistManager::new(&context),

            database,
            event_receiver,
        }
    }

    pub fn database(&self) -> &Arc<Db> {
        &self.database
    }

    /// Receive events from the system. Blocks until one arrives.
    pub fn wait_for_event(&self) -> BandEvent {
        self.event_receiver
            .recv()
            .expect("event is received without error")
    }
}

impl<Db> CoreContext<Db> {
    pub fn emit(&self, event: BandEvent) {
        self.event_sender.send(event).expect("event is sent");
    }
}

impl<Db> Clone for CoreContext<Db> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            event_sender: self.event_sender.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// A full system over the in-memory database, with the event
    /// receiver held open so emits never fail.
    pub struct TestCore {
        pub database: Arc<MemoryDatabase>,
        pub auth: Auth<MemoryDatabase>,
        pub bands: BandManager<MemoryDatabase>,
        pub repertoire: RepertoireManager<MemoryDatabase>,
        pub setlists: SetlistManager<MemoryDatabase>,

        events: EventReceiver,
    }

    impl TestCore {
        pub async fn new() -> Self {
            let database = Arc::new(MemoryDatabase::default());
            let (event_sender, events) = unbounded();

            let context = CoreContext {
                database: database.clone(),
                event_sender,
            };

            Self {
                auth: Auth::new(&database),
                bands: BandManager::new(&context),
                repertoire: RepertoireManager::new(&context),
                setlists: SetlistManager::new(&context),

                database,
                events,
            }
        }

        /// The next emitted event, panicking if there is none
        pub fn next_event(&self) -> BandEvent {
            self.events.try_recv().expect("an event was emitted")
        }

        /// Discards everything emitted so far
        pub fn drain_events(&self) {
            while self.events.try_recv().is_ok() {}
        }
    }
}
