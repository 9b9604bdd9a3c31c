use std::{collections::HashSet, sync::Arc};

use {
    chrono::Utc,
    otis_common::types::{ChannelId, UserId},
    otis_tickets::{SessionTable, Speaker, StartupGuard, Turn, machine::Event},
    tokio::sync::Barrier,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_get_or_create_yields_one_session() {
    let table = Arc::new(SessionTable::new(100));
    let callers = 64;
    let barrier = Arc::new(Barrier::new(callers));

    let tasks: Vec<_> = (0..callers)
        .map(|i| {
            let table = Arc::clone(&table);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                let handle = table.get_or_create(ChannelId(1), Utc::now());
                let mut session = handle.lock().await;
                let _ = session.apply(Event::StaffMessage(Turn::new(
                    Speaker::Staff {
                        id: UserId(i as u64),
                        name: format!("mod{i}"),
                    },
                    format!("note {i}"),
                    Utc::now(),
                )));
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(table.len(), 1);
    let handle = table.get(ChannelId(1)).unwrap();
    let session = handle.lock().await;
    // Every caller wrote into the same session.
    assert_eq!(session.history_len(), callers);
    let notes: HashSet<_> = session.history().map(|t| t.text.clone()).collect();
    assert_eq!(notes.len(), callers);
}

#[tokio::test]
async fn history_never_exceeds_cap() {
    let table = SessionTable::new(5);
    let handle = table.get_or_create(ChannelId(1), Utc::now());
    for i in 0..50 {
        let mut session = handle.lock().await;
        let _ = session.apply(Event::StaffMessage(Turn::new(
            Speaker::Staff {
                id: UserId(1),
                name: "mod".into(),
            },
            format!("note {i}"),
            Utc::now(),
        )));
        assert!(session.history_len() <= 5);
    }
    let session = handle.lock().await;
    assert_eq!(session.history().next().map(|t| t.text.as_str()), Some("note 45"));
}

#[tokio::test]
async fn two_ready_signals_start_each_bridge_once() {
    use {
        async_trait::async_trait,
        otis_tickets::Bridge,
        std::sync::atomic::{AtomicU32, Ordering},
    };

    struct Counting(AtomicU32, &'static str);

    #[async_trait]
    impl Bridge<()> for Counting {
        fn name(&self) -> &str {
            self.1
        }

        async fn start(&self, _client: ()) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let guard = StartupGuard::new();
    let console = Counting(AtomicU32::new(0), "remote-console");
    let printer = Counting(AtomicU32::new(0), "position-printer");

    for _ in 0..2 {
        let _ = guard
            .ensure_started((), Some(&console), Some(&printer))
            .await;
    }
    assert_eq!(console.0.load(Ordering::SeqCst), 1);
    assert_eq!(printer.0.load(Ordering::SeqCst), 1);
}
