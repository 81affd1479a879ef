//! Connection lifecycle benchmark suite.
//!
//! - `machine`: cost of the pure transition function
//! - `manager`: send / reply round trips through the memory transport
//!
//! Run with: cargo bench --bench transition
//! Results saved to: target/criterion/

use std::time::Duration;

use chat_channel::manager::Event;
use chat_channel::{
    ChannelMessage, ConnectionManager, Machine, ManagerOptions, MemoryTransport, MessageId,
    RetryBudget, TimerKind,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tokio::runtime::Runtime;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const MESSAGE_COUNTS: &[usize] = &[10, 100, 1000];

fn machine() -> Machine {
    Machine::new(
        RetryBudget::new(5, Duration::from_millis(3000)),
        Duration::from_millis(100),
    )
}

// ============================================================================
// Benchmark: Machine Transitions
// ============================================================================

fn bench_machine(c: &mut Criterion) {
    let mut group = c.benchmark_group("machine");

    group.bench_function("connect_open", |b| {
        b.iter(|| {
            let connecting = machine().apply(Event::Connect).map(|t| t.next);
            connecting.and_then(|m| m.apply(Event::Opened))
        });
    });

    group.bench_function("retry_cycle", |b| {
        b.iter(|| {
            let mut current = machine();
            for event in [Event::Connect, Event::Closed, Event::TimerFired(TimerKind::Retry)] {
                if let Ok(transition) = current.apply(event) {
                    current = transition.next;
                }
            }
            current
        });
    });

    group.bench_function("exchange", |b| {
        let open = machine()
            .apply(Event::Connect)
            .and_then(|t| t.next.apply(Event::Opened))
            .map(|t| t.next)
            .expect("machine opens");
        let request = ChannelMessage::local("hello").expect("non-blank");
        let reply = ChannelMessage::remote(MessageId::new(1), "olleh");

        b.iter(|| {
            open.apply(Event::RequestSent(request.clone()))
                .and_then(|t| t.next.apply(Event::MessageReceived(reply.clone())))
        });
    });

    group.finish();
}

// ============================================================================
// Benchmark: Manager Round Trips
// ============================================================================

fn bench_manager(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let mut group = c.benchmark_group("manager");
    group.sample_size(20);

    for &count in MESSAGE_COUNTS {
        group.bench_with_input(BenchmarkId::new("round_trips", count), &count, |b, &count| {
            b.to_async(&rt).iter(|| round_trips(count));
        });
    }

    group.finish();
}

async fn round_trips(count: usize) -> usize {
    let transport = MemoryTransport::new();
    let manager = ConnectionManager::new(ManagerOptions::new("ws://bench"), transport.clone())
        .expect("manager");
    let mut changes = manager.subscribe();

    manager.connect();
    let peer = transport.last_peer().expect("link opened");
    peer.accept();
    while !manager.is_connected() {
        let _ = changes.changed().await;
    }

    for id in 0..count {
        manager.send("ping");
        peer.deliver_message(&ChannelMessage::remote(MessageId::new(id as u64), "pong"));
        while manager.is_loading() {
            let _ = changes.changed().await;
        }
    }

    manager.message_count()
}

criterion_group!(benches, bench_machine, bench_manager);
criterion_main!(benches);
