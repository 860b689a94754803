mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tether_core::{Bridge, MessageProxy};

const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn test_global_fifo_across_producers() {
    let mut bridge = Bridge::new();
    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&received);
    let proxy = MessageProxy::attach(&mut bridge, move |v: u32| sink.borrow_mut().push(v));

    // Each value comes from a different thread, strictly one after another.
    for v in 1..=20u32 {
        let producer = proxy.clone();
        thread::spawn(move || {
            producer.enqueue(v);
        })
        .join()
        .unwrap();
    }

    let done = Rc::clone(&received);
    common::drive_until(&mut bridge, TIMEOUT, move || done.borrow().len() == 20);
    assert_eq!(*received.borrow(), (1..=20).collect::<Vec<_>>());
}

#[test]
fn test_concurrent_producers_keep_their_own_order() {
    const PRODUCERS: u32 = 4;
    const PER_PRODUCER: u32 = 250;

    let mut bridge = Bridge::new();
    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&received);
    let proxy = MessageProxy::attach(&mut bridge, move |msg: (u32, u32)| {
        sink.borrow_mut().push(msg)
    });

    let workers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let producer = proxy.clone();
            thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    producer.enqueue((p, seq));
                }
            })
        })
        .collect();
    common::drive_until_finished(&mut bridge, &workers, TIMEOUT);
    common::join_all(workers);
    // Entries enqueued after the last pump are still queued with a token pending.
    let done = Rc::clone(&received);
    common::drive_until(&mut bridge, TIMEOUT, move || {
        done.borrow().len() == (PRODUCERS * PER_PRODUCER) as usize
    });

    let received = received.borrow();
    for p in 0..PRODUCERS {
        let seqs: Vec<_> = received
            .iter()
            .filter(|(producer, _)| *producer == p)
            .map(|(_, seq)| *seq)
            .collect();
        assert_eq!(seqs, (0..PER_PRODUCER).collect::<Vec<_>>());
    }
    assert!(proxy.is_empty());
}

#[test]
fn test_wake_while_idle_is_not_lost() {
    let mut bridge = Bridge::new();
    let proxy: MessageProxy<&'static str> = MessageProxy::new(&bridge);
    let drained = Rc::new(RefCell::new(Vec::new()));
    {
        let proxy = proxy.clone();
        let drained = Rc::clone(&drained);
        bridge.register(move || {
            proxy.drain(|m| drained.borrow_mut().push(m));
        });
    }

    let (tx, rx) = mpsc::channel();
    let producer = proxy.clone();
    thread::spawn(move || {
        producer.enqueue("late");
        tx.send(()).unwrap();
    });
    rx.recv().unwrap();

    assert!(bridge.pump(Duration::from_secs(1)) >= 1);
    assert_eq!(*drained.borrow(), vec!["late"]);
}

#[test]
fn test_count_is_thread_safe_snapshot() {
    let bridge = Bridge::new();
    let proxy = MessageProxy::new(&bridge);
    let producers: Vec<_> = (0..4)
        .map(|_| {
            let proxy = proxy.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    proxy.enqueue(i);
                }
            })
        })
        .collect();
    common::join_all(producers);
    assert_eq!(proxy.count(), 400);
    assert_eq!(proxy.drain(|_| {}), 400);
    assert_eq!(proxy.count(), 0);
}
