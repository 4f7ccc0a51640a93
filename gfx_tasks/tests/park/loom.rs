#![cfg(loom)]

use gfx_tasks::park::Parker;
use loom::sync::Arc;
use loom::thread;

#[test]
fn unpark_before_park() {
    loom::model(|| {
        let parker = Arc::new(Parker::new());
        let unparker = parker.clone();

        let handle = thread::spawn(move || {
            unparker.unpark();
        });

        parker.park();
        handle.join().unwrap();
    });
}

#[test]
fn unparks_coalesce() {
    loom::model(|| {
        let parker = Arc::new(Parker::new());

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let unparker = parker.clone();
                thread::spawn(move || {
                    unparker.unpark();
                })
            })
            .collect();

        parker.park();
        for handle in handles {
            handle.join().unwrap();
        }
    });
}
