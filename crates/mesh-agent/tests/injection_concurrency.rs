// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Concurrent registration and resolution

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use mesh_agent::{Capability, Dependencies, DependencyInjector, DependencySpec, ToolSpec};

/// Both halves are always written together
#[derive(Debug)]
struct Pair {
    left: u64,
    right: u64,
}

impl Capability for Pair {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_callers_never_observe_torn_values() {
    let injector = DependencyInjector::new();
    injector.register_dependency("pair", Arc::new(Pair { left: 0, right: 0 }));
    let read_pair = injector.create_injection_wrapper(
        ToolSpec::new("read_pair").depends_on(DependencySpec::new("pair")),
        |_: (), deps: &Dependencies| deps.get_as::<Pair>("pair").map(|p| (p.left, p.right)),
    );
    let stop = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (0..4u64)
        .map(|w| {
            let injector = injector.clone();
            thread::spawn(move || {
                for i in 0..500u64 {
                    let n = w * 1_000 + i;
                    injector.register_dependency("pair", Arc::new(Pair { left: n, right: n }));
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let read_pair = read_pair.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut observed = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    let (left, right) = read_pair.call(()).expect("pair stays registered");
                    assert_eq!(left, right);
                    observed += 1;
                }
                observed
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }

    let (left, right) = read_pair.call(()).unwrap();
    assert_eq!(left, right);
    assert_eq!(left % 1_000, 499);
}

#[test]
fn test_wrapping_from_many_threads() {
    let injector = DependencyInjector::new();
    injector.register_dependency("pair", Arc::new(Pair { left: 7, right: 7 }));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let injector = injector.clone();
            thread::spawn(move || {
                let name = format!("fn_{}", t);
                let wrapper = injector.create_injection_wrapper(
                    ToolSpec::new(name).depends_on(DependencySpec::new("pair")),
                    |x: u64, deps: &Dependencies| {
                        x + deps.get_as::<Pair>("pair").map(|p| p.left).unwrap_or(0)
                    },
                );
                (0..100).map(|x| wrapper.call(x)).sum::<u64>()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), (0..100).sum::<u64>() + 700);
    }
    // Wrappers were dropped with their threads
    assert_eq!(injector.function_count(), 0);
    assert_eq!(injector.functions_depending_on("pair").len(), 0);
}
